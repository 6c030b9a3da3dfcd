//! Unit-of-work runner
//!
//! A unit is one product file, its optional station metadata and the product
//! group it is filed under. Running a unit never panics or propagates: every
//! failure is logged and reported as [`UnitOutcome::Failed`] so the caller can
//! move on to the next unit.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::app::adapters::api_resilience::LookupCache;
use crate::app::adapters::product_source::{RawProduct, read_metadata_lines};
use crate::app::adapters::sensor_api::SensorApi;
use crate::app::adapters::sensor_store::SensorStore;
use crate::app::models::{Measurand, TimeClass};
use crate::app::services::content_handler::{ContentHandler, ContentReport};
use crate::app::services::file_catalog::WorkUnit;
use crate::app::services::metadata_handler::{MetadataHandler, MetadataReport};
use crate::constants::{DEFAULT_BATCH_SIZE, sensor_defaults::LICENSE_SHORT_NAME};
use crate::{Error, Result};

/// Settings shared by every unit of one invocation
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Credentials for the login at the start of each unit
    pub credentials: Option<(String, String)>,
    pub batch_size: usize,
    pub license: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            credentials: None,
            batch_size: DEFAULT_BATCH_SIZE,
            license: LICENSE_SHORT_NAME.to_string(),
        }
    }
}

/// What a finished unit did
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub metadata: Option<MetadataReport>,
    pub content: ContentReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UnitOutcome {
    Finished { unit: String, report: UnitReport },
    Failed { unit: String, message: String },
}

impl UnitOutcome {
    pub fn unit(&self) -> &str {
        match self {
            UnitOutcome::Finished { unit, .. } | UnitOutcome::Failed { unit, .. } => unit,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UnitOutcome::Finished { .. })
    }
}

/// Runs units against one API and one store
pub struct UnitRunner {
    api: Arc<dyn SensorApi>,
    store: Arc<dyn SensorStore>,
    cache: Arc<LookupCache>,
    settings: RunSettings,
}

impl UnitRunner {
    pub fn new(
        api: Arc<dyn SensorApi>,
        store: Arc<dyn SensorStore>,
        cache: Arc<LookupCache>,
        settings: RunSettings,
    ) -> Self {
        Self {
            api,
            store,
            cache,
            settings,
        }
    }

    /// Run a unit read from disk
    pub async fn run(&self, unit: &WorkUnit) -> UnitOutcome {
        let label = unit.label();
        let result = async {
            let metadata = match &unit.metadata {
                Some(path) => Some(read_metadata_lines(path).await?),
                None => None,
            };
            let product = RawProduct::from_path(&unit.product).await?;
            self.process(&product, metadata.as_deref(), unit.group, &unit.time_class)
                .await
        }
        .await;

        Self::outcome(label, result)
    }

    /// Run a unit whose content is already in memory
    pub async fn run_product(
        &self,
        label: &str,
        product: &RawProduct,
        metadata: Option<&[String]>,
        group: Measurand,
        time_class: &TimeClass,
    ) -> UnitOutcome {
        let result = self.process(product, metadata, group, time_class).await;
        Self::outcome(label.to_string(), result)
    }

    fn outcome(unit: String, result: Result<UnitReport>) -> UnitOutcome {
        match result {
            Ok(report) => {
                let totals = report.content.emit_totals();
                info!(
                    "Finished {}: {} values sent, {} failed batches",
                    unit, totals.values_sent, totals.batches_failed
                );
                UnitOutcome::Finished { unit, report }
            }
            Err(e) => {
                error!("Unit {} failed: {}", unit, e);
                UnitOutcome::Failed {
                    unit,
                    message: e.to_string(),
                }
            }
        }
    }

    async fn process(
        &self,
        product: &RawProduct,
        metadata: Option<&[String]>,
        group: Measurand,
        time_class: &TimeClass,
    ) -> Result<UnitReport> {
        self.store.ping().await?;

        if let Some((username, password)) = &self.settings.credentials {
            self.api
                .login(username, password)
                .await
                .map_err(|e| Error::transient_api("login", e))?;
        }

        let metadata = match metadata {
            Some(lines) => Some(
                MetadataHandler::new(
                    self.api.as_ref(),
                    self.store.as_ref(),
                    &self.cache,
                    self.settings.license.clone(),
                )
                .handle_lines(lines, group)
                .await?,
            ),
            None => None,
        };

        let content = ContentHandler::new(
            self.api.as_ref(),
            self.store.as_ref(),
            self.settings.batch_size,
            time_class.clone(),
        )
        .handle(product, group)
        .await?;

        Ok(UnitReport { metadata, content })
    }
}
