//! Product content handling
//!
//! Normalizes one product file and forwards the unsent observations of every
//! measurand in its product group to the matching sensors.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::Result;
use crate::app::adapters::product_source::RawProduct;
use crate::app::adapters::sensor_api::SensorApi;
use crate::app::adapters::sensor_store::SensorStore;
use crate::app::models::{Counter, Measurand, TimeClass, local_id};
use crate::app::services::batch_emitter::{BatchEmitter, EmitStats};
use crate::app::services::record_normalizer::{NormalizeStats, NormalizedProduct, normalize};
use crate::app::services::sensor_index::SensorIndex;

/// Result of forwarding one measurand column
#[derive(Debug, Clone, Serialize)]
pub struct MeasurandReport {
    pub measurand: Measurand,
    pub local_id: String,
    pub sensors: usize,
    pub chunks: usize,

    /// Observations no sensor covers
    pub dropped: usize,

    /// Of `dropped`, observations newer than every closed sensor
    pub uncovered_tail: usize,

    pub emit: EmitStats,
}

/// Result of handling one product file
#[derive(Debug, Clone, Serialize)]
pub struct ContentReport {
    pub station_id: String,
    pub normalize: NormalizeStats,
    pub measurands: Vec<MeasurandReport>,
}

impl ContentReport {
    /// Emit statistics summed over all measurands
    pub fn emit_totals(&self) -> EmitStats {
        let mut totals = EmitStats::default();
        for report in &self.measurands {
            totals.absorb(&report.emit);
        }
        totals
    }
}

pub struct ContentHandler<'a> {
    api: &'a dyn SensorApi,
    store: &'a dyn SensorStore,
    batch_size: usize,
    time_class: TimeClass,
}

impl<'a> ContentHandler<'a> {
    pub fn new(
        api: &'a dyn SensorApi,
        store: &'a dyn SensorStore,
        batch_size: usize,
        time_class: TimeClass,
    ) -> Self {
        Self {
            api,
            store,
            batch_size,
            time_class,
        }
    }

    /// Forward the observations of `product` for `group` and its companions
    pub async fn handle(&self, product: &RawProduct, group: Measurand) -> Result<ContentReport> {
        let normalized = normalize(&product.header, &product.rows)?;
        let mut action_logged = false;
        let mut measurands = Vec::new();

        for measurand in group.with_companions() {
            let Some(column) = normalized.mapping.measurand_index(measurand) else {
                debug!("No {} column in product of station {}", measurand, normalized.station_id);
                continue;
            };
            let report = self
                .forward_measurand(&normalized, measurand, column, &mut action_logged)
                .await?;
            measurands.push(report);
        }

        Ok(ContentReport {
            station_id: normalized.station_id.clone(),
            normalize: normalized.stats.clone(),
            measurands,
        })
    }

    async fn forward_measurand(
        &self,
        product: &NormalizedProduct,
        measurand: Measurand,
        column: usize,
        action_logged: &mut bool,
    ) -> Result<MeasurandReport> {
        let local_id = local_id(&product.station_id, measurand);
        let mut report = MeasurandReport {
            measurand,
            local_id: local_id.clone(),
            sensors: 0,
            chunks: 0,
            dropped: product.len(),
            uncovered_tail: 0,
            emit: EmitStats::default(),
        };

        let index = match SensorIndex::load_merged(self.store, &local_id, &self.time_class).await? {
            Some(index) if !index.is_empty() => index,
            _ => {
                warn!(
                    "No sensors for {}; {} observations skipped until station metadata is imported",
                    local_id,
                    product.len()
                );
                return Ok(report);
            }
        };

        let partition = index.partition(&product.timestamps);
        report.sensors = index.sensors.len();
        report.chunks = partition.chunks.len();
        report.dropped = partition.dropped;
        report.uncovered_tail = partition.uncovered_tail;

        if !partition.chunks.is_empty() && !*action_logged {
            self.store.increment_counter(Counter::Actions, 1).await?;
            *action_logged = true;
        }

        let emitter = BatchEmitter::new(self.api, self.store, self.batch_size);
        for chunk in &partition.chunks {
            let sensor = &index.sensors[chunk.sensor];
            emitter
                .emit_chunk(product, column, sensor, chunk.rows.clone(), &mut report.emit)
                .await?;
        }

        // Coalesce the ranges recorded during this pass
        let ranges =
            SensorIndex::merge_stored_ranges(self.store, &local_id, &self.time_class).await?;
        debug!("{}: {} sent ranges after merging", local_id, ranges);

        info!(
            "{}: {} values sent, {} already sent, {} failed batches",
            local_id,
            report.emit.values_sent,
            report.emit.rows_already_sent,
            report.emit.batches_failed
        );
        Ok(report)
    }
}
