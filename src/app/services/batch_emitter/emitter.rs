//! Batched transmission of a sensor's unsent observations

use std::ops::Range;

use serde::Serialize;
use tracing::{debug, warn};

use super::values::convert_value;
use crate::Result;
use crate::app::adapters::sensor_api::SensorApi;
use crate::app::adapters::sensor_store::SensorStore;
use crate::app::models::{Counter, Measurand, SentRange, Sensor, ValueBatch, ValueMessage, iso};
use crate::app::services::record_normalizer::NormalizedProduct;
use crate::app::services::sensor_index::split_by_already_sent;
use crate::constants::PUSH_OK_STATUS;

/// Outcome counters of one or more emit passes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmitStats {
    /// Batches accepted by the API
    pub batches_pushed: usize,

    /// Batches abandoned after the API gave up
    pub batches_failed: usize,

    /// Batches with no valid value, recorded without pushing
    pub batches_empty: usize,

    pub values_sent: u64,
    pub values_aimed: u64,

    /// Sentinel and out-of-range values skipped
    pub values_missing: usize,

    /// Unparsable values skipped
    pub values_invalid: usize,

    /// Rows skipped because an earlier pass sent them
    pub rows_already_sent: usize,
}

impl EmitStats {
    pub fn absorb(&mut self, other: &EmitStats) {
        self.batches_pushed += other.batches_pushed;
        self.batches_failed += other.batches_failed;
        self.batches_empty += other.batches_empty;
        self.values_sent += other.values_sent;
        self.values_aimed += other.values_aimed;
        self.values_missing += other.values_missing;
        self.values_invalid += other.values_invalid;
        self.rows_already_sent += other.rows_already_sent;
    }
}

/// Consecutive windows of at most `batch_size` rows covering `rows`
pub fn batchify(rows: Range<usize>, batch_size: usize) -> Vec<Range<usize>> {
    let batch_size = batch_size.max(1);
    rows.clone()
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(rows.end))
        .collect()
}

/// Pushes value batches for one sensor at a time and records what was sent
pub struct BatchEmitter<'a> {
    api: &'a dyn SensorApi,
    store: &'a dyn SensorStore,
    batch_size: usize,
}

impl<'a> BatchEmitter<'a> {
    pub fn new(api: &'a dyn SensorApi, store: &'a dyn SensorStore, batch_size: usize) -> Self {
        Self {
            api,
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Value messages for `rows` of `column`, skipping values that do not convert
    pub fn build_batch(
        &self,
        product: &NormalizedProduct,
        column: usize,
        measurand: Measurand,
        remote_id: u64,
        rows: Range<usize>,
        stats: &mut EmitStats,
    ) -> ValueBatch {
        let mut batch = ValueBatch::default();
        for row in rows {
            match convert_value(product.value(row, column), measurand) {
                Ok(Some(number_value)) => batch.collapsed_messages.push(ValueMessage {
                    sensor_id: remote_id,
                    timestamp: iso(&product.timestamps[row]),
                    number_value,
                }),
                Ok(None) => stats.values_missing += 1,
                Err(e) => {
                    stats.values_invalid += 1;
                    debug!("Skipped value in row {}: {}", row, e);
                }
            }
        }
        batch
    }

    /// Send the rows of `chunk` that `sensor` has not sent yet
    ///
    /// Push failures abandon the batch and move on; store failures abort.
    pub async fn emit_chunk(
        &self,
        product: &NormalizedProduct,
        column: usize,
        sensor: &Sensor,
        chunk: Range<usize>,
        stats: &mut EmitStats,
    ) -> Result<()> {
        let unsent = split_by_already_sent(&product.timestamps, chunk.clone(), &sensor.sent_ranges);
        let unsent_rows: usize = unsent.iter().map(|r| r.len()).sum();
        stats.rows_already_sent += chunk.len() - unsent_rows;

        for range in unsent {
            for rows in batchify(range, self.batch_size) {
                let sent = SentRange::new(
                    product.timestamps[rows.start],
                    product.timestamps[rows.end - 1],
                );
                let batch =
                    self.build_batch(product, column, sensor.measurand, sensor.remote_id, rows, stats);

                if batch.is_empty() {
                    stats.batches_empty += 1;
                    self.store
                        .add_sent_range(&sensor.local_id, sensor.index, sent)
                        .await?;
                    continue;
                }

                let count = batch.len() as u64;
                self.store
                    .increment_counter(Counter::AimedValues, count)
                    .await?;
                stats.values_aimed += count;

                match self.api.add_multiple_values(&batch).await {
                    Ok(status) if status == PUSH_OK_STATUS => {
                        debug!(
                            "Pushed {} values to sensor {} ({} .. {})",
                            count,
                            sensor.remote_id,
                            iso(&sent.from),
                            iso(&sent.to)
                        );
                        self.store
                            .add_sent_range(&sensor.local_id, sensor.index, sent)
                            .await?;
                        self.store.increment_counter(Counter::Values, count).await?;
                        stats.batches_pushed += 1;
                        stats.values_sent += count;
                    }
                    Ok(status) => {
                        warn!(
                            "Sensor {} rejected {} values starting {}: status '{}'",
                            sensor.remote_id,
                            count,
                            iso(&sent.from),
                            status
                        );
                        stats.batches_failed += 1;
                    }
                    Err(e) => {
                        warn!(
                            "Failed to push {} values to sensor {} starting {}: {}",
                            count,
                            sensor.remote_id,
                            iso(&sent.from),
                            e
                        );
                        stats.batches_failed += 1;
                    }
                }
            }
        }

        Ok(())
    }
}
