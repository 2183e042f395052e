//! Confidence calibration.
//!
//! Predictions are bucketed by confidence into five bins (0.0, 0.2, 0.4,
//! 0.6, 0.8). Once a bin has enough samples, its observed success rate is
//! compared with the mean predicted confidence; a bin that has been
//! over-confident is nudged down and an under-confident one is nudged up.
//!
//! The table is process-wide and read on every composition. It is rebuilt
//! off to the side every `recalibrate_every` records and then published by
//! swapping an `Arc`, so readers always see a complete table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, RwLock};
use tessera_config::CalibrationConfig;
use tessera_core::instinct::{OutcomeRecorder, clamp_confidence};
use tessera_core::thread::ThreadId;
use tracing::debug;

/// Lower bounds of the calibration bins.
pub const BIN_KEYS: [f64; 5] = [0.0, 0.2, 0.4, 0.6, 0.8];

/// Maximum prediction records kept in memory.
const MAX_PREDICTION_RECORDS: usize = 5_000;

/// Bin index for a confidence: rounded down to the nearest 0.2, with 1.0
/// falling into the top bin.
pub fn bin_index(confidence: f64) -> usize {
    let scaled = clamp_confidence(confidence) * BIN_KEYS.len() as f64;
    ((scaled + 1e-9).floor() as usize).min(BIN_KEYS.len() - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub recalibrate_every: usize,
    pub min_samples: u32,
    pub drift_threshold: f64,
    pub adjustment: f64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self::from(&CalibrationConfig::default())
    }
}

impl From<&CalibrationConfig> for CalibrationParams {
    fn from(cfg: &CalibrationConfig) -> Self {
        Self {
            recalibrate_every: cfg.recalibrate_every.max(1),
            min_samples: cfg.min_samples,
            drift_threshold: cfg.drift_threshold,
            adjustment: cfg.adjustment,
        }
    }
}

/// Aggregate accuracy for one confidence range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub bin_key: f64,
    pub correct_count: u32,
    pub total_count: u32,
    /// Sum of predicted confidences that landed in this bin.
    pub predicted_sum: f64,
    pub adjustment: f64,
}

impl CalibrationBin {
    fn new(bin_key: f64) -> Self {
        Self {
            bin_key,
            correct_count: 0,
            total_count: 0,
            predicted_sum: 0.0,
            adjustment: 0.0,
        }
    }

    /// Mean predicted confidence, if any samples exist.
    pub fn predicted_rate(&self) -> Option<f64> {
        (self.total_count > 0).then(|| self.predicted_sum / self.total_count as f64)
    }

    /// Observed success rate, if any samples exist.
    pub fn actual_rate(&self) -> Option<f64> {
        (self.total_count > 0).then(|| self.correct_count as f64 / self.total_count as f64)
    }
}

/// An immutable calibration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTable {
    bins: Vec<CalibrationBin>,
    /// Number of records the table was built from.
    pub built_from: usize,
}

impl CalibrationTable {
    /// A table with no samples; every adjustment is zero.
    pub fn empty() -> Self {
        Self {
            bins: BIN_KEYS.iter().map(|&k| CalibrationBin::new(k)).collect(),
            built_from: 0,
        }
    }

    /// Build a table from prediction records.
    pub fn build(records: &[PredictionRecord], params: &CalibrationParams) -> Self {
        let mut table = Self::empty();
        for record in records {
            let bin = &mut table.bins[bin_index(record.predicted)];
            bin.total_count += 1;
            bin.predicted_sum += clamp_confidence(record.predicted);
            if record.outcome {
                bin.correct_count += 1;
            }
        }

        // Tolerance so a gap of exactly the threshold counts as drift.
        let threshold = params.drift_threshold - 1e-9;
        for bin in &mut table.bins {
            bin.adjustment = match (bin.predicted_rate(), bin.actual_rate()) {
                (Some(predicted), Some(actual)) if bin.total_count >= params.min_samples => {
                    if predicted - actual >= threshold {
                        -params.adjustment
                    } else if actual - predicted >= threshold {
                        params.adjustment
                    } else {
                        0.0
                    }
                }
                _ => 0.0,
            };
        }

        table.built_from = records.len();
        table
    }

    pub fn bins(&self) -> &[CalibrationBin] {
        &self.bins
    }

    /// Adjustment for the bin containing `confidence`.
    pub fn adjustment_for(&self, confidence: f64) -> f64 {
        self.bins
            .get(bin_index(confidence))
            .map(|b| b.adjustment)
            .unwrap_or(0.0)
    }

    /// `confidence` corrected by its bin's adjustment, clamped to `[0, 1]`.
    pub fn calibrate(&self, confidence: f64) -> f64 {
        clamp_confidence(confidence + self.adjustment_for(confidence))
    }
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self::empty()
    }
}

/// One predicted-vs-actual observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub predicted: f64,
    pub outcome: bool,
    pub instinct_id: String,
    pub thread_id: ThreadId,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct PredictionLog {
    records: Vec<PredictionRecord>,
    since_rebuild: usize,
}

/// Process-wide calibration state.
///
/// Thread-safe. Readers take a cheap `Arc` snapshot via [`Calibrator::snapshot`];
/// the writer that crosses the rebuild threshold builds a new table and
/// swaps it in.
pub struct Calibrator {
    params: CalibrationParams,
    table: RwLock<Arc<CalibrationTable>>,
    log: Mutex<PredictionLog>,
}

impl Calibrator {
    pub fn new(params: CalibrationParams) -> Self {
        Self {
            params,
            table: RwLock::new(Arc::new(CalibrationTable::empty())),
            log: Mutex::new(PredictionLog::default()),
        }
    }

    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    /// The currently published table.
    pub fn snapshot(&self) -> Arc<CalibrationTable> {
        let guard = self.table.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Record an outcome; rebuilds the table every `recalibrate_every` records.
    ///
    /// Returns `true` when this call published a new table. The table is
    /// published while the record log is still locked, so successive
    /// rebuilds land in the order they were built.
    pub fn record(&self, record: PredictionRecord) -> bool {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        if log.records.len() >= MAX_PREDICTION_RECORDS {
            log.records.drain(..MAX_PREDICTION_RECORDS / 10);
        }
        log.records.push(record);
        log.since_rebuild += 1;

        if log.since_rebuild < self.params.recalibrate_every {
            return false;
        }
        log.since_rebuild = 0;
        self.publish(CalibrationTable::build(&log.records, &self.params));
        true
    }

    /// Rebuild immediately from every retained record.
    pub fn recalibrate(&self) -> Arc<CalibrationTable> {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.since_rebuild = 0;
        self.publish(CalibrationTable::build(&log.records, &self.params));
        self.snapshot()
    }

    /// Number of retained prediction records.
    pub fn record_count(&self) -> usize {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).records.len()
    }

    fn publish(&self, table: CalibrationTable) {
        debug!(
            records = table.built_from,
            adjustments = ?table.bins().iter().map(|b| b.adjustment).collect::<Vec<_>>(),
            "Calibration table rebuilt"
        );
        let fresh = Arc::new(table);
        *self.table.write().unwrap_or_else(|e| e.into_inner()) = fresh;
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(CalibrationParams::default())
    }
}

impl OutcomeRecorder for Calibrator {
    fn record_prediction(
        &self,
        predicted_confidence: f64,
        actual_outcome: bool,
        instinct_id: &str,
        thread_id: &ThreadId,
    ) {
        self.record(PredictionRecord {
            predicted: predicted_confidence,
            outcome: actual_outcome,
            instinct_id: instinct_id.to_string(),
            thread_id: thread_id.clone(),
            recorded_at: Utc::now(),
        });
    }
}
