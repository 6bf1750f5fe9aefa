//! In-memory prediction store, used by tests and the CLI.

use std::collections::HashMap;
use std::sync::Mutex;

use tw_common::{ModelKey, Result};

use crate::schema::{PredictionRecord, TimeWindow};
use crate::store::PredictionStore;

/// Prediction store backed by a per-model vector kept in timestamp order.
#[derive(Debug, Default)]
pub struct InMemoryPredictionStore {
    by_model: Mutex<HashMap<ModelKey, Vec<PredictionRecord>>>,
}

impl InMemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one prediction, keeping the model's records sorted.
    pub fn insert(&self, record: PredictionRecord) {
        let mut by_model = self.lock();
        let records = by_model.entry(record.model_key()).or_default();
        let pos = records.partition_point(|r| r.timestamp <= record.timestamp);
        records.insert(pos, record);
    }

    /// Bulk insert; more efficient than repeated [`insert`](Self::insert).
    pub fn extend(&self, records: impl IntoIterator<Item = PredictionRecord>) {
        let mut by_model = self.lock();
        for record in records {
            by_model.entry(record.model_key()).or_default().push(record);
        }
        for records in by_model.values_mut() {
            records.sort_by_key(|r| r.timestamp);
        }
    }

    /// Model keys with at least one prediction.
    pub fn model_keys(&self) -> Vec<ModelKey> {
        let mut keys: Vec<ModelKey> = self.lock().keys().cloned().collect();
        keys.sort_by_key(|k| k.to_string());
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ModelKey, Vec<PredictionRecord>>> {
        match self.by_model.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl PredictionStore for InMemoryPredictionStore {
    fn query(&self, model: &ModelKey, window: &TimeWindow) -> Result<Vec<PredictionRecord>> {
        let by_model = self.lock();
        let Some(records) = by_model.get(model) else {
            return Ok(Vec::new());
        };
        let start = records.partition_point(|r| r.timestamp < window.start);
        let end = records.partition_point(|r| r.timestamp < window.end);
        Ok(records[start..end].to_vec())
    }
}
