//! Model metadata registry.
//!
//! Fairness needs to know which feature names are protected attributes and
//! which prediction label counts as the positive outcome. That metadata is
//! owned by the project service; this module defines the lookup trait the
//! engines use, a static implementation for tests and the CLI, and a
//! read-through cache so a slow registry is not hit once per prediction.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use tw_common::{Error, ModelKey, Result};

/// Metadata for one monitored model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Feature names treated as protected attributes for fairness grouping.
    pub protected_attributes: Vec<String>,
    /// The prediction label counted as the positive outcome.
    pub positive_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}

/// Lookup of model metadata.
pub trait ModelRegistry: Send + Sync {
    fn model_info(&self, model: &ModelKey) -> Result<ModelInfo>;
}

/// Fixed in-memory registry.
#[derive(Default)]
pub struct StaticRegistry {
    models: HashMap<ModelKey, ModelInfo>,
}

/// One entry in a registry JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub project_id: String,
    pub model_id: String,
    #[serde(flatten)]
    pub info: ModelInfo,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: ModelKey, info: ModelInfo) {
        self.models.insert(model, info);
    }

    /// Load a JSON array of [`RegistryEntry`] records.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<RegistryEntry> = serde_json::from_str(&raw)?;
        let mut registry = StaticRegistry::new();
        for entry in entries {
            registry.register(
                ModelKey::new(entry.project_id, entry.model_id),
                entry.info,
            );
        }
        Ok(registry)
    }

    /// All registered model keys, in deterministic order.
    pub fn model_keys(&self) -> Vec<ModelKey> {
        let mut keys: Vec<ModelKey> = self.models.keys().cloned().collect();
        keys.sort_by_key(|k| k.to_string());
        keys
    }
}

impl ModelRegistry for StaticRegistry {
    fn model_info(&self, model: &ModelKey) -> Result<ModelInfo> {
        self.models
            .get(model)
            .cloned()
            .ok_or_else(|| Error::InvalidConfig(format!("model not registered: {}", model)))
    }
}

struct CacheEntry {
    info: ModelInfo,
    fetched_at: DateTime<Utc>,
}

/// Read-through cache over another registry with a fixed TTL.
pub struct CachedRegistry<R> {
    inner: R,
    ttl: Duration,
    cache: Mutex<HashMap<ModelKey, CacheEntry>>,
}

impl<R: ModelRegistry> CachedRegistry<R> {
    pub fn new(inner: R, ttl_secs: u64) -> Self {
        CachedRegistry {
            inner,
            ttl: Duration::seconds(ttl_secs as i64),
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl<R: ModelRegistry> ModelRegistry for CachedRegistry<R> {
    fn model_info(&self, model: &ModelKey) -> Result<ModelInfo> {
        let now = Utc::now();
        {
            let cache = match self.cache.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(entry) = cache.get(model) {
                if now - entry.fetched_at < self.ttl {
                    return Ok(entry.info.clone());
                }
            }
        }
        let info = self.inner.model_info(model)?;
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.insert(
            model.clone(),
            CacheEntry {
                info: info.clone(),
                fetched_at: now,
            },
        );
        Ok(info)
    }
}
