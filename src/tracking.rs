//! Lightweight run tracking
//!
//! Records the parameters, metrics and artifact paths of one pipeline
//! run as a single JSON document. Ordered maps keep the serialized runs
//! diffable between executions.

use crate::error::{PricecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// One tracked run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub tags: BTreeMap<String, String>,
    pub artifacts: Vec<String>,
}

impl RunContext {
    pub fn start(name: impl Into<String>) -> Self {
        let name = name.into();
        info!(run = %name, "run started");
        Self {
            name,
            started_at: Utc::now(),
            finished_at: None,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            tags: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn log_param(&mut self, key: impl Into<String>, value: impl ToString) {
        self.params.insert(key.into(), value.to_string());
    }

    pub fn log_metric(&mut self, key: impl Into<String>, value: f64) {
        self.metrics.insert(key.into(), value);
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn log_artifact(&mut self, path: impl Into<String>) {
        self.artifacts.push(path.into());
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
        info!(run = %self.name, metrics = self.metrics.len(), "run finished");
    }

    /// Write the run record as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            PricecastError::Serialization(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lifecycle() {
        let mut run = RunContext::start("train");
        run.log_param("seed", 42);
        run.log_metric("rmse", 3.5);
        run.set_tag("stage", "training");
        run.log_artifact("out/pipeline.json");
        run.finish();

        assert_eq!(run.params.get("seed"), Some(&"42".to_string()));
        assert_eq!(run.metrics.get("rmse"), Some(&3.5));
        assert!(run.finished_at.is_some());
        assert_eq!(run.artifacts.len(), 1);
    }

    #[test]
    fn test_save_load() {
        let dir = std::env::temp_dir().join("pricecast_test_tracking");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("run.json");

        let mut run = RunContext::start("prep");
        run.log_metric("rows", 100.0);
        run.finish();
        run.save(&path).unwrap();

        let loaded = RunContext::load(&path).unwrap();
        assert_eq!(loaded.name, "prep");
        assert_eq!(loaded.metrics.get("rows"), Some(&100.0));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
