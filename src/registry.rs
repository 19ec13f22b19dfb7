//! Model registry: versioned pipeline storage with pre-registration
//! checks
//!
//! Registration always reload-checks the serialized pipeline against the
//! in-memory one before a version is published. Metric thresholds are
//! advisory: a weak model registers with warnings, it is never blocked.

use crate::error::{PricecastError, Result};
use crate::pipeline::{PipelineSignature, PricingPipeline};
use crate::training::{ForestParams, ModelComparison};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Semantic version
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ModelVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse from string (e.g., "1.2.3")
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(PricecastError::Validation(format!(
                "invalid version format: {}",
                s
            )));
        }
        let parse = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| PricecastError::Validation(format!("invalid version part: {}", p)))
        };
        Ok(Self {
            major: parse(parts[0])?,
            minor: parse(parts[1])?,
            patch: parse(parts[2])?,
        })
    }

    pub fn bump_minor(&self) -> Self {
        Self::new(self.major, self.minor + 1, 0)
    }
}

impl std::fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Default for ModelVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// A pipeline with everything needed to audit the version later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedPipeline {
    pub version: ModelVersion,
    pub pipeline: PricingPipeline,
    pub signature: PipelineSignature,
    pub metrics: ModelComparison,
    pub params: ForestParams,
    /// Predictions on the fixed reload-check sample, recorded so a later
    /// audit can re-run the same rows and compare
    pub sample_outputs: Vec<f64>,
    pub description: String,
    pub registered_at: DateTime<Utc>,
}

/// Registry entry (metadata only, without the pipeline payload)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub version: ModelVersion,
    pub signature: PipelineSignature,
    pub rmse: f64,
    pub r2: f64,
    pub description: String,
    /// File path relative to the registry root
    pub path: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryIndex {
    pub models: HashMap<String, Vec<RegistryEntry>>,
}

/// Storage seam for registered pipelines.
pub trait RegistryBackend {
    /// Persist one versioned pipeline and return its storage path.
    fn store(&mut self, name: &str, versioned: &VersionedPipeline) -> Result<String>;

    /// Highest registered version for a model, if any.
    fn latest_version(&self, name: &str) -> Option<ModelVersion>;

    /// Load the highest registered version.
    fn load_latest(&self, name: &str) -> Result<VersionedPipeline>;

    /// Load one specific version.
    fn load_version(&self, name: &str, version: &ModelVersion) -> Result<VersionedPipeline>;
}

/// Filesystem-backed registry: an `index.json` plus one binary payload
/// per registered version.
pub struct LocalRegistry {
    root: PathBuf,
    index: RegistryIndex,
}

impl LocalRegistry {
    /// Create or open a registry at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.exists() {
            fs::create_dir_all(&root)?;
        }

        let index_path = root.join("index.json");
        let index = if index_path.exists() {
            let file = File::open(&index_path)?;
            serde_json::from_reader(BufReader::new(file))?
        } else {
            RegistryIndex::default()
        };

        Ok(Self { root, index })
    }

    fn save_index(&self) -> Result<()> {
        let file = File::create(self.root.join("index.json"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.index)?;
        Ok(())
    }

    fn load(&self, relative_path: &str) -> Result<VersionedPipeline> {
        let bytes = fs::read(self.root.join(relative_path))?;
        bincode::deserialize(&bytes)
            .map_err(|e| PricecastError::Serialization(format!("corrupt registry payload: {}", e)))
    }

    /// All registered versions of a model, oldest first.
    pub fn versions(&self, name: &str) -> Vec<ModelVersion> {
        let mut versions: Vec<ModelVersion> = self
            .index
            .models
            .get(name)
            .map(|entries| entries.iter().map(|e| e.version.clone()).collect())
            .unwrap_or_default();
        versions.sort();
        versions
    }

    pub fn entries(&self, name: &str) -> &[RegistryEntry] {
        self.index
            .models
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

impl RegistryBackend for LocalRegistry {
    fn store(&mut self, name: &str, versioned: &VersionedPipeline) -> Result<String> {
        let model_dir = self.root.join(name);
        fs::create_dir_all(&model_dir)?;

        let file_name = format!("v{}.bin", versioned.version);
        let relative_path = format!("{}/{}", name, file_name);

        let bytes = bincode::serialize(versioned)
            .map_err(|e| PricecastError::Serialization(format!("cannot serialize: {}", e)))?;
        let mut file = File::create(model_dir.join(&file_name))?;
        file.write_all(&bytes)?;

        self.index
            .models
            .entry(name.to_string())
            .or_default()
            .push(RegistryEntry {
                name: name.to_string(),
                version: versioned.version.clone(),
                signature: versioned.signature.clone(),
                rmse: versioned.metrics.best.rmse,
                r2: versioned.metrics.best.r2,
                description: versioned.description.clone(),
                path: relative_path.clone(),
                registered_at: versioned.registered_at,
            });
        self.save_index()?;

        Ok(relative_path)
    }

    fn latest_version(&self, name: &str) -> Option<ModelVersion> {
        self.index
            .models
            .get(name)?
            .iter()
            .map(|e| e.version.clone())
            .max()
    }

    fn load_latest(&self, name: &str) -> Result<VersionedPipeline> {
        let entries = self
            .index
            .models
            .get(name)
            .ok_or_else(|| PricecastError::Registration(format!("model not found: {}", name)))?;
        let latest = entries
            .iter()
            .max_by(|a, b| a.version.cmp(&b.version))
            .ok_or_else(|| PricecastError::Registration(format!("no versions for: {}", name)))?;
        self.load(&latest.path)
    }

    fn load_version(&self, name: &str, version: &ModelVersion) -> Result<VersionedPipeline> {
        let entries = self
            .index
            .models
            .get(name)
            .ok_or_else(|| PricecastError::Registration(format!("model not found: {}", name)))?;
        let entry = entries
            .iter()
            .find(|e| &e.version == version)
            .ok_or_else(|| {
                PricecastError::Registration(format!("version not found: {}", version))
            })?;
        self.load(&entry.path)
    }
}

/// Advisory quality gates checked at registration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationThresholds {
    pub rmse_ceiling: f64,
    pub r2_floor: f64,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            rmse_ceiling: 10.0,
            r2_floor: 0.8,
        }
    }
}

/// Everything registration needs from the earlier stages.
pub struct RegistrationRequest {
    pub name: String,
    pub pipeline: PricingPipeline,
    pub metrics: ModelComparison,
    pub params: ForestParams,
    pub description: String,
    pub thresholds: ValidationThresholds,
}

/// What a registration produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub version: ModelVersion,
    pub path: String,
    /// Advisory threshold misses; never fatal
    pub warnings: Vec<String>,
}

/// Three synthetic rows for the reload check: fitted medians and modes,
/// the first fitted category, and a category no fit has ever seen.
fn sample_frame(pipeline: &PricingPipeline) -> Result<DataFrame> {
    const SAMPLE_ROWS: usize = 3;
    let mut columns: Vec<Column> = Vec::new();

    for (name, stats) in pipeline.transformer.numeric_stats() {
        let values = vec![stats.median; SAMPLE_ROWS];
        columns.push(Column::new(name.as_str().into(), values));
    }
    for (name, stats) in pipeline.transformer.categorical_stats() {
        let first = stats
            .vocabulary
            .first()
            .map(|s| s.as_str())
            .unwrap_or(stats.mode.as_str());
        let values = vec![stats.mode.as_str(), first, "__unseen__"];
        columns.push(Column::new(name.as_str().into(), values));
    }

    DataFrame::new(columns).map_err(Into::into)
}

/// Round-trip the pipeline through its storage encoding and verify the
/// copy predicts identically on the sample rows. Returns those
/// predictions for the registered payload.
fn reload_check(pipeline: &PricingPipeline) -> Result<Vec<f64>> {
    let sample = sample_frame(pipeline)?;
    let expected = pipeline.predict(&sample)?;
    if expected.len() != sample.height() || expected.iter().any(|p| !p.is_finite()) {
        return Err(PricecastError::Registration(
            "pipeline produced missing or non-finite sample predictions".to_string(),
        ));
    }

    let bytes = bincode::serialize(pipeline)
        .map_err(|e| PricecastError::Serialization(format!("cannot serialize: {}", e)))?;
    let reloaded: PricingPipeline = bincode::deserialize(&bytes)
        .map_err(|e| PricecastError::Serialization(format!("cannot deserialize: {}", e)))?;
    let actual = reloaded.predict(&sample)?;

    for (e, a) in expected.iter().zip(actual.iter()) {
        if (e - a).abs() > 1e-9 {
            return Err(PricecastError::Registration(format!(
                "reloaded pipeline disagrees with the original: {} vs {}",
                e, a
            )));
        }
    }
    Ok(expected.to_vec())
}

fn threshold_warnings(metrics: &ModelComparison, thresholds: &ValidationThresholds) -> Vec<String> {
    let mut warnings = Vec::new();
    if metrics.best.rmse >= thresholds.rmse_ceiling {
        warnings.push(format!(
            "RMSE {:.4} is above the {:.4} ceiling",
            metrics.best.rmse, thresholds.rmse_ceiling
        ));
    }
    if metrics.best.r2 <= thresholds.r2_floor {
        warnings.push(format!(
            "R² {:.4} is below the {:.4} floor",
            metrics.best.r2, thresholds.r2_floor
        ));
    }
    warnings
}

/// Validate a pipeline and publish it as the next minor version.
pub fn register_model(
    backend: &mut dyn RegistryBackend,
    request: RegistrationRequest,
) -> Result<RegistrationRecord> {
    let sample_outputs = reload_check(&request.pipeline)?;

    let warnings = threshold_warnings(&request.metrics, &request.thresholds);
    for w in &warnings {
        warn!(model = %request.name, "{}", w);
    }

    let version = backend
        .latest_version(&request.name)
        .map(|v| v.bump_minor())
        .unwrap_or_default();

    let versioned = VersionedPipeline {
        version: version.clone(),
        signature: request.pipeline.signature(),
        pipeline: request.pipeline,
        metrics: request.metrics,
        params: request.params,
        sample_outputs,
        description: request.description,
        registered_at: Utc::now(),
    };
    let path = backend.store(&request.name, &versioned)?;

    info!(model = %request.name, version = %version, path = %path, "model registered");

    Ok(RegistrationRecord {
        version,
        path,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::FeatureTransformer;
    use crate::training::{ForestParams, RandomForest};
    use crate::evaluation::RegressionReport;

    fn fitted_pipeline() -> PricingPipeline {
        let df = df!(
            "Mileage" => &[10.0, 20.0, 30.0, 40.0],
            "Segment" => &["a", "b", "a", "b"]
        )
        .unwrap();
        let transformer = FeatureTransformer::fit(
            &df,
            &["Mileage".to_string()],
            &["Segment".to_string()],
        )
        .unwrap();
        let x = transformer.transform(&df).unwrap();
        let y = ndarray::array![1.0, 2.0, 3.0, 4.0];
        let mut model = RandomForest::new(
            ForestParams {
                n_estimators: 5,
                ..Default::default()
            },
            42,
        );
        model.fit(&x, &y).unwrap();
        PricingPipeline::new(transformer, model, "price".to_string())
    }

    fn metrics(rmse: f64, r2: f64) -> ModelComparison {
        let report = RegressionReport {
            rmse,
            mae: rmse,
            r2,
            n_samples: 10,
        };
        ModelComparison {
            baseline: report.clone(),
            best: report,
            improvement_percent: Some(0.0),
        }
    }

    fn request(name: &str, rmse: f64, r2: f64) -> RegistrationRequest {
        RegistrationRequest {
            name: name.to_string(),
            pipeline: fitted_pipeline(),
            metrics: metrics(rmse, r2),
            params: ForestParams {
                n_estimators: 5,
                ..Default::default()
            },
            description: "test".to_string(),
            thresholds: ValidationThresholds::default(),
        }
    }

    #[test]
    fn test_version_parse_display() {
        let v = ModelVersion::parse("2.5.1").unwrap();
        assert_eq!(v, ModelVersion::new(2, 5, 1));
        assert_eq!(v.to_string(), "2.5.1");
        assert_eq!(v.bump_minor(), ModelVersion::new(2, 6, 0));
        assert!(ModelVersion::parse("1.2").is_err());
        assert!(ModelVersion::parse("a.b.c").is_err());
    }

    #[test]
    fn test_register_and_reload() {
        let dir = std::env::temp_dir().join("pricecast_test_registry_reload");
        let _ = std::fs::remove_dir_all(&dir);
        let mut registry = LocalRegistry::open(&dir).unwrap();

        let record = register_model(&mut registry, request("car-price", 5.0, 0.9)).unwrap();
        assert_eq!(record.version, ModelVersion::new(1, 0, 0));
        assert!(record.warnings.is_empty());

        let loaded = registry.load_latest("car-price").unwrap();
        assert_eq!(loaded.version, ModelVersion::new(1, 0, 0));
        assert_eq!(loaded.signature.output, "price");
        assert_eq!(loaded.params.n_estimators, 5);
        assert_eq!(loaded.sample_outputs.len(), 3);
        assert!(loaded.sample_outputs.iter().all(|p| p.is_finite()));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_version_bumps_across_registrations() {
        let dir = std::env::temp_dir().join("pricecast_test_registry_bump");
        let _ = std::fs::remove_dir_all(&dir);
        let mut registry = LocalRegistry::open(&dir).unwrap();

        let first = register_model(&mut registry, request("car-price", 5.0, 0.9)).unwrap();
        let second = register_model(&mut registry, request("car-price", 4.0, 0.92)).unwrap();

        assert_eq!(first.version, ModelVersion::new(1, 0, 0));
        assert_eq!(second.version, ModelVersion::new(1, 1, 0));
        assert_eq!(
            registry.versions("car-price"),
            vec![ModelVersion::new(1, 0, 0), ModelVersion::new(1, 1, 0)]
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_weak_model_registers_with_warnings() {
        let dir = std::env::temp_dir().join("pricecast_test_registry_warn");
        let _ = std::fs::remove_dir_all(&dir);
        let mut registry = LocalRegistry::open(&dir).unwrap();

        let record = register_model(&mut registry, request("car-price", 50.0, 0.1)).unwrap();
        assert_eq!(record.warnings.len(), 2);
        assert!(registry.load_latest("car-price").is_ok());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_index_survives_reopen() {
        let dir = std::env::temp_dir().join("pricecast_test_registry_reopen");
        let _ = std::fs::remove_dir_all(&dir);

        {
            let mut registry = LocalRegistry::open(&dir).unwrap();
            register_model(&mut registry, request("car-price", 5.0, 0.9)).unwrap();
        }

        let registry = LocalRegistry::open(&dir).unwrap();
        assert_eq!(
            registry.latest_version("car-price"),
            Some(ModelVersion::new(1, 0, 0))
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unknown_model_fails() {
        let dir = std::env::temp_dir().join("pricecast_test_registry_missing");
        let _ = std::fs::remove_dir_all(&dir);
        let registry = LocalRegistry::open(&dir).unwrap();

        assert!(registry.load_latest("nope").is_err());
        assert!(registry.latest_version("nope").is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
