//! Versioned, integrity-checked storage for fitted pipelines.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/
//!   LATEST                       name of the newest complete version
//!   v20261018093000123456-1a2b3c4d/
//!     pipeline.json              fitted transform state + estimator coefficients
//!     schema.json                {"numeric": [...], "categorical": [...]}
//!     metrics.json               {"roc_auc": .., "report": {..}, ..}
//!     manifest.json              unit digests, written last
//! ```
//!
//! A version is staged in a hidden directory and renamed into place only once
//! every unit is on disk, so a reader never sees a partial version. Versions
//! are never rewritten.

use crate::error::{PipelineError, Result};
use crate::evaluation::TrainingMetrics;
use crate::models::pipeline::{FittedPipeline, Pipeline};
use crate::schema::SchemaDescriptor;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const PIPELINE_UNIT: &str = "pipeline.json";
pub const SCHEMA_UNIT: &str = "schema.json";
pub const METRICS_UNIT: &str = "metrics.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const LATEST_POINTER: &str = "LATEST";

/// Bumped whenever the on-disk shape of a unit changes
pub const FORMAT_VERSION: u32 = 1;

const REQUIRED_UNITS: [&str; 3] = [PIPELINE_UNIT, SCHEMA_UNIT, METRICS_UNIT];

/// Written last; lists every unit with its BLAKE3 digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
    pub units: BTreeMap<String, String>,
}

/// A fully loaded, mutually consistent artifact
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub pipeline: Pipeline,
    pub schema: SchemaDescriptor,
    pub metrics: TrainingMetrics,
    pub manifest: Manifest,
}

/// Location of a freshly saved version
#[derive(Debug, Clone, PartialEq)]
pub struct SavedArtifact {
    pub version: String,
    pub path: PathBuf,
}

/// Artifact store rooted at a directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a fitted pipeline with its schema and metrics as a new version.
    pub fn save(
        &self,
        pipeline: &Pipeline,
        schema: &SchemaDescriptor,
        metrics: &TrainingMetrics,
    ) -> Result<SavedArtifact> {
        let fitted = pipeline.fitted()?;
        fitted.transform.check_schema(schema)?;

        fs::create_dir_all(&self.root)?;

        let version = new_version_id();
        let staging = self.root.join(format!(".staging-{}", version));
        let target = self.root.join(&version);

        let result = self.write_version(&staging, &target, &version, fitted, schema, metrics);
        if result.is_err() && staging.exists() {
            if let Err(e) = fs::remove_dir_all(&staging) {
                warn!(path = %staging.display(), error = %e, "Failed to clean up staging directory");
            }
        }
        result?;

        self.write_latest(&version)?;

        info!(version = %version, path = %target.display(), "Artifact saved");
        Ok(SavedArtifact {
            version,
            path: target,
        })
    }

    fn write_version(
        &self,
        staging: &Path,
        target: &Path,
        version: &str,
        fitted: &FittedPipeline,
        schema: &SchemaDescriptor,
        metrics: &TrainingMetrics,
    ) -> Result<()> {
        if target.exists() {
            return Err(PipelineError::Artifact(format!(
                "version {} already exists",
                version
            )));
        }
        fs::create_dir(staging)?;

        let mut units = BTreeMap::new();
        for (name, bytes) in [
            (PIPELINE_UNIT, serde_json::to_vec_pretty(fitted)?),
            (SCHEMA_UNIT, serde_json::to_vec_pretty(schema)?),
            (METRICS_UNIT, serde_json::to_vec_pretty(metrics)?),
        ] {
            write_synced(&staging.join(name), &bytes)?;
            units.insert(name.to_string(), blake3::hash(&bytes).to_hex().to_string());
            debug!(unit = name, bytes = bytes.len(), "Artifact unit written");
        }

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            version: version.to_string(),
            created_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            units,
        };
        write_synced(&staging.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?)?;
        sync_dir(staging)?;

        fs::rename(staging, target)?;
        sync_dir(&self.root)?;
        Ok(())
    }

    fn write_latest(&self, version: &str) -> Result<()> {
        let tmp = self.root.join(format!(".{}.tmp-{}", LATEST_POINTER, version));
        write_synced(&tmp, version.as_bytes())?;
        fs::rename(&tmp, self.root.join(LATEST_POINTER))?;
        sync_dir(&self.root)?;
        Ok(())
    }

    /// Complete versions, oldest first
    pub fn list_versions(&self) -> Result<Vec<String>> {
        let mut versions = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(versions),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !entry.path().join(MANIFEST_FILE).is_file() {
                continue;
            }
            versions.push(name);
        }
        versions.sort();
        Ok(versions)
    }

    /// Version named by `LATEST`, falling back to the newest complete version.
    pub fn latest_version(&self) -> Result<String> {
        match fs::read_to_string(self.root.join(LATEST_POINTER)) {
            Ok(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            _ => self.list_versions()?.pop().ok_or_else(|| {
                PipelineError::Artifact(format!("no artifacts under {}", self.root.display()))
            }),
        }
    }

    pub fn load(&self, version: &str) -> Result<LoadedArtifact> {
        if version.is_empty() || version.contains(['/', '\\']) || version.starts_with('.') {
            return Err(PipelineError::Artifact(format!("invalid version id '{}'", version)));
        }
        load_dir(self.root.join(version))
    }

    pub fn load_latest(&self) -> Result<LoadedArtifact> {
        let version = self.latest_version()?;
        self.load(&version)
    }
}

/// Load and verify one version directory.
///
/// Every failure (missing unit, digest mismatch, unparsable unit, schema and
/// fitted state disagreeing) is reported as [`PipelineError::Artifact`].
pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<LoadedArtifact> {
    let dir = dir.as_ref();

    let manifest_bytes = read_unit(dir, MANIFEST_FILE)?;
    let manifest: Manifest = parse_unit(MANIFEST_FILE, &manifest_bytes)?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(PipelineError::Artifact(format!(
            "unsupported format version {} (expected {})",
            manifest.format_version, FORMAT_VERSION
        )));
    }

    let mut verified = BTreeMap::new();
    for unit in REQUIRED_UNITS {
        let expected = manifest.units.get(unit).ok_or_else(|| {
            PipelineError::Artifact(format!("manifest does not list unit {}", unit))
        })?;
        let bytes = read_unit(dir, unit)?;
        let actual = blake3::hash(&bytes).to_hex().to_string();
        if &actual != expected {
            return Err(PipelineError::Artifact(format!(
                "unit {} digest mismatch (expected {}, found {})",
                unit, expected, actual
            )));
        }
        verified.insert(unit, bytes);
    }

    let fitted: FittedPipeline = parse_unit(PIPELINE_UNIT, &verified[PIPELINE_UNIT])?;
    let schema: SchemaDescriptor = parse_unit(SCHEMA_UNIT, &verified[SCHEMA_UNIT])?;
    let metrics: TrainingMetrics = parse_unit(METRICS_UNIT, &verified[METRICS_UNIT])?;

    let schema = SchemaDescriptor::new(schema.numeric().to_vec(), schema.categorical().to_vec())
        .map_err(|e| PipelineError::Artifact(format!("invalid schema: {}", e)))?;
    let pipeline = Pipeline::from_fitted(schema.clone(), fitted)
        .map_err(|e| PipelineError::Artifact(format!("inconsistent artifact: {}", e)))?;

    info!(
        version = %manifest.version,
        path = %dir.display(),
        features = pipeline.fitted()?.transform.output_width(),
        roc_auc = metrics.roc_auc,
        "Artifact loaded"
    );

    Ok(LoadedArtifact {
        pipeline,
        schema,
        metrics,
        manifest,
    })
}

/// `v<UTC timestamp to the microsecond>-<random suffix>`; ids sort in save order.
fn new_version_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("v{}-{}", Utc::now().format("%Y%m%d%H%M%S%6f"), &id[..8])
}

fn read_unit(dir: &Path, unit: &str) -> Result<Vec<u8>> {
    let path = dir.join(unit);
    fs::read(&path).map_err(|e| {
        PipelineError::Artifact(format!("cannot read unit {}: {}", path.display(), e))
    })
}

fn parse_unit<T: DeserializeOwned>(unit: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| PipelineError::Artifact(format!("unit {} is malformed: {}", unit, e)))
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn sync_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::File::open(dir)?.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}
