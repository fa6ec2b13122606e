//! Scoring service: coerce incoming records to the loaded schema and score them

use crate::artifact::LoadedArtifact;
use crate::error::{PipelineError, Result};
use crate::models::pipeline::Pipeline;
use crate::schema::SchemaDescriptor;
use crate::table::Table;
use crate::types::{FeatureRecord, OneOrMany, Prediction, Value, UNKNOWN_CATEGORY};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Liveness payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// Immutable scoring handle over one fitted pipeline.
///
/// Built once at startup and shared (`Arc<ScoringService>`) by every request
/// handler; nothing here mutates after construction.
#[derive(Debug)]
pub struct ScoringService {
    pipeline: Pipeline,
    schema: SchemaDescriptor,
    version: Option<String>,
}

impl ScoringService {
    /// Pair a fitted pipeline with the schema requests are coerced to.
    pub fn new(pipeline: Pipeline, schema: SchemaDescriptor) -> Result<Self> {
        pipeline.fitted()?.transform.check_schema(&schema)?;
        Ok(Self {
            pipeline,
            schema,
            version: None,
        })
    }

    pub fn from_artifact(artifact: LoadedArtifact) -> Result<Self> {
        let mut service = Self::new(artifact.pipeline, artifact.schema)?;
        service.version = Some(artifact.manifest.version);
        Ok(service)
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// Artifact version this service was loaded from, if any
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
        }
    }

    /// Score records in order. The whole batch fails if any record lacks a
    /// required numeric field.
    pub fn predict(&self, records: &[FeatureRecord]) -> Result<Vec<Prediction>> {
        let table = self.coerce(records)?;
        let probabilities = self.pipeline.predict_probability(&table)?;

        debug!(records = records.len(), "Batch scored");

        Ok(probabilities
            .into_iter()
            .map(Prediction::from_probability)
            .collect())
    }

    pub fn predict_one(&self, record: &FeatureRecord) -> Result<Prediction> {
        self.predict(std::slice::from_ref(record))?
            .pop()
            .ok_or_else(|| PipelineError::InvalidRecord("no prediction produced".into()))
    }

    /// Score a single record or a batch, answering in the same shape.
    pub fn score(&self, request: OneOrMany<FeatureRecord>) -> Result<OneOrMany<Prediction>> {
        match request {
            OneOrMany::One(record) => self.predict_one(&record).map(OneOrMany::One),
            OneOrMany::Many(records) => self.predict(&records).map(OneOrMany::Many),
        }
    }

    /// Build the columnar input in schema order.
    ///
    /// Numeric fields must be present and hold non-negative integers (`null`
    /// is imputed with 0). Categorical fields may be absent or `null` and
    /// become [`UNKNOWN_CATEGORY`]. Keys outside the schema are dropped.
    pub fn coerce(&self, records: &[FeatureRecord]) -> Result<Table> {
        let mut table = Table::new(records.len());

        for name in self.schema.numeric() {
            let values = records
                .iter()
                .enumerate()
                .map(|(i, record)| coerce_numeric(i, name, record))
                .collect::<Result<Vec<_>>>()?;
            table.insert_column(name, values);
        }

        for name in self.schema.categorical() {
            let values = records
                .iter()
                .map(|record| {
                    let category = record
                        .get(name)
                        .and_then(Value::as_category)
                        .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
                    Value::Text(category)
                })
                .collect();
            table.insert_column(name, values);
        }

        Ok(table)
    }
}

fn coerce_numeric(index: usize, name: &str, record: &FeatureRecord) -> Result<Value> {
    let value = record.get(name).ok_or_else(|| {
        PipelineError::InvalidRecord(format!(
            "record {} is missing required numeric field '{}'",
            index, name
        ))
    })?;
    match value.as_number() {
        Ok(None) => Ok(Value::Number(0.0)),
        Ok(Some(n)) if n >= 0.0 && n.fract() == 0.0 => Ok(Value::Number(n)),
        Ok(Some(n)) => Err(PipelineError::InvalidRecord(format!(
            "record {} field '{}' must be a non-negative integer, got {}",
            index, name, n
        ))),
        Err(_) => Err(PipelineError::InvalidRecord(format!(
            "record {} field '{}' is not numeric: {:?}",
            index, name, value
        ))),
    }
}
