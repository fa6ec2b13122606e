//! Labelled CSV dataset loading and stratified splitting

use crate::error::{PipelineError, Result};
use crate::table::Table;
use crate::types::Value;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Name of the target column in training files
pub const LABEL_COLUMN: &str = "label";

/// Feature table plus binary labels
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Table,
    pub labels: Vec<u8>,
}

impl Dataset {
    /// Load a CSV file with a header row and a `label` column of 0/1.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            PipelineError::Dataset(format!("cannot open {}: {}", path.display(), e))
        })?;
        let dataset = Self::from_reader(file)?;
        debug!(
            path = %path.display(),
            rows = dataset.len(),
            columns = dataset.features.num_columns(),
            "Dataset loaded"
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(str::to_string)
            .collect();

        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(csv_error)?;
            if record.len() != headers.len() {
                return Err(PipelineError::Dataset(format!(
                    "row {}: expected {} fields, got {}",
                    line + 1,
                    headers.len(),
                    record.len()
                )));
            }
            for (column, cell) in columns.iter_mut().zip(record.iter()) {
                column.push(Value::from_cell(cell));
            }
        }

        let rows = columns.first().map_or(0, Vec::len);
        if rows == 0 {
            return Err(PipelineError::Dataset("dataset is empty".into()));
        }

        let mut features = Table::new(rows);
        for (name, values) in headers.iter().zip(columns) {
            features.insert_column(name, values);
        }

        let label_values = features.remove_column(LABEL_COLUMN).ok_or_else(|| {
            PipelineError::Dataset(format!("missing '{}' column", LABEL_COLUMN))
        })?;
        let labels = label_values
            .iter()
            .enumerate()
            .map(|(row, v)| parse_label(row, v))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Fraction of positive labels
    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().filter(|&&l| l == 1).count() as f64 / self.labels.len() as f64
    }

    /// Deterministic split preserving the class balance in both halves.
    /// Returns `(train, test)`.
    pub fn stratified_split(&self, test_fraction: f64, seed: u64) -> Result<(Dataset, Dataset)> {
        if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
            return Err(PipelineError::Dataset(format!(
                "test fraction must be in (0, 1), got {}",
                test_fraction
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut train_idx = Vec::new();
        let mut test_idx = Vec::new();

        for class in [0u8, 1u8] {
            let mut idx: Vec<usize> = (0..self.len()).filter(|&i| self.labels[i] == class).collect();
            idx.shuffle(&mut rng);
            let n_test = (idx.len() as f64 * test_fraction).round() as usize;
            test_idx.extend_from_slice(&idx[..n_test]);
            train_idx.extend_from_slice(&idx[n_test..]);
        }

        train_idx.shuffle(&mut rng);
        test_idx.shuffle(&mut rng);

        Ok((self.subset(&train_idx), self.subset(&test_idx)))
    }

    fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: self.features.select_rows(indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

fn parse_label(row: usize, value: &Value) -> Result<u8> {
    match value.as_number() {
        Ok(Some(n)) if n == 0.0 => Ok(0),
        Ok(Some(n)) if n == 1.0 => Ok(1),
        _ => Err(PipelineError::Dataset(format!(
            "row {}: label must be 0 or 1, got {:?}",
            row + 1,
            value
        ))),
    }
}

fn csv_error(err: csv::Error) -> PipelineError {
    PipelineError::Dataset(format!("csv: {}", err))
}
