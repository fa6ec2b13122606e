//! Columnar value table passed between loading, coercion and the transform stage

use crate::types::{FeatureRecord, Value};
use std::collections::HashMap;

/// Named columns of equal length.
///
/// Column order is insertion order; lookups are by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
    index: HashMap<String, usize>,
    rows: usize,
}

impl Table {
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Add or replace a column. Lengths are not enforced here; the transform
    /// stage rejects a column whose length disagrees with `num_rows`.
    pub fn insert_column(&mut self, name: &str, values: Vec<Value>) {
        match self.index.get(name) {
            Some(&i) => self.columns[i] = values,
            None => {
                self.index.insert(name.to_string(), self.names.len());
                self.names.push(name.to_string());
                self.columns.push(values);
            }
        }
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Vec<Value>> {
        let i = self.index.remove(name)?;
        self.names.remove(i);
        let values = self.columns.remove(i);
        for idx in self.index.values_mut() {
            if *idx > i {
                *idx -= 1;
            }
        }
        Some(values)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.index.get(name).map(|&i| self.columns[i].as_slice())
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.names.len()
    }

    /// Keep only the rows at `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        let mut out = Table::new(indices.len());
        for (name, column) in self.names.iter().zip(&self.columns) {
            out.insert_column(name, indices.iter().map(|&i| column[i].clone()).collect());
        }
        out
    }

    /// Pivot records into columns for the given names. Names a record lacks
    /// become `Value::Missing`; record keys outside `names` are dropped.
    pub fn from_records<'a, I>(names: I, records: &[FeatureRecord]) -> Table
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut table = Table::new(records.len());
        for name in names {
            let values = records
                .iter()
                .map(|r| r.get(name).cloned().unwrap_or_default())
                .collect();
            table.insert_column(name, values);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new(3);
        table.insert_column("age", vec![25.0.into(), 40.0.into(), Value::Missing]);
        table.insert_column("sex", vec!["Male".into(), "Female".into(), "Male".into()]);
        table
    }

    #[test]
    fn test_column_lookup_and_order() {
        let table = sample();
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.column_names(), &["age".to_string(), "sex".to_string()]);
        assert_eq!(table.column("sex").map(|c| c.len()), Some(3));
        assert!(table.column("race").is_none());
    }

    #[test]
    fn test_remove_column_reindexes() {
        let mut table = sample();
        table.insert_column("label", vec![0.0.into(), 1.0.into(), 0.0.into()]);

        let removed = table.remove_column("age");
        assert_eq!(removed.map(|c| c.len()), Some(3));
        assert_eq!(table.column("label").map(|c| c[1].clone()), Some(Value::Number(1.0)));
        assert_eq!(table.num_columns(), 2);
    }

    #[test]
    fn test_select_rows() {
        let table = sample().select_rows(&[2, 0]);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column("age").unwrap()[0], Value::Missing);
        assert_eq!(table.column("age").unwrap()[1], Value::Number(25.0));
    }

    #[test]
    fn test_from_records_fills_missing_and_drops_extra() {
        let records = vec![
            FeatureRecord::new().with("age", 30.0).with("zodiac", "Leo"),
            FeatureRecord::new().with("sex", "Female"),
        ];
        let table = Table::from_records(["age", "sex"], &records);

        assert_eq!(table.column("age").unwrap()[1], Value::Missing);
        assert_eq!(table.column("sex").unwrap()[0], Value::Missing);
        assert!(table.column("zodiac").is_none());
    }
}
