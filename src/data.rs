//! Tabular data: the `Value` cell type and a small column-oriented frame.
//!
//! Fitting input must carry a column for every node and every declared
//! parent; prediction input carries a subset of node columns (the evidence).
//! Missing cells are first-class (`Value::Missing`) and serialize as `null`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{BnError, Result};

/// One cell of a tabular dataset.
///
/// Untagged serde representation: a number, a string, or `null`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Cont(f64),
    Disc(String),
    Missing,
}

impl Value {
    pub fn cont(v: f64) -> Self {
        Value::Cont(v)
    }

    pub fn disc(v: impl Into<String>) -> Self {
        Value::Disc(v.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Coerce to a category label. Continuous values render through
    /// `Display` (`3.0` becomes `"3"`), so integer-coded categoricals key
    /// consistently whether they arrive as numbers or strings.
    pub fn as_category(&self) -> Option<String> {
        match self {
            Value::Disc(s) => Some(s.clone()),
            Value::Cont(v) => Some(format!("{}", v)),
            Value::Missing => None,
        }
    }

    /// Coerce to a number, parsing string cells. A non-numeric string or a
    /// missing cell is an [`BnError::InvalidParentValues`] error.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Cont(v) => Ok(*v),
            Value::Disc(s) => s
                .parse::<f64>()
                .map_err(|_| BnError::InvalidParentValues(format!("`{}` is not numeric", s))),
            Value::Missing => Err(BnError::InvalidParentValues("missing value".into())),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Cont(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Disc(v.to_string())
    }
}

/// A column-oriented table with named, equally-sized columns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    columns: IndexMap<String, Vec<Value>>,
}

impl DataFrame {
    pub fn new() -> Self {
        DataFrame::default()
    }

    /// Insert (or replace) a column. Panics in debug builds if the length
    /// disagrees with existing columns; the first column fixes the row count.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<Value>) {
        debug_assert!(
            self.columns.is_empty() || self.n_rows() == values.len(),
            "column length mismatch"
        );
        self.columns.insert(name.into(), values);
    }

    /// Convenience insert for a categorical column.
    pub fn insert_disc<S: AsRef<str>>(&mut self, name: impl Into<String>, values: &[S]) {
        self.insert(
            name,
            values.iter().map(|v| Value::disc(v.as_ref())).collect(),
        );
    }

    /// Convenience insert for a continuous column.
    pub fn insert_cont(&mut self, name: impl Into<String>, values: &[f64]) {
        self.insert(name, values.iter().map(|v| Value::cont(*v)).collect());
    }

    pub fn n_rows(&self) -> usize {
        self.columns.values().next().map_or(0, |c| c.len())
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Result<&[Value]> {
        self.columns
            .get(name)
            .map(|c| c.as_slice())
            .ok_or_else(|| BnError::MissingColumn(name.to_string()))
    }

    /// The cell at (`name`, `row`); `Missing` when the row is out of range.
    pub fn value(&self, name: &str, row: usize) -> Result<Value> {
        Ok(self
            .column(name)?
            .get(row)
            .cloned()
            .unwrap_or(Value::Missing))
    }

    /// A new frame restricted to the first `n` named columns that exist.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> DataFrame {
        let mut out = DataFrame::new();
        for name in names {
            if let Some(col) = self.columns.get(name.as_ref()) {
                out.insert(name.as_ref(), col.clone());
            }
        }
        out
    }

    /// Assemble a frame from per-record mappings, with columns in `order`.
    /// Records lacking a key contribute `Missing`.
    pub fn from_records<S: AsRef<str>>(records: &[IndexMap<String, Value>], order: &[S]) -> Self {
        let mut out = DataFrame::new();
        for name in order {
            let col = records
                .iter()
                .map(|r| r.get(name.as_ref()).cloned().unwrap_or(Value::Missing))
                .collect();
            out.insert(name.as_ref(), col);
        }
        out
    }
}
