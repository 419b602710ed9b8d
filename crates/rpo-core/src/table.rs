//! In-memory tables with named, typed columns.
//!
//! Every result the engine hands to an output layer is a [`Table`]: record
//! sets, activity reports, ownership tables and revision × actor matrices.

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// Type of the values held by a column. Any column may also hold nulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Str,
    Int,
    Bool,
    Time,
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Time(DateTime<FixedOffset>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Str(_) => 3,
            Value::Time(_) => 4,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::from(v as u64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Time(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Time(t) => serializer.serialize_str(&t.to_rfc3339()),
        }
    }
}

/// The keys a wide table was pivoted by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotKeys {
    pub row_key: String,
    pub column_key: String,
    pub value_field: String,
}

/// A column-typed table of rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pivoted_by: Option<PivotKeys>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            pivoted_by: None,
        }
    }

    pub(crate) fn with_pivot(mut self, keys: PivotKeys) -> Self {
        self.pivoted_by = Some(keys);
        self
    }

    /// Append a row. The row must have one value per column.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::RecordValidation(format!(
                "row has {} value(s) but the table has {} column(s)",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Index of a column that must exist.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            Error::Configuration(format!(
                "no column named {name:?}; available: {}",
                self.column_names().join(", ")
            ))
        })
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub(crate) fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    /// A table with this one's columns and pivot marker holding `rows`.
    ///
    /// Every row must already match the column count.
    pub(crate) fn with_rows(&self, rows: Vec<Vec<Value>>) -> Table {
        debug_assert!(rows.iter().all(|r| r.len() == self.columns.len()));
        Table {
            columns: self.columns.clone(),
            rows,
            pivoted_by: self.pivoted_by.clone(),
        }
    }

    pub fn pivoted_by(&self) -> Option<&PivotKeys> {
        self.pivoted_by.as_ref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `row` in the named column.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// All values of the named column.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Sum of an integer column; nulls count as zero.
    pub fn sum(&self, name: &str) -> Result<i64> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().filter_map(|r| r[idx].as_int()).sum())
    }

    /// Number of distinct non-null values in a column.
    pub fn distinct_count(&self, name: &str) -> Result<usize> {
        let idx = self.require_column(name)?;
        let distinct: HashSet<&Value> = self
            .rows
            .iter()
            .map(|r| &r[idx])
            .filter(|v| !v.is_null())
            .collect();
        Ok(distinct.len())
    }

    /// Union of tables that share one schema.
    pub fn concat(columns: Vec<Column>, tables: impl IntoIterator<Item = Table>) -> Result<Table> {
        let mut out = Table::new(columns);
        for table in tables {
            if table.columns != out.columns {
                return Err(Error::Configuration(format!(
                    "cannot union tables with columns [{}] and [{}]",
                    out.column_names().join(", "),
                    table.column_names().join(", ")
                )));
            }
            out.rows.extend(table.rows);
        }
        Ok(out)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| r.iter().map(|v| v.to_string()).collect())
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                cells
                    .iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(c.name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c.name, w = *w))
            .collect();
        writeln!(f, "{}", header.join("  ").trim_end())?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("  "))?;

        for row in &cells {
            let line: Vec<String> = self
                .columns
                .iter()
                .zip(row.iter().zip(&widths))
                .map(|(c, (cell, w))| match c.kind {
                    ColumnType::Int => format!("{:>w$}", cell, w = *w),
                    _ => format!("{:<w$}", cell, w = *w),
                })
                .collect();
            writeln!(f, "{}", line.join("  ").trim_end())?;
        }
        write!(f, "({} row{})", self.rows.len(), if self.rows.len() == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new(vec![
            Column::new("actor", ColumnType::Str),
            Column::new("lines", ColumnType::Int),
        ]);
        table.push_row(vec!["ada".into(), Value::Int(3)]).unwrap();
        table.push_row(vec!["bob".into(), Value::Int(4)]).unwrap();
        table.push_row(vec![Value::Null, Value::Null]).unwrap();
        table
    }

    #[test]
    fn test_push_row_checks_arity() {
        let mut table = sample();
        assert!(matches!(
            table.push_row(vec![Value::Int(1)]),
            Err(Error::RecordValidation(_))
        ));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_sum_and_distinct() {
        let table = sample();
        assert_eq!(table.sum("lines").unwrap(), 7);
        assert_eq!(table.distinct_count("actor").unwrap(), 2);
        assert!(table.sum("missing").is_err());
    }

    #[test]
    fn test_value_ordering_nulls_first() {
        let mut values = vec![Value::Int(2), Value::Null, Value::Int(-1), Value::from("a")];
        values.sort();
        assert_eq!(values, vec![Value::Null, Value::Int(-1), Value::Int(2), Value::from("a")]);
    }

    #[test]
    fn test_concat_requires_same_schema() {
        let a = sample();
        let b = Table::new(vec![Column::new("other", ColumnType::Int)]);
        assert!(Table::concat(a.columns().to_vec(), [a.clone(), b]).is_err());

        let joined = Table::concat(a.columns().to_vec(), [a.clone(), a]).unwrap();
        assert_eq!(joined.len(), 6);
    }

    #[test]
    fn test_display_renders_header_and_count() {
        let text = sample().to_string();
        assert!(text.starts_with("actor  lines"));
        assert!(text.ends_with("(3 rows)"));
    }

    #[test]
    fn test_serialize_as_json() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["columns"][1]["kind"], "int");
        assert_eq!(json["rows"][0][0], "ada");
        assert!(json["rows"][2][1].is_null());
    }
}
