//! Grouping, ranking and pivoting over tables.

use crate::error::{Result, Warned, Warning};
use crate::table::{Column, ColumnType, PivotKeys, Table, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name of the derived `insertions - deletions` column.
pub const NET: &str = "net";

/// Which end of the ordering a limited ranking keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extreme {
    /// Top-k: keep the rows with the largest sort values.
    #[default]
    Largest,
    /// Bottom-k: keep the rows with the smallest sort values.
    Smallest,
}

/// How to order and cut a result table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankSpec {
    pub sort_key: String,
    pub descending: bool,
    /// Zero means no limit: the whole table is sorted.
    pub limit: usize,
    pub extreme: Extreme,
}

impl RankSpec {
    pub fn by(sort_key: impl Into<String>) -> Self {
        Self {
            sort_key: sort_key.into(),
            descending: false,
            limit: 0,
            extreme: Extreme::Largest,
        }
    }

    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    pub fn top(mut self, limit: usize) -> Self {
        self.limit = limit;
        self.extreme = Extreme::Largest;
        self
    }

    pub fn bottom(mut self, limit: usize) -> Self {
        self.limit = limit;
        self.extreme = Extreme::Smallest;
        self
    }
}

/// Group rows by `group_keys` and sum `numeric_fields` per group.
///
/// Groups appear in first-seen order. When both `insertions` and `deletions`
/// are summed a `net` column is appended.
pub fn group_and_sum(table: &Table, group_keys: &[&str], numeric_fields: &[&str]) -> Result<Table> {
    let key_idx = group_keys
        .iter()
        .map(|k| table.require_column(k))
        .collect::<Result<Vec<_>>>()?;
    let num_idx = numeric_fields
        .iter()
        .map(|k| table.require_column(k))
        .collect::<Result<Vec<_>>>()?;

    let mut groups: IndexMap<Vec<Value>, Vec<i64>> = IndexMap::new();
    for row in table.rows() {
        let key: Vec<Value> = key_idx.iter().map(|&i| row[i].clone()).collect();
        let sums = groups
            .entry(key)
            .or_insert_with(|| vec![0; num_idx.len()]);
        for (slot, &i) in sums.iter_mut().zip(&num_idx) {
            *slot += row[i].as_int().unwrap_or(0);
        }
    }

    let net_from = numeric_fields
        .iter()
        .position(|f| *f == "insertions")
        .zip(numeric_fields.iter().position(|f| *f == "deletions"));

    let mut columns: Vec<Column> = key_idx.iter().map(|&i| table.columns()[i].clone()).collect();
    columns.extend(numeric_fields.iter().map(|f| Column::new(*f, ColumnType::Int)));
    if net_from.is_some() {
        columns.push(Column::new(NET, ColumnType::Int));
    }

    let mut out = Table::new(columns);
    for (key, sums) in groups {
        let mut row = key;
        row.extend(sums.iter().map(|s| Value::Int(*s)));
        if let Some((ins, del)) = net_from {
            row.push(Value::Int(sums[ins] - sums[del]));
        }
        out.push_row(row)?;
    }
    Ok(out)
}

/// Sort a table, optionally keeping only the top-k or bottom-k rows.
///
/// An unknown sort key falls back to the first column (the group key of a
/// grouped table) and is reported as a warning.
pub fn rank(table: &Table, spec: &RankSpec) -> Warned<Table> {
    let mut warnings = Vec::new();
    let sort_idx = match table.column_index(&spec.sort_key) {
        Some(idx) => idx,
        None => {
            let fallback = table
                .columns()
                .first()
                .map(|c| c.name.clone())
                .unwrap_or_default();
            tracing::warn!(
                "Sort key {:?} not found, sorting by {:?}",
                spec.sort_key,
                fallback
            );
            warnings.push(Warning::InvalidSortKey {
                requested: spec.sort_key.clone(),
                fallback,
            });
            0
        }
    };

    let mut rows = table.clone().into_rows();
    if !table.columns().is_empty() {
        rows.sort_by(|a, b| a[sort_idx].cmp(&b[sort_idx]));
    }

    if spec.limit > 0 && spec.limit < rows.len() {
        rows = match spec.extreme {
            Extreme::Largest => rows.split_off(rows.len() - spec.limit),
            Extreme::Smallest => {
                rows.truncate(spec.limit);
                rows
            }
        };
    }
    if spec.descending {
        rows.reverse();
    }

    Warned::new(table.with_rows(rows), warnings)
}

/// Pivot a long table into a wide one: one row per `row_key` value, one
/// column per distinct `column_key` value, cells summing `value_field`.
///
/// Missing cells are zero. A table already pivoted by the same keys is
/// returned unchanged.
pub fn pivot(table: &Table, row_key: &str, column_key: &str, value_field: &str) -> Result<Table> {
    if is_pivoted_by(table, row_key, column_key, value_field) {
        tracing::debug!("Table already pivoted by {}", row_key);
        return Ok(table.clone());
    }
    let col_idx = table.require_column(column_key)?;
    let mut labels: IndexMap<Value, ()> = IndexMap::new();
    for row in table.rows() {
        labels.entry(row[col_idx].clone()).or_insert(());
    }
    let labels: Vec<Value> = labels.into_keys().collect();
    pivot_with_columns(table, row_key, column_key, value_field, &labels)
}

/// [`pivot`] with an explicit, ordered set of output columns.
///
/// Every label gets a column even when no row carries it; rows whose
/// `column_key` is not listed are ignored.
pub fn pivot_with_columns(
    table: &Table,
    row_key: &str,
    column_key: &str,
    value_field: &str,
    labels: &[Value],
) -> Result<Table> {
    if is_pivoted_by(table, row_key, column_key, value_field) {
        return Ok(table.clone());
    }
    let row_idx = table.require_column(row_key)?;
    let col_idx = table.require_column(column_key)?;
    let val_idx = table.require_column(value_field)?;

    let mut slots: IndexMap<&Value, usize> = IndexMap::new();
    for label in labels {
        let next = slots.len();
        slots.entry(label).or_insert(next);
    }
    let mut cells: IndexMap<Value, Vec<i64>> = IndexMap::new();
    for row in table.rows() {
        let Some(&slot) = slots.get(&row[col_idx]) else {
            continue;
        };
        let sums = cells
            .entry(row[row_idx].clone())
            .or_insert_with(|| vec![0; slots.len()]);
        sums[slot] += row[val_idx].as_int().unwrap_or(0);
    }
    cells.sort_keys();

    let mut columns = vec![table.columns()[row_idx].clone()];
    columns.extend(slots.keys().map(|label| Column::new(label.to_string(), ColumnType::Int)));

    let mut out = Table::new(columns).with_pivot(PivotKeys {
        row_key: row_key.to_string(),
        column_key: column_key.to_string(),
        value_field: value_field.to_string(),
    });
    for (key, sums) in cells {
        let mut row = vec![key];
        row.extend(sums.into_iter().map(Value::Int));
        out.push_row(row)?;
    }
    Ok(out)
}

/// Whether `table` is already the wide form for these keys, either by its
/// pivot marker or by shape: the row key survives, the column and value
/// fields are gone, and every other column is an integer.
fn is_pivoted_by(table: &Table, row_key: &str, column_key: &str, value_field: &str) -> bool {
    if let Some(keys) = table.pivoted_by() {
        if keys.row_key == row_key && keys.column_key == column_key && keys.value_field == value_field {
            return true;
        }
    }
    table.column_index(row_key).is_some()
        && table.column_index(column_key).is_none()
        && table.column_index(value_field).is_none()
        && table
            .columns()
            .iter()
            .filter(|c| c.name != row_key)
            .all(|c| c.kind == ColumnType::Int)
}

/// One-row overview of a file-change table.
pub fn summary(table: &Table, actor_key: &str) -> Result<Table> {
    let time_idx = table.require_column("authored_at")?;
    let mut times: Vec<&Value> = table
        .rows()
        .iter()
        .map(|r| &r[time_idx])
        .filter(|v| !v.is_null())
        .collect();
    times.sort();

    let mut out = Table::new(vec![
        Column::new("files", ColumnType::Int),
        Column::new("contributors", ColumnType::Int),
        Column::new("commits", ColumnType::Int),
        Column::new("first_commit", ColumnType::Time),
        Column::new("last_commit", ColumnType::Time),
    ]);
    out.push_row(vec![
        Value::from(table.distinct_count("path")?),
        Value::from(table.distinct_count(actor_key)?),
        Value::from(table.distinct_count("sha")?),
        times.first().map(|v| (*v).clone()).unwrap_or(Value::Null),
        times.last().map(|v| (*v).clone()).unwrap_or(Value::Null),
    ])?;
    Ok(out)
}
