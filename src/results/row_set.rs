use std::collections::HashMap;
use std::sync::Arc;

use super::row::{Row, index_columns};
use crate::types::RowValues;

/// The ordered rows returned by one statement.
///
/// Column names are known even when no rows came back, as long as the backend reported them.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    rows: Vec<Row>,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
}

impl RowSet {
    /// Create an empty result with preallocated room for `capacity` rows.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> RowSet {
        RowSet {
            rows: Vec::with_capacity(capacity),
            ..RowSet::default()
        }
    }

    /// Create an empty result with the given columns.
    #[must_use]
    pub fn with_columns(column_names: Vec<String>, capacity: usize) -> RowSet {
        let mut row_set = RowSet::with_capacity(capacity);
        row_set.set_column_names(column_names);
        row_set
    }

    /// Set the column names shared by all rows added afterwards.
    pub fn set_column_names(&mut self, column_names: Vec<String>) {
        self.column_index = Arc::new(index_columns(&column_names));
        self.column_names = Arc::new(column_names);
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Append a row; values are positional against the current column names.
    pub fn add_row_values(&mut self, values: Vec<RowValues>) {
        self.rows.push(Row::with_index(
            Arc::clone(&self.column_names),
            values,
            Arc::clone(&self.column_index),
        ));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first row, or `None` for an empty result.
    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Consume the result and keep only its first row.
    #[must_use]
    pub fn into_first(self) -> Option<Row> {
        self.rows.into_iter().next()
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl IntoIterator for RowSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a RowSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_of_empty_is_absent() {
        let rs = RowSet::with_columns(vec!["name".into()], 0);
        assert!(rs.is_empty());
        assert!(rs.first().is_none());
        assert_eq!(rs.column_names(), ["name".to_string()]);
        assert!(rs.into_first().is_none());
    }

    #[test]
    fn rows_keep_insertion_order() {
        let mut rs = RowSet::with_columns(vec!["n".into()], 2);
        rs.add_row_values(vec![RowValues::Int(1)]);
        rs.add_row_values(vec![RowValues::Int(2)]);
        let seen: Vec<i64> = rs
            .iter()
            .filter_map(|row| row.get("n").and_then(RowValues::as_int).copied())
            .collect();
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(
            rs.into_first().and_then(|row| row.get("n").cloned()),
            Some(RowValues::Int(1))
        );
    }
}
