//! Timestamp-indexed columnar table of candle data.
//!
//! Every cell is an `Option<f64>`: `None` is the explicit missing marker.
//! Stages attach columns and the final filtering steps drop rows; columns
//! are never removed.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CandleTable {
    index: Vec<i64>,
    columns: Vec<Column>,
}

/// Returned when a column does not match the table length.
#[derive(Debug, Clone, PartialEq)]
pub struct LengthMismatch {
    pub expected: usize,
    pub found: usize,
}

impl CandleTable {
    /// Creates a table with the given open-time index (epoch ms) and no columns.
    pub fn new(index: Vec<i64>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Open times in epoch milliseconds, in input order.
    pub fn index(&self) -> &[i64] {
        &self.index
    }

    pub fn timestamp(&self, row: usize) -> Option<DateTime<Utc>> {
        self.index
            .get(row)
            .and_then(|ms| DateTime::from_timestamp_millis(*ms))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn value(&self, name: &str, row: usize) -> Option<f64> {
        self.column(name).and_then(|values| values.get(row).copied().flatten())
    }

    /// Returns the first name in `names` that is not a column of this table.
    pub fn first_missing<'a>(&self, names: &[&'a str]) -> Option<&'a str> {
        names.iter().copied().find(|name| !self.has_column(name))
    }

    /// Attaches a column, replacing an existing one with the same name in place.
    pub fn set_column(
        &mut self,
        name: &str,
        values: Vec<Option<f64>>,
    ) -> Result<(), LengthMismatch> {
        if values.len() != self.len() {
            return Err(LengthMismatch {
                expected: self.len(),
                found: values.len(),
            });
        }

        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column {
                name: name.to_string(),
                values,
            }),
        }
        Ok(())
    }

    /// Keeps the rows whose flag is `true`. Returns the number of dropped rows.
    ///
    /// # Panics
    /// Panics if `keep` does not have one flag per row.
    pub fn retain_rows(&mut self, keep: &[bool]) -> usize {
        assert_eq!(keep.len(), self.len(), "row mask length mismatch");

        let before = self.len();
        self.index = filter_by_mask(&self.index, keep);
        for column in &mut self.columns {
            column.values = filter_by_mask(&column.values, keep);
        }
        before - self.len()
    }

    /// Drops every row with a missing value in any of `names`.
    ///
    /// Unknown column names count as entirely missing. Returns the number of dropped rows.
    pub fn drop_missing(&mut self, names: &[&str]) -> usize {
        let keep: Vec<bool> = (0..self.len())
            .map(|row| names.iter().all(|name| self.value(name, row).is_some()))
            .collect();
        self.retain_rows(&keep)
    }

    /// Percentage of missing cells per column, rounded to two decimals.
    pub fn missing_percentages(&self) -> Vec<(String, f64)> {
        self.columns
            .iter()
            .map(|c| {
                let pct = if c.values.is_empty() {
                    0.0
                } else {
                    let missing = c.values.iter().filter(|v| v.is_none()).count();
                    (missing as f64 / c.values.len() as f64 * 10_000.0).round() / 100.0
                };
                (c.name.clone(), pct)
            })
            .collect()
    }
}

fn filter_by_mask<T: Copy>(values: &[T], keep: &[bool]) -> Vec<T> {
    values
        .iter()
        .zip(keep)
        .filter_map(|(v, k)| k.then_some(*v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CandleTable {
        let mut table = CandleTable::new(vec![1_000, 2_000, 3_000]);
        table
            .set_column("close", vec![Some(1.0), None, Some(3.0)])
            .unwrap();
        table
            .set_column("open", vec![Some(0.5), Some(1.5), Some(2.5)])
            .unwrap();
        table
    }

    #[test]
    fn test_set_column_rejects_wrong_length() {
        let mut table = sample();
        let err = table.set_column("high", vec![Some(1.0)]).unwrap_err();
        assert_eq!(err, LengthMismatch { expected: 3, found: 1 });
        assert!(!table.has_column("high"));
    }

    #[test]
    fn test_set_column_replaces_in_place() {
        let mut table = sample();
        table
            .set_column("close", vec![Some(9.0), Some(9.0), Some(9.0)])
            .unwrap();
        let names: Vec<&str> = table.column_names().collect();
        assert_eq!(names, vec!["close", "open"]);
        assert_eq!(table.value("close", 1), Some(9.0));
    }

    #[test]
    fn test_drop_missing_filters_rows_not_columns() {
        let mut table = sample();
        let dropped = table.drop_missing(&["close"]);
        assert_eq!(dropped, 1);
        assert_eq!(table.index(), &[1_000, 3_000]);
        assert_eq!(table.column("open").unwrap(), &[Some(0.5), Some(2.5)]);
        assert_eq!(table.column_names().count(), 2);
    }

    #[test]
    fn test_drop_missing_unknown_column_drops_everything() {
        let mut table = sample();
        assert_eq!(table.drop_missing(&["garch_volatility"]), 3);
        assert!(table.is_empty());
    }

    #[test]
    fn test_missing_percentages() {
        let table = sample();
        let pct = table.missing_percentages();
        assert_eq!(pct[0], ("close".to_string(), 33.33));
        assert_eq!(pct[1], ("open".to_string(), 0.0));
    }

    #[test]
    fn test_timestamp_conversion() {
        let table = sample();
        assert_eq!(table.timestamp(0).unwrap().timestamp_millis(), 1_000);
        assert!(table.timestamp(5).is_none());
    }
}
