//! CSV snapshots of processed candle tables.
//!
//! Layout: a header row `open_time,<column>...` in table order, one line per
//! row, missing cells written as empty fields.

use crate::domain::errors::PersistenceError;
use crate::domain::market::candle_table::CandleTable;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const INDEX_HEADER: &str = "open_time";

#[derive(Debug, Clone)]
pub struct ProcessedDataStore {
    dir: PathBuf,
}

impl ProcessedDataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolves `filename` inside the store directory.
    ///
    /// Only the final path component is kept, so `../../x.csv` lands at
    /// `<dir>/x.csv`.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, PersistenceError> {
        Path::new(filename)
            .file_name()
            .map(|base| self.dir.join(base))
            .ok_or_else(|| PersistenceError::InvalidFilename {
                filename: filename.to_string(),
            })
    }

    /// Writes `table` and returns the full path written.
    pub fn save(&self, table: &CandleTable, filename: &str) -> Result<PathBuf, PersistenceError> {
        let path = self.resolve(filename)?;

        fs::create_dir_all(&self.dir).map_err(|source| PersistenceError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let csv_err = |source| PersistenceError::Csv {
            path: path.clone(),
            source,
        };

        let mut wtr = csv::Writer::from_path(&path).map_err(csv_err)?;

        let names: Vec<&str> = table.column_names().collect();
        let mut header = Vec::with_capacity(names.len() + 1);
        header.push(INDEX_HEADER);
        header.extend(names.iter().copied());
        wtr.write_record(&header).map_err(csv_err)?;

        let columns: Vec<&[Option<f64>]> = names
            .iter()
            .filter_map(|name| table.column(name))
            .collect();

        for (row, open_time) in table.index().iter().enumerate() {
            let mut record = Vec::with_capacity(columns.len() + 1);
            record.push(open_time.to_string());
            for column in &columns {
                record.push(column[row].map(|v| v.to_string()).unwrap_or_default());
            }
            wtr.write_record(&record).map_err(csv_err)?;
        }

        wtr.flush().map_err(|source| PersistenceError::Io {
            path: path.clone(),
            source,
        })?;

        info!("Processed data saved to {}", path.display());
        Ok(path)
    }

    /// Reads a table previously written by [`save`](Self::save).
    pub fn load(&self, filename: &str) -> Result<CandleTable, PersistenceError> {
        let path = self.resolve(filename)?;
        let csv_err = |source| PersistenceError::Csv {
            path: path.clone(),
            source,
        };
        let malformed = |reason: String| PersistenceError::Malformed {
            path: path.clone(),
            reason,
        };

        let mut rdr = csv::Reader::from_path(&path).map_err(csv_err)?;
        let headers = rdr.headers().map_err(csv_err)?.clone();

        match headers.get(0) {
            Some(INDEX_HEADER) => {}
            other => {
                return Err(malformed(format!(
                    "first column must be {INDEX_HEADER}, found {other:?}"
                )));
            }
        }
        let names: Vec<&str> = headers.iter().skip(1).collect();

        let mut index = Vec::new();
        let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); names.len()];

        for (line, record) in rdr.records().enumerate() {
            let record = record.map_err(csv_err)?;
            let open_time = record
                .get(0)
                .and_then(|v| v.parse::<i64>().ok())
                .ok_or_else(|| malformed(format!("row {line}: invalid {INDEX_HEADER}")))?;
            index.push(open_time);

            for (i, values) in columns.iter_mut().enumerate() {
                let cell = record.get(i + 1).unwrap_or("");
                let value = if cell.is_empty() {
                    None
                } else {
                    Some(cell.parse::<f64>().map_err(|_| {
                        malformed(format!("row {line}: invalid value {cell:?} in {}", names[i]))
                    })?)
                };
                values.push(value);
            }
        }

        let mut table = CandleTable::new(index);
        for (name, values) in names.into_iter().zip(columns) {
            table
                .set_column(name, values)
                .map_err(|e| malformed(format!("{e:?}")))?;
        }

        debug!("Loaded {} rows from {}", table.len(), path.display());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_table() -> CandleTable {
        let mut table = CandleTable::new(vec![1_700_000_000_000, 1_700_003_600_000]);
        table.set_column("close", vec![Some(101.5), Some(99.25)]).unwrap();
        table
            .set_column("garch_volatility", vec![None, Some(0.0123)])
            .unwrap();
        table
    }

    #[test]
    fn test_save_writes_header_and_empty_missing_cells() {
        let dir = tempdir().unwrap();
        let store = ProcessedDataStore::new(dir.path());

        let path = store.save(&sample_table(), "btc.csv").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "open_time,close,garch_volatility");
        assert_eq!(lines[1], "1700000000000,101.5,");
        assert_eq!(lines[2], "1700003600000,99.25,0.0123");
    }

    #[test]
    fn test_save_then_load_restores_table() {
        let dir = tempdir().unwrap();
        let store = ProcessedDataStore::new(dir.path().join("nested"));

        store.save(&sample_table(), "eth.csv").unwrap();
        assert_eq!(store.load("eth.csv").unwrap(), sample_table());
    }

    #[test]
    fn test_traversal_is_reduced_to_base_name() {
        let dir = tempdir().unwrap();
        let store = ProcessedDataStore::new(dir.path());

        let path = store.save(&sample_table(), "../../etc/passwd").unwrap();
        assert_eq!(path, dir.path().join("passwd"));
        assert!(path.exists());
    }

    #[test]
    fn test_names_without_base_are_rejected() {
        let store = ProcessedDataStore::new("unused");
        for name in ["", "..", "/"] {
            assert!(matches!(
                store.resolve(name),
                Err(PersistenceError::InvalidFilename { .. })
            ));
        }
    }

    #[test]
    fn test_load_rejects_foreign_header() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.csv"), "time,close\n1,2\n").unwrap();

        let err = ProcessedDataStore::new(dir.path()).load("bad.csv").unwrap_err();
        assert!(matches!(err, PersistenceError::Malformed { .. }));
    }
}
