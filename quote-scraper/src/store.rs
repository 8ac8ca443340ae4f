use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use log::warn;
use thiserror::Error;

use crate::model::{normalize_state, normalize_zip, QuoteKey, QuoteResult};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open results file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read or write results file {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Append-only CSV of quote results (`State,Zip,Age,Unsubsidized Cost,County`).
///
/// Every append opens, writes one record, flushes and closes the file, so an
/// interrupted run loses at most the request that was in flight.
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        ResultStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All persisted results. A missing file is an empty store; rows that do
    /// not parse are skipped with a warning.
    pub fn load(&self) -> Result<Vec<QuoteResult>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|source| self.csv_error(source))?;

        // Old files may have unpadded ZIPs or lower-case states
        let mut results = Vec::new();
        for (line, row) in reader.deserialize::<QuoteResult>().enumerate() {
            let parsed = row.map_err(|e| e.to_string()).and_then(|mut result| {
                result.zip = normalize_zip(&result.zip).map_err(|e| e.to_string())?;
                result.state = normalize_state(&result.state).map_err(|e| e.to_string())?;
                Ok(result)
            });
            match parsed {
                Ok(result) => results.push(result),
                Err(e) => warn!("Skipping row {} of {}: {}", line + 2, self.path.display(), e),
            }
        }
        Ok(results)
    }

    pub fn completed_keys(&self) -> Result<HashSet<QuoteKey>, StoreError> {
        Ok(self.load()?.iter().map(QuoteResult::key).collect())
    }

    pub fn append(&self, result: &QuoteResult) -> Result<(), StoreError> {
        // Only a new or empty file gets a header
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        // Open for append, write one record and flush
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(result).map_err(|source| self.csv_error(source))?;
        writer.flush().map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn csv_error(&self, source: csv::Error) -> StoreError {
        StoreError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cost, QuoteRequest};

    fn result(zip: &str, cost: Cost) -> QuoteResult {
        QuoteResult::new(&QuoteRequest::new("ma", zip, 30).unwrap(), None, cost)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results.csv"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results.csv"));
        store.append(&result("2134", Cost::Amount(612.0))).unwrap();
        store.append(&result("01001", Cost::Error)).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            text,
            "State,Zip,Age,Unsubsidized Cost,County\nMA,02134,30,612,\nMA,01001,30,ERROR,\n"
        );

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].cost, Cost::Amount(612.0));
        assert_eq!(loaded[1].cost, Cost::Error);
        assert_eq!(loaded[1].county, None);
    }

    #[test]
    fn test_load_tolerates_legacy_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        fs::write(
            &path,
            "State,Zip,Age,Unsubsidized Cost\nma,2134,30,\"1,020\"\nMA,oops,30,500\nMA,01001,30,N/A\n",
        )
        .unwrap();

        let store = ResultStore::new(&path);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].state, "MA");
        assert_eq!(loaded[0].zip, "02134");
        assert_eq!(loaded[0].cost, Cost::Amount(1020.0));
        assert_eq!(loaded[1].cost, Cost::NotFound);

        let keys = store.completed_keys().unwrap();
        assert!(keys.contains(&QuoteKey {
            state: "MA".into(),
            zip: "02134".into()
        }));
    }
}
