use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::warn;
use thiserror::Error;

use crate::model::{normalize_state, normalize_zip, QuoteRequest};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input file not found: {0}")]
    NotFound(PathBuf),
    #[error("{path} has no {column:?} column")]
    MissingColumn { path: PathBuf, column: String },
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>, InputError> {
    if !path.exists() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| InputError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

fn column(headers: &csv::StringRecord, path: &Path, name: &str) -> Result<usize, InputError> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| InputError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })
}

fn read_rows(path: &Path) -> Result<(csv::StringRecord, Vec<csv::StringRecord>), InputError> {
    let mut reader = open(path)?;
    let to_error = |source| InputError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let headers = reader.headers().map_err(to_error)?.clone();
    let rows = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_error)?;
    Ok((headers, rows))
}

/// ZIP → state from any table with `zip_code` and `state` columns, such as
/// the rating-area mapping. The first state seen for a ZIP wins.
pub fn load_state_lookup(path: &Path) -> Result<HashMap<String, String>, InputError> {
    let (headers, rows) = read_rows(path)?;
    let zip_col = column(&headers, path, "zip_code")?;
    let state_col = column(&headers, path, "state")?;

    let mut lookup = HashMap::new();
    for row in &rows {
        let zip = row.get(zip_col).and_then(|z| normalize_zip(z).ok());
        let state = row.get(state_col).and_then(|s| normalize_state(s).ok());
        if let (Some(zip), Some(state)) = (zip, state) {
            lookup.entry(zip).or_insert(state);
        }
    }
    Ok(lookup)
}

/// Reads the ZIP list to scrape. `zip_code` is required; a `state` column is
/// used when present, otherwise the state comes from `state_lookup`. Rows
/// that cannot be turned into a request are skipped with a warning.
pub fn load_requests(
    path: &Path,
    age: u32,
    state_lookup: &HashMap<String, String>,
) -> Result<Vec<QuoteRequest>, InputError> {
    let (headers, rows) = read_rows(path)?;
    let zip_col = column(&headers, path, "zip_code")?;
    let state_col = column(&headers, path, "state").ok();

    let mut requests = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let line = i + 2;
        let raw_zip = row.get(zip_col).unwrap_or("");
        let zip = match normalize_zip(raw_zip) {
            Ok(zip) => zip,
            Err(e) => {
                warn!("Skipping line {} of {}: {}", line, path.display(), e);
                continue;
            }
        };

        let state = state_col
            .and_then(|col| row.get(col))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| state_lookup.get(&zip).cloned());
        let Some(state) = state else {
            warn!("Could not find state for ZIP {}, skipping", zip);
            continue;
        };

        match QuoteRequest::new(&state, &zip, age) {
            Ok(request) => requests.push(request),
            Err(e) => warn!("Skipping line {} of {}: {}", line, path.display(), e),
        }
    }
    Ok(requests)
}
