//! CSV readers and writers for the resolver inputs and outputs.
//!
//! Readers skip rows that do not parse with a warning; a missing file or a
//! missing required column is fatal.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::warn;
use quote_scraper::model::{normalize_state, normalize_zip};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{normalize_area, CountyReferenceRecord, MatchKey, RatingAreaMapping, RatingAreaRule};
use crate::overrides::OverrideTable;

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
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Deserialize)]
struct CountyReferenceRow {
    #[serde(rename = "ZIP")]
    zip: String,
    #[serde(rename = "COUNTYNAME")]
    county_name: String,
    #[serde(rename = "STATE")]
    state: String,
    #[serde(rename = "STCOUNTYFP")]
    county_fips: String,
    #[serde(rename = "CLASSFP", default)]
    class_code: String,
}

#[derive(Debug, Deserialize)]
struct RuleRow {
    #[serde(rename = "STATE")]
    state: String,
    #[serde(rename = "AREA")]
    area: String,
    #[serde(rename = "COUNTY_ZIP3")]
    key: String,
}

fn reader(path: &Path) -> Result<csv::Reader<File>, InputError> {
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

/// Deserializes every row of `path` into `T`, checking `required` columns up
/// front and skipping rows that fail to deserialize.
fn read_rows<T: DeserializeOwned>(path: &Path, required: &[&str]) -> Result<Vec<T>, InputError> {
    let mut reader = reader(path)?;
    let headers = reader
        .headers()
        .map_err(|source| InputError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(InputError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    for (i, row) in reader.deserialize::<T>().enumerate() {
        match row {
            Ok(row) => rows.push(row),
            Err(e) => warn!("Skipping row {} of {}: {}", i + 2, path.display(), e),
        }
    }
    Ok(rows)
}

pub fn read_county_reference(path: &Path) -> Result<Vec<CountyReferenceRecord>, InputError> {
    let rows: Vec<CountyReferenceRow> = read_rows(path, &["ZIP", "COUNTYNAME", "STATE", "STCOUNTYFP"])?;
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let parsed = normalize_zip(&row.zip).and_then(|zip| Ok((zip, normalize_state(&row.state)?)));
        match parsed {
            Ok((zip, state)) => records.push(CountyReferenceRecord {
                zip,
                county_name: row.county_name,
                state,
                county_fips: row.county_fips,
                class_code: row.class_code,
            }),
            Err(e) => warn!("Skipping county reference row for {}: {}", row.zip, e),
        }
    }
    Ok(records)
}

pub fn read_rules(path: &Path) -> Result<Vec<RatingAreaRule>, InputError> {
    let rows: Vec<RuleRow> = read_rows(path, &["STATE", "AREA", "COUNTY_ZIP3"])?;
    let mut rules = Vec::with_capacity(rows.len());
    for row in rows {
        match RatingAreaRule::parse(&row.state, &row.area, &row.key) {
            Ok(rule) => rules.push(rule),
            Err(e) => warn!("Skipping rule {} {} {:?}: {}", row.state, row.area, row.key, e),
        }
    }
    Ok(rules)
}

pub fn read_mapping(path: &Path) -> Result<Vec<RatingAreaMapping>, InputError> {
    let rows: Vec<RatingAreaMapping> = read_rows(path, &["zip_code", "state", "rating_area"])?;
    Ok(rows
        .into_iter()
        .filter_map(|mut row| match normalize_zip(&row.zip_code) {
            Ok(zip) => {
                row.zip_code = zip;
                row.rating_area = row.rating_area.and_then(|a| normalize_area(&a));
                Some(row)
            }
            Err(e) => {
                warn!("Skipping mapping row: {}", e);
                None
            }
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct OverrideRow {
    state: String,
    zip3: String,
    rating_area: String,
}

/// Reads a `state,zip3,rating_area` override table.
pub fn read_overrides(path: &Path) -> Result<OverrideTable, InputError> {
    let rows: Vec<OverrideRow> = read_rows(path, &["state", "zip3", "rating_area"])?;
    let mut table = OverrideTable::empty();
    for row in rows {
        match MatchKey::parse(&row.state, &row.zip3) {
            Ok(MatchKey::Zip3(zip3)) => {
                table.insert(&row.state.to_ascii_uppercase(), &zip3, &row.rating_area)
            }
            _ => warn!("Skipping override with ZIP3 {:?}", row.zip3),
        }
    }
    Ok(table)
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_county_reference_pads_zips_and_skips_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zip_county.csv");
        fs::write(
            &path,
            "ZIP,COUNTYNAME,STATE,STCOUNTYFP,CLASSFP\n\
             501,Suffolk County,NY,36103,H1\n\
             36003,Autauga County,AL,1001,H1\n\
             ABCDE,Nowhere County,AL,1999,H1\n",
        )
        .unwrap();

        let records = read_county_reference(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].zip, "00501");
        assert_eq!(records[0].zip3(), Some("005"));
        assert_eq!(records[1].county_fips, "1001");
    }

    #[test]
    fn test_rules_skip_malformed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("areas.csv");
        fs::write(
            &path,
            "STATE,AREA,COUNTY_ZIP3\nAK,1,995\nAK,2,99501\nAL,1,Jefferson County\nAL,,Shelby\n",
        )
        .unwrap();

        let rules = read_rules(&path).unwrap();
        let keys: Vec<_> = rules.iter().map(|r| r.match_key.clone()).collect();
        assert_eq!(
            keys,
            vec![MatchKey::Zip3("995".into()), MatchKey::County("Jefferson".into())]
        );
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("areas.csv");
        fs::write(&path, "STATE,AREA\nAK,1\n").unwrap();
        let err = read_rules(&path).unwrap_err();
        assert!(matches!(err, InputError::MissingColumn { ref column, .. } if column == "COUNTY_ZIP3"));
    }

    #[test]
    fn test_mapping_written_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.csv");
        let rows = vec![
            RatingAreaMapping {
                zip_code: "00501".into(),
                county_standardized: "Suffolk".into(),
                county_original: "Suffolk County".into(),
                state: "NY".into(),
                stcountyfp: "36103".into(),
                classfp: "H1".into(),
                zip3: "005".into(),
                rating_area: Some("4".into()),
            },
            RatingAreaMapping {
                zip_code: "99999".into(),
                county_standardized: "Nowhere".into(),
                county_original: "Nowhere County".into(),
                state: "AK".into(),
                stcountyfp: "2999".into(),
                classfp: "H1".into(),
                zip3: "999".into(),
                rating_area: None,
            },
        ];
        write_csv(&path, &rows).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(
            "zip_code,county_standardized,county_original,state,stcountyfp,classfp,zip3,rating_area\n"
        ));
        assert_eq!(read_mapping(&path).unwrap(), rows);
    }

    #[test]
    fn test_override_table_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.csv");
        fs::write(&path, "state,zip3,rating_area\nca,900,16\nCA,90001,15\n").unwrap();
        let table = read_overrides(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("CA", "900"), Some("16"));
    }
}
