//! The parameter file keeps one premium per state, rating area and
//! effective date:
//!
//! ```yaml
//! AK:
//!   1:
//!     2025-01-01: 750.10
//! ME:
//!   3N:
//!     2025-01-01: 510.50
//! ```
//!
//! Numeric rating areas are integer keys, alphanumeric ones string keys.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use log::warn;
use serde_yaml::{Mapping, Number, Value};

use crate::io::InputError;
use crate::model::AreaKey;

#[derive(Debug, Clone, PartialEq)]
pub struct ParamFile {
    /// Everything before the first state key (comments, description,
    /// metadata), written back verbatim.
    header: String,
    data: Mapping,
}

/// True for an unindented `XX:` line that starts the per-state data.
fn is_state_line(line: &str) -> bool {
    if line.starts_with(char::is_whitespace) {
        return false;
    }
    match line.split_once(':') {
        Some((key, _)) => !key.is_empty() && key.chars().all(|c| c.is_ascii_uppercase()),
        None => false,
    }
}

impl ParamFile {
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        let mut header = String::new();
        let mut rest = text;
        while !rest.is_empty() {
            let end = rest.find('\n').map_or(rest.len(), |i| i + 1);
            let line = &rest[..end];
            if is_state_line(line) {
                break;
            }
            header.push_str(line);
            rest = &rest[end..];
        }

        let data = if rest.trim().is_empty() {
            Mapping::new()
        } else {
            serde_yaml::from_str(rest)?
        };
        Ok(ParamFile { header, data })
    }

    pub fn read(path: &Path) -> Result<Self, InputError> {
        if !path.exists() {
            return Err(InputError::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|source| InputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| InputError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn render(&self) -> Result<String, serde_yaml::Error> {
        let mut out = self.header.clone();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        if !self.data.is_empty() {
            out.push_str(&serde_yaml::to_string(&self.data)?);
        }
        Ok(out)
    }

    pub fn data(&self) -> &Mapping {
        &self.data
    }

    pub fn merge_costs(&mut self, costs: &BTreeMap<AreaKey, f64>, effective_date: NaiveDate) -> MergeReport {
        merge_costs(&mut self.data, costs, effective_date)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub updated: Vec<AreaKey>,
    pub missing_states: BTreeSet<String>,
    pub missing_areas: Vec<AreaKey>,
}

/// YAML key for a rating area: integers stay integers.
fn area_keys(area: &str) -> [Value; 2] {
    match area.parse::<u64>() {
        Ok(n) => [Value::Number(Number::from(n)), Value::String(area.to_string())],
        Err(_) => [Value::String(area.to_string()), Value::String(area.to_string())],
    }
}

fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn sort_keys(map: &mut Mapping) {
    let mut entries: Vec<(Value, Value)> = std::mem::take(map).into_iter().collect();
    entries.sort_by_key(|(key, _)| key_text(key));
    *map = entries.into_iter().collect();
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Adds `effective_date: cost` under each existing state → area entry.
///
/// Existing dates are kept, except one equal to `effective_date`, which is
/// overwritten. States and areas absent from the document are reported and
/// never created.
pub fn merge_costs(document: &mut Mapping, costs: &BTreeMap<AreaKey, f64>, effective_date: NaiveDate) -> MergeReport {
    let date = Value::String(effective_date.format("%Y-%m-%d").to_string());
    let mut report = MergeReport::default();

    for (area, cost) in costs {
        let Some(state) = document
            .get_mut(Value::String(area.state.clone()))
            .and_then(Value::as_mapping_mut)
        else {
            if report.missing_states.insert(area.state.clone()) {
                warn!("State {} not in the parameter file, skipping", area.state);
            }
            continue;
        };

        let key = area_keys(&area.rating_area)
            .into_iter()
            .find(|key| state.contains_key(key));
        let entry = match key {
            Some(key) => state.get_mut(key).and_then(Value::as_mapping_mut),
            None => None,
        };
        let Some(dates) = entry else {
            warn!("Rating area {} not in the parameter file, skipping", area);
            report.missing_areas.push(area.clone());
            continue;
        };

        dates.insert(date.clone(), Value::Number(Number::from(round_cents(*cost))));
        sort_keys(dates);
        report.updated.push(area.clone());
    }
    report
}
