use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::county::normalize_county_name;

/// One row of the ZIP → county crosswalk (HUD `ZIP-COUNTY-FIPS`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountyReferenceRecord {
    /// Five digits when read from the crosswalk.
    pub zip: String,
    pub county_name: String,
    pub state: String,
    pub county_fips: String,
    pub class_code: String,
}

impl CountyReferenceRecord {
    /// First three ZIP digits, `None` unless `zip` is five ASCII digits.
    pub fn zip3(&self) -> Option<&str> {
        if self.zip.len() == 5 && self.zip.bytes().all(|b| b.is_ascii_digit()) {
            Some(&self.zip[..3])
        } else {
            None
        }
    }
}

/// How a rating-area rule identifies the places it covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchKey {
    /// First three ZIP digits, zero-padded.
    Zip3(String),
    /// Normalized county name.
    County(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRule {
    #[error("empty county/ZIP3 key")]
    EmptyKey,
    #[error("empty rating area")]
    EmptyArea,
    /// Numeric keys longer than a ZIP3.
    #[error("numeric key {0:?} is not a ZIP3")]
    NumericKey(String),
}

impl MatchKey {
    /// County keys are normalized with `state`'s misspelling fixes.
    pub fn parse(state: &str, raw: &str) -> Result<MatchKey, MalformedRule> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(MalformedRule::EmptyKey);
        }
        if key.chars().all(|c| c.is_ascii_digit()) {
            if key.len() > 3 {
                return Err(MalformedRule::NumericKey(key.to_string()));
            }
            return Ok(MatchKey::Zip3(format!("{:0>3}", key)));
        }
        Ok(MatchKey::County(normalize_county_name(key, state)))
    }
}

/// Rating areas are usually small integers ("4") but some states use
/// alphanumeric ids ("3N"). Spreadsheet exports sometimes turn "4" into "4.0".
pub fn normalize_area(raw: &str) -> Option<String> {
    let area = raw.trim();
    let area = match area.strip_suffix(".0") {
        Some(whole) if !whole.is_empty() && whole.chars().all(|c| c.is_ascii_digit()) => whole,
        _ => area,
    };
    if area.is_empty() {
        None
    } else {
        Some(area.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingAreaRule {
    pub state: String,
    pub match_key: MatchKey,
    pub rating_area: String,
}

impl RatingAreaRule {
    pub fn parse(state: &str, rating_area: &str, key: &str) -> Result<Self, MalformedRule> {
        let match_key = MatchKey::parse(state, key)?;
        let rating_area = normalize_area(rating_area).ok_or(MalformedRule::EmptyArea)?;
        Ok(RatingAreaRule {
            state: state.trim().to_ascii_uppercase(),
            match_key,
            rating_area,
        })
    }
}

/// (state, rating area) pair identifying one premium.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AreaKey {
    pub state: String,
    pub rating_area: String,
}

impl AreaKey {
    pub fn new(state: &str, rating_area: &str) -> Self {
        AreaKey {
            state: state.to_string(),
            rating_area: rating_area.to_string(),
        }
    }
}

impl fmt::Display for AreaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.state, self.rating_area)
    }
}

/// Resolver output, one per county reference record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingAreaMapping {
    pub zip_code: String,
    pub county_standardized: String,
    pub county_original: String,
    pub state: String,
    pub stcountyfp: String,
    pub classfp: String,
    pub zip3: String,
    #[serde(default)]
    pub rating_area: Option<String>,
}

impl RatingAreaMapping {
    pub fn area_key(&self) -> Option<AreaKey> {
        self.rating_area
            .as_deref()
            .map(|area| AreaKey::new(&self.state, area))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedRecord {
    pub state: String,
    pub county_original: String,
    pub county_standardized: String,
    pub zip_code: String,
    pub stcountyfp: String,
    pub classfp: String,
    /// County names the rule table knows for this state, sorted, ", "-joined.
    pub available_counties: String,
}

/// A mapping row with the premium of its rating area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostedMapping {
    pub zip_code: String,
    pub county_standardized: String,
    pub county_original: String,
    pub state: String,
    pub stcountyfp: String,
    pub classfp: String,
    pub zip3: String,
    pub rating_area: Option<String>,
    pub slcsp: Option<f64>,
}

impl CostedMapping {
    pub fn new(mapping: &RatingAreaMapping, slcsp: Option<f64>) -> Self {
        CostedMapping {
            zip_code: mapping.zip_code.clone(),
            county_standardized: mapping.county_standardized.clone(),
            county_original: mapping.county_original.clone(),
            state: mapping.state.clone(),
            stcountyfp: mapping.stcountyfp.clone(),
            classfp: mapping.classfp.clone(),
            zip3: mapping.zip3.clone(),
            rating_area: mapping.rating_area.clone(),
            slcsp,
        }
    }

    pub fn area_key(&self) -> Option<AreaKey> {
        self.rating_area
            .as_deref()
            .map(|area| AreaKey::new(&self.state, area))
    }
}
