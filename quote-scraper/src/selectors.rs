use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Where each calculator control lives in the page markup.
///
/// The calculator has been rebuilt several times; keeping every selector here
/// means a markup change is fixed by editing a JSON file instead of the
/// extractor. Missing keys in a JSON file fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSet {
    pub form: String,
    pub state: String,
    pub zip: String,
    /// The county dropdown only becomes populated for ZIPs spanning counties.
    pub county: String,
    pub income: String,
    pub employer_coverage_no: String,
    pub household_size: String,
    /// Household control used by the NY/VT variant of the calculator.
    pub household_alternate: String,
    pub household_alternate_value: String,
    pub adult_count: String,
    pub child_count: String,
    pub adult_age: String,
    pub child_age: String,
    pub submit: String,
    pub results: String,
    /// Text of the `<dt>` whose `<dd>` holds the unsubsidized premium.
    pub cost_label: String,
}

impl Default for SelectorSet {
    fn default() -> Self {
        SelectorSet {
            form: "#subsidy-form".to_string(),
            state: "#state-dd".to_string(),
            zip: "input[name='zip']".to_string(),
            county: "select[name='locale']".to_string(),
            income: "input[name='income']".to_string(),
            employer_coverage_no: "#employer-coverage-0".to_string(),
            household_size: "#number-people".to_string(),
            household_alternate: "#number-people-alternate".to_string(),
            household_alternate_value: "individual".to_string(),
            adult_count: "#number-adults".to_string(),
            child_count: "#number-children".to_string(),
            adult_age: "select[name='adults[0][age]']".to_string(),
            child_age: "select[name='children[0][age]']".to_string(),
            submit: "input[type='submit'][value='Submit']".to_string(),
            results: ".results-list".to_string(),
            cost_label: "Without financial help, your silver plan would cost".to_string(),
        }
    }
}

impl SelectorSet {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read selector file: {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse selector JSON from {}", path.display()))
    }
}
