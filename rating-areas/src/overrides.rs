use std::collections::HashMap;

use log::warn;

/// US territories priced as a single rating area.
pub const TERRITORIES: [&str; 5] = ["GU", "VI", "PR", "AS", "MP"];
pub const TERRITORY_AREA: &str = "1";

pub fn is_territory(state: &str) -> bool {
    TERRITORIES.contains(&state)
}

/// Los Angeles County is split across two rating areas along ZIP3 lines that
/// the county rules cannot express.
const LOS_ANGELES: &[(&str, &[&str])] = &[
    ("15", &["906", "907", "908", "910", "911", "912", "915", "917", "918", "935"]),
    ("16", &["900", "902", "903", "904", "905", "913", "914", "916", "923", "928", "932"]),
];

/// (state, ZIP3) → rating area assignments that win over every rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideTable {
    areas: HashMap<(String, String), String>,
}

impl OverrideTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn los_angeles() -> Self {
        let mut table = Self::empty();
        for (area, zip3s) in LOS_ANGELES {
            for zip3 in *zip3s {
                table.insert("CA", zip3, area);
            }
        }
        table
    }

    /// Adds an assignment. An existing assignment for the same place is
    /// kept and the new one dropped with a warning.
    pub fn insert(&mut self, state: &str, zip3: &str, rating_area: &str) {
        let key = (state.to_string(), zip3.to_string());
        match self.areas.get(&key) {
            Some(existing) if existing != rating_area => warn!(
                "Override {} {} → {} conflicts with {}, keeping {}",
                state, zip3, rating_area, existing, existing
            ),
            Some(_) => {}
            None => {
                self.areas.insert(key, rating_area.to_string());
            }
        }
    }

    pub fn lookup(&self, state: &str, zip3: &str) -> Option<&str> {
        self.areas
            .get(&(state.to_string(), zip3.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}
