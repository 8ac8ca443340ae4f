use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info, warn};

use crate::county::normalize_county_name;
use crate::model::{CountyReferenceRecord, MatchKey, RatingAreaMapping, RatingAreaRule, UnmatchedRecord};
use crate::overrides::{is_territory, OverrideTable, TERRITORY_AREA};

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// States dropped before matching, e.g. territories for some extracts.
    pub exclude_states: BTreeSet<String>,
    /// `CLASSFP` codes dropped before matching, e.g. "H4".
    pub exclude_classes: BTreeSet<String>,
    pub overrides: OverrideTable,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        ResolverOptions {
            exclude_states: BTreeSet::new(),
            exclude_classes: BTreeSet::new(),
            overrides: OverrideTable::los_angeles(),
        }
    }
}

/// Which rule assigned a record its rating area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Territory,
    Override,
    Zip3,
    County,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub total: usize,
    pub excluded: usize,
    /// Records skipped because their ZIP is not five digits.
    pub malformed: usize,
    pub territory: usize,
    pub overridden: usize,
    pub by_zip3: usize,
    pub by_county: usize,
    pub unmatched: usize,
}

impl MatchStats {
    pub fn matched(&self) -> usize {
        self.territory + self.overridden + self.by_zip3 + self.by_county
    }

    /// Percentage of resolved records, 0 when there were none.
    pub fn match_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.matched() as f64 * 100.0 / self.total as f64
        }
    }

    fn record(&mut self, source: Option<MatchSource>) {
        self.total += 1;
        match source {
            Some(MatchSource::Territory) => self.territory += 1,
            Some(MatchSource::Override) => self.overridden += 1,
            Some(MatchSource::Zip3) => self.by_zip3 += 1,
            Some(MatchSource::County) => self.by_county += 1,
            None => self.unmatched += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// One row per kept reference record, in input order.
    pub mappings: Vec<RatingAreaMapping>,
    /// Sorted by (state, county_original, zip_code).
    pub unmatched: Vec<UnmatchedRecord>,
    pub stats: MatchStats,
}

impl Resolution {
    /// Unmatched record counts per state, largest first.
    pub fn unmatched_by_state(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &self.unmatched {
            *counts.entry(&record.state).or_default() += 1;
        }
        let mut counts: Vec<_> = counts.into_iter().map(|(s, n)| (s.to_string(), n)).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }
}

/// Rules split by key kind, keyed by (state, key).
#[derive(Debug, Default)]
struct RuleIndex {
    zip3: HashMap<(String, String), String>,
    county: HashMap<(String, String), String>,
    counties_by_state: BTreeMap<String, BTreeSet<String>>,
}

impl RuleIndex {
    fn build(rules: &[RatingAreaRule]) -> Self {
        let mut index = RuleIndex::default();
        for rule in rules {
            let (table, key) = match &rule.match_key {
                MatchKey::Zip3(zip3) => (&mut index.zip3, zip3),
                MatchKey::County(county) => {
                    index
                        .counties_by_state
                        .entry(rule.state.clone())
                        .or_default()
                        .insert(county.clone());
                    (&mut index.county, county)
                }
            };
            let slot = (rule.state.clone(), key.clone());
            match table.get(&slot) {
                Some(existing) if *existing != rule.rating_area => warn!(
                    "Conflicting rules for {} {}: area {} and {}, keeping {}",
                    rule.state, key, existing, rule.rating_area, existing
                ),
                Some(_) => {}
                None => {
                    table.insert(slot, rule.rating_area.clone());
                }
            }
        }
        debug!(
            "Rule index: {} ZIP3 rules, {} county rules",
            index.zip3.len(),
            index.county.len()
        );
        index
    }

    fn available_counties(&self, state: &str) -> String {
        self.counties_by_state
            .get(state)
            .map(|names| names.iter().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default()
    }
}

/// Assigns a rating area to every county reference record.
///
/// Priority: territory default, then geographic overrides, then ZIP3 rules,
/// then county rules. Records nothing matches keep a `None` area and are
/// listed in the unmatched report.
pub fn resolve(
    county_refs: &[CountyReferenceRecord],
    rules: &[RatingAreaRule],
    options: &ResolverOptions,
) -> Resolution {
    let index = RuleIndex::build(rules);
    let mut resolution = Resolution::default();

    for record in county_refs {
        if options.exclude_states.contains(&record.state)
            || options.exclude_classes.contains(&record.class_code)
        {
            resolution.stats.excluded += 1;
            continue;
        }

        let Some(zip3) = record.zip3() else {
            warn!(
                "Skipping malformed reference row: ZIP {:?} ({}, {})",
                record.zip, record.county_name, record.state
            );
            resolution.stats.malformed += 1;
            continue;
        };
        let county = normalize_county_name(&record.county_name, &record.state);
        let assigned = if is_territory(&record.state) {
            Some((TERRITORY_AREA, MatchSource::Territory))
        } else if let Some(area) = options.overrides.lookup(&record.state, zip3) {
            Some((area, MatchSource::Override))
        } else if let Some(area) = index.zip3.get(&(record.state.clone(), zip3.to_string())) {
            Some((area.as_str(), MatchSource::Zip3))
        } else {
            index
                .county
                .get(&(record.state.clone(), county.clone()))
                .map(|area| (area.as_str(), MatchSource::County))
        };

        resolution.stats.record(assigned.map(|(_, source)| source));
        let mapping = RatingAreaMapping {
            zip_code: record.zip.clone(),
            county_standardized: county,
            county_original: record.county_name.clone(),
            state: record.state.clone(),
            stcountyfp: record.county_fips.clone(),
            classfp: record.class_code.clone(),
            zip3: zip3.to_string(),
            rating_area: assigned.map(|(area, _)| area.to_string()),
        };
        if mapping.rating_area.is_none() {
            resolution.unmatched.push(UnmatchedRecord {
                state: mapping.state.clone(),
                county_original: mapping.county_original.clone(),
                county_standardized: mapping.county_standardized.clone(),
                zip_code: mapping.zip_code.clone(),
                stcountyfp: mapping.stcountyfp.clone(),
                classfp: mapping.classfp.clone(),
                available_counties: index.available_counties(&mapping.state),
            });
        }
        resolution.mappings.push(mapping);
    }

    resolution.unmatched.sort_by(|a, b| {
        (&a.state, &a.county_original, &a.zip_code).cmp(&(&b.state, &b.county_original, &b.zip_code))
    });

    let stats = &resolution.stats;
    info!(
        "Resolved {}/{} records ({:.2}%), {} excluded, {} malformed",
        stats.matched(),
        stats.total,
        stats.match_rate(),
        stats.excluded,
        stats.malformed
    );
    resolution
}
