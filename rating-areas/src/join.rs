use std::collections::{BTreeMap, HashMap};

use log::warn;
use quote_scraper::{QuoteKey, QuoteResult};

use crate::model::{AreaKey, CostedMapping, RatingAreaMapping};

/// Costs within a cent of each other are the same premium.
const COST_TOLERANCE: f64 = 0.005;

#[derive(Debug, Clone, PartialEq)]
pub struct CostConflict {
    pub area: AreaKey,
    pub kept: f64,
    pub other: f64,
    /// ZIP whose quote disagreed with the kept cost.
    pub zip: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaCosts {
    pub costs: BTreeMap<AreaKey, f64>,
    pub conflicts: Vec<CostConflict>,
    /// Usable quotes whose (state, ZIP) has no rating area in the mapping.
    pub unmapped: Vec<QuoteKey>,
    /// `N/A`, `ERROR` and zero quotes.
    pub sentinels: usize,
}

/// (state, ZIP) → rating area, first mapping row with an area wins.
fn zip_areas(mappings: &[RatingAreaMapping]) -> HashMap<QuoteKey, &str> {
    let mut areas: HashMap<QuoteKey, &str> = HashMap::new();
    for m in mappings {
        let Some(area) = m.rating_area.as_deref() else {
            continue;
        };
        let key = QuoteKey {
            state: m.state.clone(),
            zip: m.zip_code.clone(),
        };
        match areas.get(&key) {
            Some(existing) if *existing != area => warn!(
                "{} {} spans rating areas {} and {}, using {}",
                key.state, key.zip, existing, area, existing
            ),
            Some(_) => {}
            None => {
                areas.insert(key, area);
            }
        }
    }
    areas
}

/// Maps each usable quote to its rating area, keeping the first cost seen
/// per area.
pub fn area_costs(quotes: &[QuoteResult], mappings: &[RatingAreaMapping]) -> AreaCosts {
    let areas = zip_areas(mappings);
    let mut result = AreaCosts::default();

    for quote in quotes {
        let Some(cost) = quote.cost.amount().filter(|_| quote.cost.is_usable()) else {
            result.sentinels += 1;
            continue;
        };
        let key = quote.key();
        let Some(area) = areas.get(&key) else {
            result.unmapped.push(key);
            continue;
        };
        let area = AreaKey::new(&quote.state, area);
        match result.costs.get(&area) {
            Some(&kept) if (kept - cost).abs() > COST_TOLERANCE => {
                warn!("Rating area {} quoted {} and {} ({}), keeping {}", area, kept, cost, quote.zip, kept);
                result.conflicts.push(CostConflict {
                    area,
                    kept,
                    other: cost,
                    zip: quote.zip.clone(),
                });
            }
            Some(_) => {}
            None => {
                result.costs.insert(area, cost);
            }
        }
    }
    result
}

/// One costed row per mapping row; rows whose area has no cost get `None`.
pub fn broadcast(mappings: &[RatingAreaMapping], costs: &BTreeMap<AreaKey, f64>) -> Vec<CostedMapping> {
    mappings
        .iter()
        .map(|m| {
            let slcsp = m.area_key().and_then(|key| costs.get(&key).copied());
            CostedMapping::new(m, slcsp)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateCostStats {
    pub state: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation, 0 for a single value.
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostMismatch {
    pub zip: String,
    pub slcsp: Option<f64>,
    pub quoted: f64,
}

/// Sanity checks over a costed mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsistencyReport {
    /// Areas whose rows carry more than one distinct cost.
    pub inconsistent_areas: Vec<AreaKey>,
    /// Quoted ZIPs whose costed rows do not carry the quoted cost.
    pub mismatches: Vec<CostMismatch>,
    /// Rows without a cost.
    pub missing: usize,
    pub state_stats: Vec<StateCostStats>,
    /// Rows more than three standard deviations from their state mean.
    pub outliers: Vec<CostedMapping>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.inconsistent_areas.is_empty() && self.mismatches.is_empty() && self.outliers.is_empty()
    }
}

pub fn check_consistency(costed: &[CostedMapping], quotes: &[QuoteResult]) -> ConsistencyReport {
    let mut report = ConsistencyReport::default();

    let mut per_area: BTreeMap<AreaKey, Vec<f64>> = BTreeMap::new();
    let mut per_state: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in costed {
        let Some(cost) = row.slcsp else {
            report.missing += 1;
            continue;
        };
        if let Some(area) = row.area_key() {
            per_area.entry(area).or_default().push(cost);
        }
        per_state.entry(row.state.as_str()).or_default().push(cost);
    }

    for (area, costs) in &per_area {
        if costs.iter().any(|c| (c - costs[0]).abs() > COST_TOLERANCE) {
            report.inconsistent_areas.push(area.clone());
        }
    }

    let quoted: HashMap<QuoteKey, f64> = quotes
        .iter()
        .filter(|q| q.cost.is_usable())
        .filter_map(|q| q.cost.amount().map(|c| (q.key(), c)))
        .collect();
    for row in costed {
        let key = QuoteKey {
            state: row.state.clone(),
            zip: row.zip_code.clone(),
        };
        if let Some(&quoted) = quoted.get(&key) {
            let matches = row.slcsp.map_or(false, |c| (c - quoted).abs() <= COST_TOLERANCE);
            if !matches {
                report.mismatches.push(CostMismatch {
                    zip: row.zip_code.clone(),
                    slcsp: row.slcsp,
                    quoted,
                });
            }
        }
    }

    for (state, costs) in &per_state {
        let count = costs.len();
        let mean = costs.iter().sum::<f64>() / count as f64;
        let std_dev = if count > 1 {
            (costs.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        report.state_stats.push(StateCostStats {
            state: state.to_string(),
            count,
            min: costs.iter().copied().fold(f64::INFINITY, f64::min),
            max: costs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean,
            std_dev,
        });
    }

    let stats: HashMap<&str, &StateCostStats> = report
        .state_stats
        .iter()
        .map(|s| (s.state.as_str(), s))
        .collect();
    let outliers: Vec<CostedMapping> = costed
        .iter()
        .filter(|row| {
            let (Some(cost), Some(stats)) = (row.slcsp, stats.get(row.state.as_str())) else {
                return false;
            };
            stats.std_dev > 0.0 && (cost - stats.mean).abs() > 3.0 * stats.std_dev
        })
        .cloned()
        .collect();
    report.outliers = outliers;
    report
}
