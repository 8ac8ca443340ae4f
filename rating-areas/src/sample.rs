use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::model::RatingAreaMapping;

pub const DEFAULT_SEED: u64 = 42;

/// The 50 states plus DC; territories have no marketplace quotes.
pub const STATES_AND_DC: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DC", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM",
    "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA",
    "WV", "WI", "WY",
];

/// One ZIP code standing in for a whole rating area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentativeZip {
    pub zip_code: String,
    pub state: String,
    pub rating_area: String,
}

/// Orders "2" before "10" and "3N" after "3".
fn area_order(area: &str) -> (u32, &str) {
    let digits: String = area.chars().take_while(char::is_ascii_digit).collect();
    (digits.parse().unwrap_or(u32::MAX), area)
}

/// Picks one ZIP per (state, rating area) among ZIPs that map to a single
/// county, using a seeded RNG so the same mapping always yields the same list.
pub fn representative_zips(mappings: &[RatingAreaMapping], seed: u64) -> Vec<RepresentativeZip> {
    let mut counties_per_zip: HashMap<&str, HashSet<&str>> = HashMap::new();
    for m in mappings {
        counties_per_zip
            .entry(m.zip_code.as_str())
            .or_default()
            .insert(m.county_standardized.as_str());
    }

    let mut groups: BTreeMap<(&str, (u32, &str)), BTreeSet<&str>> = BTreeMap::new();
    for m in mappings {
        let Some(area) = m.rating_area.as_deref() else {
            continue;
        };
        if !STATES_AND_DC.contains(&m.state.as_str()) {
            continue;
        }
        if counties_per_zip.get(m.zip_code.as_str()).map_or(0, HashSet::len) != 1 {
            continue;
        }
        groups
            .entry((m.state.as_str(), area_order(area)))
            .or_default()
            .insert(m.zip_code.as_str());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    groups
        .into_iter()
        .filter_map(|((state, (_, area)), zips)| {
            let zips: Vec<&str> = zips.into_iter().collect();
            zips.choose(&mut rng).map(|zip| RepresentativeZip {
                zip_code: zip.to_string(),
                state: state.to_string(),
                rating_area: area.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(zip: &str, county: &str, state: &str, area: Option<&str>) -> RatingAreaMapping {
        RatingAreaMapping {
            zip_code: zip.to_string(),
            county_standardized: county.to_string(),
            county_original: format!("{} County", county),
            state: state.to_string(),
            stcountyfp: String::new(),
            classfp: "H1".to_string(),
            zip3: zip[..3].to_string(),
            rating_area: area.map(str::to_string),
        }
    }

    fn sample_mappings() -> Vec<RatingAreaMapping> {
        vec![
            mapping("35004", "St. Clair", "AL", Some("9")),
            mapping("35005", "Jefferson", "AL", Some("1")),
            mapping("35006", "Jefferson", "AL", Some("1")),
            mapping("35007", "Shelby", "AL", Some("10")),
            mapping("35007", "Jefferson", "AL", Some("1")),
            mapping("04101", "Cumberland", "ME", Some("3N")),
            mapping("04210", "Androscoggin", "ME", Some("3")),
            mapping("00601", "Adjuntas Municipio", "PR", Some("1")),
            mapping("99501", "Anchorage", "AK", None),
        ]
    }

    #[test]
    fn test_one_zip_per_area() {
        let zips = representative_zips(&sample_mappings(), DEFAULT_SEED);
        let areas: Vec<_> = zips
            .iter()
            .map(|z| (z.state.as_str(), z.rating_area.as_str()))
            .collect();
        // AL 10 only had a multi-county ZIP, PR is a territory, AK has no area.
        assert_eq!(areas, vec![("AL", "1"), ("AL", "9"), ("ME", "3"), ("ME", "3N")]);
        assert!(["35005", "35006"].contains(&zips[0].zip_code.as_str()));
        assert_eq!(zips[1].zip_code, "35004");
    }

    #[test]
    fn test_multi_county_zips_excluded() {
        let zips = representative_zips(&sample_mappings(), DEFAULT_SEED);
        assert!(zips.iter().all(|z| z.zip_code != "35007"));
    }

    #[test]
    fn test_same_seed_same_choice() {
        let mut mappings = sample_mappings();
        for i in 0..50 {
            mappings.push(mapping(&format!("36{:03}", i), "Autauga", "AL", Some("3")));
        }
        let first = representative_zips(&mappings, DEFAULT_SEED);
        let second = representative_zips(&mappings, DEFAULT_SEED);
        assert_eq!(first, second);
    }

    #[test]
    fn test_area_order() {
        let mut areas = vec!["10", "3N", "2", "3", "1"];
        areas.sort_by_key(|a| area_order(*a));
        assert_eq!(areas, vec!["1", "2", "3", "3N", "10"]);
    }
}
