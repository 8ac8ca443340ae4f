use std::sync::OnceLock;

use regex::Regex;

/// Misspellings found in the county reference or rule files, keyed by the
/// state they belong to. Matched on word boundaries, only within that state:
/// "Vermillion" is a real Indiana county and "DeKalb" is correct outside GA.
const MISSPELLINGS: &[(&str, &str, &str)] = &[
    ("IN", "Kosclusko", "Kosciusko"),
    ("IN", "Deleware", "Delaware"),
    ("IN", "Davless", "Daviess"),
    ("IN", "Dubols", "Dubois"),
    ("IN", "Marlon", "Marion"),
    ("IL", "Dupage", "DuPage"),
    ("IL", "De Witt", "DeWitt"),
    ("CA", "San Bernadino", "San Bernardino"),
    ("KS", "Chautaugua", "Chautauqua"),
    ("ND", "Trailll", "Traill"),
    ("ND", "Trail", "Traill"),
    ("LA", "Vermillion", "Vermilion"),
    ("TX", "Culbertson", "Culberson"),
    ("TX", "Ochittree", "Ochiltree"),
    ("TX", "Wheiler", "Wheeler"),
    ("WI", "LaFayette", "Lafayette"),
    ("GA", "Heralson", "Haralson"),
    ("GA", "DeKalb", "De Kalb"),
    ("FL", "Desoto", "DeSoto"),
    ("MN", "Lac Qui Parle", "Lac qui Parle"),
    ("OH", "Galia", "Gallia"),
    ("SD", "Mc Cook", "McCook"),
    ("SD", "Bonn Homme", "Bon Homme"),
    ("NM", "DeBaca", "De Baca"),
];

struct Patterns {
    tags: Regex,
    suffix: Regex,
    city: Regex,
    misspellings: Vec<(&'static str, Regex, &'static str)>,
    saint: Regex,
    st: Regex,
    spaces: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        tags: Regex::new(r"<[^>]*>").unwrap(),
        suffix: Regex::new(r"\s+(?:County|Parish)\b").unwrap(),
        city: Regex::new(r"\scity\b").unwrap(),
        misspellings: MISSPELLINGS
            .iter()
            .map(|(state, wrong, right)| {
                let pattern = format!(r"\b{}\b", regex::escape(wrong));
                (*state, Regex::new(&pattern).unwrap(), *right)
            })
            .collect(),
        saint: Regex::new(r"\bSaint\b").unwrap(),
        st: Regex::new(r"\bSt\s+").unwrap(),
        spaces: Regex::new(r"\s+").unwrap(),
    })
}

/// Canonical county name used for matching reference records against rating
/// area rules. `state` selects which misspelling fixes apply.
///
/// ```
/// use rating_areas::normalize_county_name;
/// assert_eq!(normalize_county_name("De Witt County", "IL"), "DeWitt");
/// assert_eq!(normalize_county_name("De Witt County", "TX"), "De Witt");
/// assert_eq!(normalize_county_name("St Louis", "MO"), "St. Louis");
/// ```
pub fn normalize_county_name(raw: &str, state: &str) -> String {
    let p = patterns();
    let name = p.tags.replace_all(raw, " ");
    let name = p.spaces.replace_all(name.trim(), " ");
    let name = p.suffix.replace_all(&name, "");
    let name = p.city.replace_all(&name, " City");
    let mut name = name.into_owned();
    let state = state.trim();
    let fixes = p.misspellings.iter().filter(|(s, ..)| s.eq_ignore_ascii_case(state));
    for (_, pattern, right) in fixes {
        if pattern.is_match(&name) {
            name = pattern.replace_all(&name, *right).into_owned();
        }
    }
    let name = p.saint.replace_all(&name, "St.");
    let name = p.st.replace_all(&name, "St. ");
    p.spaces.replace_all(name.trim(), " ").into_owned()
}
