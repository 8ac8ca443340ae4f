//! Rating-area tables published by state regulators as spreadsheet HTML
//! exports (TX, ME). Each "Rating Area N" cell heads the county cells that
//! follow it.

use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;

/// One `STATE,AREA,COUNTY_ZIP3` row of the rules file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableEntry {
    #[serde(rename = "STATE")]
    pub state: String,
    #[serde(rename = "AREA")]
    pub area: String,
    #[serde(rename = "COUNTY_ZIP3")]
    pub county: String,
}

fn heading_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Areas can carry a north/south suffix ("3N")
    PATTERN.get_or_init(|| Regex::new(r"Rating Area\s+(\d+[SN]?)\b").unwrap())
}

/// Rating area named by a heading cell, if `text` is one.
pub fn heading_area(text: &str) -> Option<&str> {
    heading_pattern()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Walks the table cells in document order and assigns every county cell to
/// the most recent rating-area heading.
///
/// `county_class` restricts county cells to `<td>`s carrying that class,
/// which the spreadsheet exports use to tell counties from notes. Header
/// cells ("County"), empty cells and cells before the first heading are
/// skipped.
pub fn parse_rating_area_table(html: &str, state: &str, county_class: Option<&str>) -> Vec<TableEntry> {
    let document = Html::parse_document(html);
    let cell_selector = Selector::parse("td").unwrap();
    let state = state.trim().to_ascii_uppercase();

    let mut entries = Vec::new();
    let mut current_area: Option<String> = None;
    let mut orphans = 0;

    for cell in document.select(&cell_selector) {
        // Exports wrap long cells over several lines
        let text = cell.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

        if let Some(area) = heading_area(&text) {
            debug!("{} heading: Rating Area {}", state, area);
            current_area = Some(area.to_string());
            continue;
        }
        if let Some(class) = county_class {
            if !cell.value().has_class(class, scraper::CaseSensitivity::AsciiCaseInsensitive) {
                continue;
            }
        }
        if text.is_empty() || text.eq_ignore_ascii_case("County") {
            continue;
        }

        match &current_area {
            Some(area) => entries.push(TableEntry {
                state: state.clone(),
                area: area.clone(),
                county: text,
            }),
            None => orphans += 1,
        }
    }

    if orphans > 0 {
        warn!("{} {} cells came before any rating area heading and were skipped", orphans, state);
    }
    entries
}
