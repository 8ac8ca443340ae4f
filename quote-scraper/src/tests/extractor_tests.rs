use std::time::Duration;

use anyhow::Result;

use super::fixtures;
use super::save_failed_html;
use super::FakeCalculator;
use crate::config::{CountyStrategy, ExtractorConfig, Timeouts};
use crate::extractor::{extract_cost, ExtractError, QuoteExtractor};
use crate::model::{Cost, QuoteRequest};
use crate::selectors::SelectorSet;

const COST_LABEL: &str = "Without financial help, your silver plan would cost";

fn fast_config() -> ExtractorConfig {
    let short = Duration::from_millis(20);
    ExtractorConfig {
        timeouts: Timeouts {
            page_load: short,
            field: short,
            county: short,
            results: short,
            poll: Duration::from_millis(1),
        },
        ..ExtractorConfig::default()
    }
}

fn request(state: &str, zip: &str, age: u32) -> QuoteRequest {
    QuoteRequest::new(state, zip, age).unwrap()
}

#[test]
fn test_sample_results_page() {
    let html = fixtures::load_html_fixture("results_page");
    let result = extract_cost(&html, COST_LABEL);

    if let Err(e) = &result {
        println!("Error: {}", e);
        save_failed_html(&html, "sample_results_page_test").unwrap();
    }

    assert_eq!(result.unwrap(), 1024.0);
}

#[test]
fn test_label_without_amount_is_not_found() {
    let html = fixtures::load_html_fixture("results_page_no_cost");
    let result = extract_cost(&html, COST_LABEL);
    assert!(matches!(result, Err(ExtractError::ExtractionNotFound)));
}

#[test]
fn test_empty_cost_cell_does_not_read_the_subsidy_row() {
    let html = fixtures::load_html_fixture("results_page_empty_cost");
    let result = extract_cost(&html, COST_LABEL);
    assert!(matches!(result, Err(ExtractError::ExtractionNotFound)));
}

#[test]
fn test_text_fallback_stops_at_the_end_of_the_sentence() {
    let html = r#"
    <html>
    <body>
      <p>Without financial help, your silver plan would cost: not available.</p>
      <p>Your financial help from the government is $0.</p>
    </body>
    </html>
    "#;
    assert!(matches!(
        extract_cost(html, COST_LABEL),
        Err(ExtractError::ExtractionNotFound)
    ));

    let html = r#"<p>Without financial help, your silver plan would cost: $1,187.25 per month. Help is $0.</p>"#;
    assert_eq!(extract_cost(html, COST_LABEL).unwrap(), 1187.25);
}

#[test]
fn test_page_without_label_is_not_found() {
    let html = r#"
    <html>
    <body><ul class="results-list"><li>Premiums start at $300</li></ul></body>
    </html>
    "#;
    assert!(matches!(
        extract_cost(html, COST_LABEL),
        Err(ExtractError::ExtractionNotFound)
    ));
}

// Regression tests - load captured pages from the failures directory
#[test]
fn test_regression_failures() -> Result<()> {
    use std::fs;
    use std::path::Path;

    let failures_dir = Path::new("src/tests/fixtures/failures");
    if !failures_dir.exists() {
        return Err(anyhow::anyhow!("failure fixtures not found"));
    }

    let mut failures: Vec<String> = Vec::new();
    for entry in fs::read_dir(failures_dir)? {
        let path = entry?.path();
        if path.extension().map_or(false, |ext| ext == "html") {
            let filename = path.file_stem().unwrap().to_string_lossy().to_string();
            println!("Testing regression case: {}", filename);

            if let Some(html) = fixtures::load_failure_html(&filename) {
                match extract_cost(&html, COST_LABEL) {
                    Ok(amount) => println!("✅ {} now yields {}", filename, amount),
                    Err(e) => failures.push(format!("❌ Still failing: {} - {}", filename, e)),
                }
            }
        }
    }
    if !failures.is_empty() {
        return Err(anyhow::anyhow!(failures.join("\n")));
    }

    Ok(())
}

#[test]
fn test_adult_household() {
    let calculator = FakeCalculator::new(&fixtures::results_page("$612"));
    let log = calculator.log.clone();
    let extractor = QuoteExtractor::new(calculator, fast_config());

    let result = extractor.fetch_quote(&request("MA", "02134", 30));
    assert_eq!(result.cost, Cost::Amount(612.0));
    assert_eq!(result.county, None);

    let log = log.borrow();
    let selectors = SelectorSet::default();
    assert!(log.did(&format!("select {}=ma", selectors.state)));
    assert!(log.did(&format!("fill {}=02134", selectors.zip)));
    assert!(log.did(&format!("fill {}=1000000", selectors.income)));
    assert!(log.did(&format!("click {}", selectors.employer_coverage_no)));
    assert!(log.did(&format!("select {}=1", selectors.adult_count)));
    assert!(log.did(&format!("select {}=0", selectors.child_count)));
    assert!(log.did(&format!("select {}=30", selectors.adult_age)));
    assert!(log.did(&format!("click {}", selectors.submit)));
    assert_eq!(log.count("select select[name='children"), 0);
    assert_eq!((log.opened, log.closed), (1, 1));
}

#[test]
fn test_child_household() {
    let calculator = FakeCalculator::new(&fixtures::results_page("$305.50"));
    let log = calculator.log.clone();
    let extractor = QuoteExtractor::new(calculator, fast_config());

    let result = extractor.fetch_quote(&request("TX", "75001", 20));
    assert_eq!(result.cost, Cost::Amount(305.5));

    let log = log.borrow();
    let selectors = SelectorSet::default();
    assert!(log.did(&format!("select {}=0", selectors.adult_count)));
    assert!(log.did(&format!("select {}=1", selectors.child_count)));
    assert!(log.did(&format!("select {}=20", selectors.child_age)));
    assert_eq!(log.count("select select[name='adults"), 0);
}

#[test]
fn test_new_york_uses_alternate_household_control() {
    let calculator = FakeCalculator::new(&fixtures::results_page("$1,150"));
    let log = calculator.log.clone();
    let extractor = QuoteExtractor::new(calculator, fast_config());

    let result = extractor.fetch_quote(&request("NY", "10001", 45));
    assert_eq!(result.cost, Cost::Amount(1150.0));

    let log = log.borrow();
    let selectors = SelectorSet::default();
    assert!(log.did(&format!(
        "select {}={}",
        selectors.household_alternate, selectors.household_alternate_value
    )));
    assert_eq!(log.count(&format!("select {}", selectors.adult_count)), 0);
    assert_eq!(log.count(&format!("select {}", selectors.adult_age)), 0);
}

#[test]
fn test_missing_cost_is_not_found() {
    let calculator = FakeCalculator::new(&fixtures::load_html_fixture("results_page_no_cost"));
    let log = calculator.log.clone();
    let extractor = QuoteExtractor::new(calculator, fast_config());

    let result = extractor.fetch_quote(&request("AK", "99501", 30));
    assert_eq!(result.cost, Cost::NotFound);
    assert_eq!(log.borrow().closed, 1);
}

#[test]
fn test_empty_cost_cell_is_not_found_not_zero() {
    let calculator = FakeCalculator::new(&fixtures::load_html_fixture("results_page_empty_cost"));
    let extractor = QuoteExtractor::new(calculator, fast_config());

    let result = extractor.fetch_quote(&request("WY", "82001", 40));
    assert_eq!(result.cost, Cost::NotFound);
    assert_eq!(result.cost.to_string(), "N/A");
}

#[test]
fn test_form_never_loading_is_an_error_and_releases_the_session() {
    let mut calculator = FakeCalculator::new(&fixtures::results_page("$612"));
    calculator.form_loads = false;
    let log = calculator.log.clone();
    let extractor = QuoteExtractor::new(calculator, fast_config());

    let result = extractor.fetch_quote(&request("MA", "02134", 30));
    assert_eq!(result.cost, Cost::Error);

    let log = log.borrow();
    assert_eq!((log.opened, log.closed), (1, 1));
    assert_eq!(log.count("fill "), 0);
}

#[test]
fn test_results_never_rendering_is_an_error() {
    let mut calculator = FakeCalculator::new(&fixtures::results_page("$612"));
    calculator.results_render = false;
    let log = calculator.log.clone();
    let extractor = QuoteExtractor::new(calculator, fast_config());

    let result = extractor.fetch_quote(&request("MA", "02134", 30));
    assert_eq!(result.cost, Cost::Error);
    assert_eq!(log.borrow().closed, 1);
}

#[test]
fn test_browser_that_cannot_start_is_an_error() {
    let mut calculator = FakeCalculator::new(&fixtures::results_page("$612"));
    calculator.launch_fails = true;
    let log = calculator.log.clone();
    let extractor = QuoteExtractor::new(calculator, fast_config());

    let results = extractor.fetch_quotes(&request("MA", "02134", 30));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].cost, Cost::Error);
    assert_eq!(log.borrow().opened, 0);
}

#[test]
fn test_missing_control_is_an_error() {
    let mut calculator = FakeCalculator::new(&fixtures::results_page("$612"));
    calculator.missing.push(SelectorSet::default().income);
    let extractor = QuoteExtractor::new(calculator, fast_config());

    let result = extractor.fetch_quote(&request("MA", "02134", 30));
    assert_eq!(result.cost, Cost::Error);
}

#[test]
fn test_disabled_submit_submits_the_form() {
    let mut calculator = FakeCalculator::new(&fixtures::results_page("$612"));
    calculator.submit_enabled = false;
    let log = calculator.log.clone();
    let extractor = QuoteExtractor::new(calculator, fast_config());

    let result = extractor.fetch_quote(&request("MA", "02134", 30));
    assert_eq!(result.cost, Cost::Amount(612.0));

    let log = log.borrow();
    let selectors = SelectorSet::default();
    assert!(log.did(&format!("submit_form {}", selectors.form)));
    assert_eq!(log.count(&format!("click {}", selectors.submit)), 0);
}

#[test]
fn test_first_county_strategy() {
    let calculator = FakeCalculator::new(&fixtures::results_page("$999"))
        .with_county("25017", "Middlesex County", &fixtures::results_page("$640"))
        .with_county("25027", "Worcester County", &fixtures::results_page("$580"));
    let log = calculator.log.clone();
    let extractor = QuoteExtractor::new(calculator, fast_config());

    let results = extractor.fetch_quotes(&request("MA", "01434", 30));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].county.as_deref(), Some("Middlesex County"));
    assert_eq!(results[0].cost, Cost::Amount(640.0));
    assert!(log.borrow().did("select select[name='locale']=25017"));
}

#[test]
fn test_each_county_strategy() {
    let calculator = FakeCalculator::new(&fixtures::results_page("$999"))
        .with_county("25017", "Middlesex County", &fixtures::results_page("$640"))
        .with_county("25027", "Worcester County", &fixtures::results_page("$580"));
    let log = calculator.log.clone();
    let config = ExtractorConfig {
        county_strategy: CountyStrategy::Each,
        ..fast_config()
    };
    let extractor = QuoteExtractor::new(calculator, config);

    let results = extractor.fetch_quotes(&request("MA", "01434", 30));
    let quoted: Vec<_> = results
        .iter()
        .map(|r| (r.county.as_deref(), r.cost))
        .collect();
    assert_eq!(
        quoted,
        vec![
            (Some("Middlesex County"), Cost::Amount(640.0)),
            (Some("Worcester County"), Cost::Amount(580.0)),
        ]
    );

    let log = log.borrow();
    assert_eq!(log.count("goto "), 2);
    assert_eq!((log.opened, log.closed), (1, 1));
}

#[test]
fn test_capture_page_keeps_partial_page() {
    let mut calculator = FakeCalculator::new("<html><form id=\"subsidy-form\"></form></html>");
    calculator.results_render = false;
    let log = calculator.log.clone();
    let extractor = QuoteExtractor::new(calculator, fast_config());

    let (html, stopped) = extractor
        .capture_page(&request("MA", "02134", 30))
        .unwrap();
    assert!(html.contains("subsidy-form"));
    assert!(matches!(stopped, Some(ExtractError::WaitTimeout { .. })));
    assert_eq!(log.borrow().closed, 1);
}
