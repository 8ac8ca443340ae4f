use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::config::{CountyStrategy, ExtractorConfig};
use crate::model::{Cost, QuoteRequest, QuoteResult};
use crate::webdriver::{BrowserError, FormPage, Launcher, SelectOption};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("calculator form did not load within {0:?}")]
    PageLoadTimeout(Duration),
    #[error("{what} not ready within {after:?}")]
    WaitTimeout { what: String, after: Duration },
    #[error("page interaction failed: {0}")]
    PageInteraction(#[from] BrowserError),
    #[error("results page did not contain an unsubsidized cost")]
    ExtractionNotFound,
}

impl From<Result<f64, ExtractError>> for Cost {
    fn from(outcome: Result<f64, ExtractError>) -> Self {
        match outcome {
            Ok(amount) => Cost::Amount(amount),
            Err(ExtractError::ExtractionNotFound) => Cost::NotFound,
            Err(_) => Cost::Error,
        }
    }
}

fn dollar_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\s*(\d{1,3}(?:,\d{3})+|\d+)(\.\d{1,2})?").expect("dollar pattern is valid")
    })
}

/// First dollar figure in `text`, with thousands separators removed.
pub fn parse_cost(text: &str) -> Option<f64> {
    let captures = dollar_pattern().captures(text)?;
    let whole = captures.get(1)?.as_str().replace(',', "");
    let cents = captures.get(2).map_or("", |m| m.as_str());
    format!("{}{}", whole, cents).parse().ok()
}

/// Reads the unsubsidized premium off a rendered results page.
///
/// The figure normally sits in the `<dd>` following the `<dt>` carrying
/// `cost_label`. A labelled `<dd>` without an amount means no quote. Some
/// page versions drop the definition list; only then is the sentence right
/// after the label searched for a dollar amount.
pub fn extract_cost(html: &str, cost_label: &str) -> Result<f64, ExtractError> {
    let document = Html::parse_document(html);
    let dt_selector = Selector::parse("dt").unwrap();
    let label = cost_label.to_ascii_lowercase();

    let mut labelled = false;
    for dt in document.select(&dt_selector) {
        let text = dt.text().collect::<String>().to_ascii_lowercase();
        if !text.contains(&label) {
            continue;
        }
        labelled = true;
        let dd = dt.next_siblings().filter_map(ElementRef::wrap).next();
        if let Some(dd) = dd.filter(|el| el.value().name() == "dd") {
            if let Some(amount) = parse_cost(&dd.text().collect::<String>()) {
                return Ok(amount);
            }
        }
    }
    if labelled {
        // The next row is the subsidy, never read past an empty cost cell
        return Err(ExtractError::ExtractionNotFound);
    }

    let body_text = document.root_element().text().collect::<Vec<_>>().join(" ");
    if let Some(pos) = body_text.to_ascii_lowercase().find(&label) {
        let after_label = sentence_after_label(&body_text[pos + label.len()..]);
        if let Some(amount) = parse_cost(after_label) {
            warn!("Cost found outside the results list, check the selector set");
            return Ok(amount);
        }
    }

    Err(ExtractError::ExtractionNotFound)
}

fn sentence_end() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.:?!](?:\s|$)").unwrap())
}

/// Text following a label up to the end of its sentence, at most 200 chars.
fn sentence_after_label(text: &str) -> &str {
    let text = text.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    let end = text
        .char_indices()
        .nth(200)
        .map_or(text.len(), |(i, _)| i);
    let window = &text[..end];
    match sentence_end().find(window) {
        Some(m) => &window[..m.start()],
        None => window,
    }
}

/// Polls `check` until it reports true or `timeout` elapses. Always checks at
/// least once.
fn wait_until<F>(what: &str, timeout: Duration, poll: Duration, mut check: F) -> Result<(), ExtractError>
where
    F: FnMut() -> Result<bool, BrowserError>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check()? {
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(ExtractError::WaitTimeout {
                what: what.to_string(),
                after: timeout,
            });
        }
        thread::sleep(poll.min(deadline - now));
    }
}

fn wait_visible<P: FormPage>(page: &mut P, selector: &str, timeout: Duration, poll: Duration) -> Result<(), ExtractError> {
    wait_until(selector, timeout, poll, || page.is_visible(selector))
}

/// Drives the subsidy calculator for one request at a time.
pub struct QuoteExtractor<L: Launcher> {
    launcher: L,
    config: ExtractorConfig,
}

impl<L: Launcher> QuoteExtractor<L> {
    pub fn new(launcher: L, config: ExtractorConfig) -> Self {
        QuoteExtractor { launcher, config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Quote for the first county the calculator offers.
    pub fn fetch_quote(&self, request: &QuoteRequest) -> QuoteResult {
        self.fetch(request, CountyStrategy::First)
            .into_iter()
            .next()
            .unwrap_or_else(|| QuoteResult::error(request))
    }

    /// Quotes according to the configured county strategy. Never empty.
    pub fn fetch_quotes(&self, request: &QuoteRequest) -> Vec<QuoteResult> {
        self.fetch(request, self.config.county_strategy)
    }

    /// Runs the form for the first county and returns the page source where
    /// the run stopped, along with the error when it stopped early.
    pub fn capture_page(&self, request: &QuoteRequest) -> Result<(String, Option<ExtractError>), BrowserError> {
        let mut page = self.launcher.launch()?;
        let outcome = self
            .open_form(&mut page, request)
            .and_then(|counties| self.complete_form(&mut page, request, counties.first()));
        match outcome {
            Ok(html) => Ok((html, None)),
            Err(e) => Ok((page.source()?, Some(e))),
        }
    }

    fn fetch(&self, request: &QuoteRequest, strategy: CountyStrategy) -> Vec<QuoteResult> {
        info!("Scraping {}", request);

        // The session is closed when `page` goes out of scope, on every return path.
        let mut page = match self.launcher.launch() {
            Ok(page) => page,
            Err(e) => {
                warn!("Could not start a browser session for {}: {}", request, e);
                return vec![QuoteResult::error(request)];
            }
        };

        let counties = match self.open_form(&mut page, request) {
            Ok(counties) => counties,
            Err(e) => {
                warn!("{}: {}", request, e);
                return vec![QuoteResult::error(request)];
            }
        };

        match (strategy, counties.first()) {
            (_, None) => vec![self.finish(&mut page, request, None)],
            (CountyStrategy::First, Some(first)) => {
                if counties.len() > 1 {
                    info!("  {} counties for {}, using {}", counties.len(), request.zip(), first.label);
                }
                vec![self.finish(&mut page, request, Some(first))]
            }
            (CountyStrategy::Each, Some(_)) => {
                let mut results = Vec::with_capacity(counties.len());
                for (i, county) in counties.iter().enumerate() {
                    if i > 0 {
                        if let Err(e) = self.open_form(&mut page, request) {
                            warn!("{} ({}): {}", request, county.label, e);
                            results.push(QuoteResult::new(request, Some(county.label.clone()), Cost::Error));
                            continue;
                        }
                    }
                    results.push(self.finish(&mut page, request, Some(county)));
                }
                results
            }
        }
    }

    /// Loads the calculator, enters state and ZIP, and returns the counties
    /// offered for the ZIP (empty when the calculator asks for none).
    fn open_form<P: FormPage>(&self, page: &mut P, request: &QuoteRequest) -> Result<Vec<SelectOption>, ExtractError> {
        let selectors = &self.config.selectors;
        let timeouts = &self.config.timeouts;

        debug!("Loading {}", self.config.calculator_url);
        page.goto(&self.config.calculator_url).map_err(|e| {
            if e.is_timeout() {
                ExtractError::PageLoadTimeout(timeouts.page_load)
            } else {
                ExtractError::PageInteraction(e)
            }
        })?;
        wait_visible(page, &selectors.form, timeouts.page_load, timeouts.poll).map_err(|e| match e {
            ExtractError::WaitTimeout { .. } => ExtractError::PageLoadTimeout(timeouts.page_load),
            other => other,
        })?;

        page.select(&selectors.state, &request.state().to_ascii_lowercase())?;
        page.fill(&selectors.zip, request.zip())?;

        let county = selectors.county.as_str();
        let populated = wait_until("county list", timeouts.county, timeouts.poll, || {
            Ok(page.is_visible(county)? && page.is_enabled(county)? && !page.options(county)?.is_empty())
        });
        match populated {
            Ok(()) => Ok(page.options(county)?),
            Err(ExtractError::WaitTimeout { .. }) => {
                debug!("No county selection for {}", request.zip());
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn finish<P: FormPage>(&self, page: &mut P, request: &QuoteRequest, county: Option<&SelectOption>) -> QuoteResult {
        let outcome = self
            .complete_form(page, request, county)
            .and_then(|html| extract_cost(&html, &self.config.selectors.cost_label));
        if let Err(e) = &outcome {
            warn!("{}: {}", request, e);
        }
        let cost = Cost::from(outcome);
        info!("  → {} unsubsidized cost: {}", request.zip(), cost);
        QuoteResult::new(request, county.map(|c| c.label.clone()), cost)
    }

    /// Fills the remaining fields, submits, and returns the results page source.
    fn complete_form<P: FormPage>(
        &self,
        page: &mut P,
        request: &QuoteRequest,
        county: Option<&SelectOption>,
    ) -> Result<String, ExtractError> {
        let selectors = &self.config.selectors;
        let timeouts = &self.config.timeouts;

        if let Some(county) = county {
            page.select(&selectors.county, &county.value)?;
        }
        page.fill(&selectors.income, &self.config.income.to_string())?;
        page.click(&selectors.employer_coverage_no)?;
        page.select(&selectors.household_size, "1")?;
        self.set_household(page, request)?;
        self.submit(page)?;

        wait_visible(page, &selectors.results, timeouts.results, timeouts.poll)?;
        Ok(page.source()?)
    }

    fn set_household<P: FormPage>(&self, page: &mut P, request: &QuoteRequest) -> Result<(), ExtractError> {
        let selectors = &self.config.selectors;
        let timeouts = &self.config.timeouts;

        if request.uses_alternate_household() {
            wait_visible(page, &selectors.household_alternate, timeouts.field, timeouts.poll)?;
            page.select(&selectors.household_alternate, &selectors.household_alternate_value)?;
            return Ok(());
        }

        let (adults, children, age_select) = if request.is_adult() {
            ("1", "0", &selectors.adult_age)
        } else {
            ("0", "1", &selectors.child_age)
        };
        wait_visible(page, &selectors.adult_count, timeouts.field, timeouts.poll)?;
        page.select(&selectors.adult_count, adults)?;
        page.select(&selectors.child_count, children)?;
        wait_visible(page, age_select, timeouts.field, timeouts.poll)?;
        page.select(age_select, &request.age().to_string())?;
        Ok(())
    }

    fn submit<P: FormPage>(&self, page: &mut P) -> Result<(), ExtractError> {
        let selectors = &self.config.selectors;
        if page.is_enabled(&selectors.submit)? {
            match page.click(&selectors.submit) {
                Ok(()) => return Ok(()),
                Err(e) => warn!("Submit click failed ({}), submitting the form directly", e),
            }
        } else {
            debug!("Submit button disabled, submitting the form directly");
        }
        page.submit_form(&selectors.form)?;
        Ok(())
    }
}
