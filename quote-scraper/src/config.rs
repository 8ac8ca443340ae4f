use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use rand::Rng;

use crate::selectors::SelectorSet;

pub const KFF_CALCULATOR_URL: &str =
    "https://www.kff.org/interactive/calculator-aca-enhanced-premium-tax-credit/";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
/// High enough that no premium tax credit applies, so the calculator shows
/// the unsubsidized premium.
pub const DEFAULT_INCOME: u32 = 1_000_000;

/// What to do when a ZIP code spans several counties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum CountyStrategy {
    /// Quote the first county offered and return a single result
    #[default]
    First,
    /// Quote every county and return one result per county
    Each,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Until the calculator form is visible after navigation.
    pub page_load: Duration,
    /// For dependent controls such as the age selects to appear.
    pub field: Duration,
    /// For the county select to populate after the ZIP is entered.
    pub county: Duration,
    pub results: Duration,
    /// Interval between visibility checks while waiting.
    pub poll: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            page_load: Duration::from_secs(60),
            field: Duration::from_secs(10),
            county: Duration::from_secs(8),
            results: Duration::from_secs(30),
            poll: Duration::from_millis(250),
        }
    }
}

/// Uniform random delay between `min` and `max` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub fn from_secs(min: u64, max: u64) -> Self {
        DelayRange {
            min: Duration::from_secs(min),
            max: Duration::from_secs(max),
        }
    }

    pub fn none() -> Self {
        DelayRange {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(rng.gen_range(min..=max))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    pub delay: DelayRange,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            delay: DelayRange::from_secs(5, 8),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub calculator_url: String,
    pub income: u32,
    pub county_strategy: CountyStrategy,
    pub timeouts: Timeouts,
    pub selectors: SelectorSet,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            calculator_url: KFF_CALCULATOR_URL.to_string(),
            income: DEFAULT_INCOME,
            county_strategy: CountyStrategy::default(),
            timeouts: Timeouts::default(),
            selectors: SelectorSet::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub retry: RetryPolicy,
    /// Pause between distinct ZIP codes, whether or not the last one worked.
    pub politeness: DelayRange,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            retry: RetryPolicy::default(),
            politeness: DelayRange::from_secs(2, 5),
        }
    }
}

/// Everything one scraping run needs, assembled by the `scraper` binary.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub zip_list: PathBuf,
    /// `zip_code,state` table used when the ZIP list has no state column.
    pub state_lookup: Option<PathBuf>,
    pub output: PathBuf,
    pub age: u8,
    pub webdriver_url: String,
    pub headless: bool,
    pub extractor: ExtractorConfig,
    pub batch: BatchConfig,
}

impl ScraperConfig {
    /// Results land next to the ZIP list unless told otherwise.
    pub fn default_output_for(zip_list: &std::path::Path) -> PathBuf {
        let stem = zip_list
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "zip_codes".to_string());
        zip_list.with_file_name(format!("{}_results.csv", stem))
    }
}
