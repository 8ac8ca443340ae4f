pub mod batch;
pub mod config;
pub mod extractor;
pub mod input;
pub mod model;
pub mod selectors;
pub mod store;
pub mod webdriver;

// Calculator fakes and HTML fixtures for the extractor and batch tests
#[cfg(test)]
pub mod tests;

// Re-export key types and functions for easier access
pub use crate::batch::{BatchReport, BatchRunner, Pause, Progress, ProgressStatus, QuoteSource, ThreadSleep};
pub use crate::config::{
    BatchConfig, CountyStrategy, DelayRange, ExtractorConfig, RetryPolicy, ScraperConfig, Timeouts,
};
pub use crate::extractor::{extract_cost, parse_cost, ExtractError, QuoteExtractor};
pub use crate::model::{normalize_zip, zip_from_int, Cost, QuoteKey, QuoteRequest, QuoteResult};
pub use crate::selectors::SelectorSet;
pub use crate::store::{ResultStore, StoreError};
pub use crate::webdriver::{BrowserError, FormPage, Launcher, WebDriver};
