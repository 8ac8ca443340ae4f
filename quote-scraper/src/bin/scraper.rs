use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use quote_scraper::config::{DEFAULT_INCOME, DEFAULT_WEBDRIVER_URL, KFF_CALCULATOR_URL};
use quote_scraper::input::{load_requests, load_state_lookup};
use quote_scraper::{
    BatchConfig, BatchRunner, CountyStrategy, DelayRange, ExtractorConfig, QuoteExtractor,
    ResultStore, RetryPolicy, ScraperConfig, SelectorSet, ThreadSleep, Timeouts, WebDriver,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// CSV of ZIP codes to quote (needs a zip_code column, state is optional)
    zip_list: PathBuf,

    /// zip_code,state table used for rows without a state
    #[arg(long)]
    state_lookup: Option<PathBuf>,

    /// Results CSV, appended to and resumed from [default: <zip_list>_results.csv]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Age of the single enrollee
    #[arg(long, default_value_t = 40, value_parser = clap::value_parser!(u8).range(0..=64))]
    age: u8,

    /// Show the browser window
    #[arg(long)]
    visible: bool,

    #[arg(long, default_value = DEFAULT_WEBDRIVER_URL)]
    webdriver_url: String,

    #[arg(long, default_value = KFF_CALCULATOR_URL)]
    calculator_url: String,

    #[arg(long, default_value_t = DEFAULT_INCOME)]
    income: u32,

    /// What to do with ZIP codes spanning several counties
    #[arg(long, value_enum, default_value_t = CountyStrategy::First)]
    county_strategy: CountyStrategy,

    /// JSON file overriding some or all page selectors
    #[arg(long)]
    selectors: Option<PathBuf>,

    /// Attempts per ZIP before recording a failure
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Minimum pause between ZIP codes, in seconds
    #[arg(long, default_value_t = 2)]
    min_delay: u64,

    /// Maximum pause between ZIP codes, in seconds
    #[arg(long, default_value_t = 5)]
    max_delay: u64,

    /// Seconds to wait for the calculator to load
    #[arg(long, default_value_t = 60)]
    page_timeout: u64,
}

impl Cli {
    fn into_config(self) -> Result<ScraperConfig> {
        let selectors = match &self.selectors {
            Some(path) => SelectorSet::from_json_file(path)?,
            None => SelectorSet::default(),
        };
        let output = self
            .output
            .unwrap_or_else(|| ScraperConfig::default_output_for(&self.zip_list));
        Ok(ScraperConfig {
            zip_list: self.zip_list,
            state_lookup: self.state_lookup,
            output,
            age: self.age,
            webdriver_url: self.webdriver_url,
            headless: !self.visible,
            extractor: ExtractorConfig {
                calculator_url: self.calculator_url,
                income: self.income,
                county_strategy: self.county_strategy,
                timeouts: Timeouts {
                    page_load: Duration::from_secs(self.page_timeout),
                    ..Timeouts::default()
                },
                selectors,
            },
            batch: BatchConfig {
                retry: RetryPolicy {
                    max_attempts: self.max_attempts,
                    ..RetryPolicy::default()
                },
                politeness: DelayRange::from_secs(self.min_delay, self.max_delay),
            },
        })
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse().into_config()?;
    let started = Local::now();

    let state_lookup = match &config.state_lookup {
        Some(path) => load_state_lookup(path)
            .with_context(|| format!("Failed to load state lookup {}", path.display()))?,
        None => HashMap::new(),
    };
    let requests = load_requests(&config.zip_list, config.age as u32, &state_lookup)
        .with_context(|| format!("Failed to load ZIP list {}", config.zip_list.display()))?;
    info!(
        "Loaded {} ZIP codes from {}, starting at {}",
        requests.len(),
        config.zip_list.display(),
        started.format("%Y-%m-%d %H:%M:%S")
    );

    let driver = WebDriver::new(
        &config.webdriver_url,
        config.headless,
        config.extractor.timeouts.page_load,
    )
    .context("Failed to create WebDriver client")?;
    let extractor = QuoteExtractor::new(driver, config.extractor.clone());
    let store = ResultStore::new(&config.output);

    let report = BatchRunner::new(
        &extractor,
        &store,
        config.batch,
        ThreadSleep,
        StdRng::from_entropy(),
    )
    .run_batch(&requests)
    .context("Failed to write results")?;

    let elapsed = Local::now() - started;
    println!(
        "\nScraping complete in {}m{:02}s. Results in {}",
        elapsed.num_minutes(),
        elapsed.num_seconds() % 60,
        store.path().display()
    );
    println!("  Quoted:     {}", report.succeeded);
    println!("  Not found:  {}", report.not_found);
    println!("  Errors:     {}", report.errors);
    println!("  Skipped:    {} (already in results)", report.skipped);
    if report.duplicates > 0 {
        println!("  Duplicates: {}", report.duplicates);
    }

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!("\nFailed ZIP codes (first 10):");
        for result in failures.iter().take(10) {
            println!("  {} {}: {}", result.state, result.zip, result.cost);
        }
    }

    Ok(())
}
