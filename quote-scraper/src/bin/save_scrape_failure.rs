use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use scraper::{Html, Selector};

use quote_scraper::config::DEFAULT_WEBDRIVER_URL;
use quote_scraper::{extract_cost, ExtractorConfig, QuoteExtractor, QuoteRequest, WebDriver};

/// Captures the calculator page for one ZIP code so a failing extraction can
/// be replayed in the regression tests.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    state: String,
    zip: String,
    /// Name of the saved fixture, without extension
    test_name: String,

    #[arg(long, default_value_t = 40)]
    age: u32,

    #[arg(long, default_value = DEFAULT_WEBDRIVER_URL)]
    webdriver_url: String,

    /// Show the browser window
    #[arg(long)]
    visible: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let request = QuoteRequest::new(&cli.state, &cli.zip, cli.age)?;
    let config = ExtractorConfig::default();
    let selectors = config.selectors.clone();
    let driver = WebDriver::new(&cli.webdriver_url, !cli.visible, config.timeouts.page_load)?;
    let extractor = QuoteExtractor::new(driver, config);

    println!("Running the calculator for {}...", request);
    let (html, stopped) = extractor
        .capture_page(&request)
        .context("Failed to drive the browser")?;
    if let Some(e) = &stopped {
        println!("Calculator run stopped early: {}", e);
    }

    let failures_dir = Path::new("src/tests/fixtures/failures");
    fs::create_dir_all(failures_dir).context("Failed to create failures directory")?;
    let file_path = failures_dir.join(format!("{}.html", cli.test_name));
    fs::write(&file_path, &html).context("Failed to write HTML file")?;
    println!("Saved HTML to {} for regression testing", file_path.display());

    let document = Html::parse_document(&html);
    let has = |css: &str| {
        Selector::parse(css)
            .map(|s| document.select(&s).next().is_some())
            .unwrap_or(false)
    };
    println!("\nHTML analysis results:");
    println!("  - Has calculator form: {}", has(&selectors.form));
    println!("  - Has results list: {}", has(&selectors.results));
    println!("  - Has definition terms: {}", has("dt"));
    println!(
        "  - Mentions cost label: {}",
        html.to_ascii_lowercase()
            .contains(&selectors.cost_label.to_ascii_lowercase())
    );

    match extract_cost(&html, &selectors.cost_label) {
        Ok(amount) => println!("⚠️ Extraction succeeded (${:.2}). This may not be a failure case.", amount),
        Err(e) => {
            println!("✅ Extraction failed with error: {}", e);
            println!("\nThis page has been saved and will be included in regression tests.");
        }
    }

    Ok(())
}
