use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;

use quote_scraper::ResultStore;
use rating_areas::io::read_mapping;
use rating_areas::{area_costs, ParamFile};

/// Adds a new effective date of premiums to the state/rating-area parameter
/// file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Parameter YAML to update
    params: PathBuf,

    /// Scraper results (State, Zip, Age, Unsubsidized Cost, County)
    #[arg(long, default_value = "zip_codes_results.csv")]
    results: PathBuf,

    #[arg(long, default_value = "merged_results.csv")]
    mapping: PathBuf,

    /// Date the premiums take effect
    #[arg(long, default_value = "2026-01-01")]
    effective_date: NaiveDate,

    /// Write here instead of updating the parameter file in place
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report what would change without writing
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let quotes = ResultStore::new(&cli.results)
        .load()
        .with_context(|| format!("Failed to load {}", cli.results.display()))?;
    let mappings = read_mapping(&cli.mapping)?;
    let costs = area_costs(&quotes, &mappings);
    println!("Found {} state/rating area combinations", costs.costs.len());

    let mut params = ParamFile::read(&cli.params)?;
    let report = params.merge_costs(&costs.costs, cli.effective_date);

    println!(
        "Added {} {} values to existing rating areas",
        report.updated.len(),
        cli.effective_date
    );
    if !report.missing_states.is_empty() {
        let states: Vec<_> = report.missing_states.iter().map(String::as_str).collect();
        println!("\nWARNING: states not in the parameter file: {}", states.join(", "));
    }
    if !report.missing_areas.is_empty() {
        println!(
            "\nWARNING: {} rating areas not found in the parameter file:",
            report.missing_areas.len()
        );
        for area in report.missing_areas.iter().take(20) {
            println!("  - {}", area);
        }
        if report.missing_areas.len() > 20 {
            println!("  ... and {} more", report.missing_areas.len() - 20);
        }
    }

    if cli.dry_run {
        println!("\nDry run, nothing written");
        return Ok(());
    }
    let output = cli.output.as_ref().unwrap_or(&cli.params);
    let text = params.render().context("Failed to serialize parameters")?;
    fs::write(output, text).with_context(|| format!("Failed to write {}", output.display()))?;
    println!("\nUpdated file: {}", output.display());

    Ok(())
}
