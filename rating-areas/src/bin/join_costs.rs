use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use quote_scraper::ResultStore;
use rating_areas::io::{read_mapping, write_csv};
use rating_areas::{area_costs, broadcast, check_consistency};

/// Spreads scraped premiums over every ZIP of their rating area and checks
/// the result.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scraper results (State, Zip, Age, Unsubsidized Cost, County)
    #[arg(long, default_value = "zip_codes_results.csv")]
    results: PathBuf,

    #[arg(long, default_value = "merged_results.csv")]
    mapping: PathBuf,

    #[arg(short, long, default_value = "merged_results_with_slcsp.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let quotes = ResultStore::new(&cli.results)
        .load()
        .with_context(|| format!("Failed to load {}", cli.results.display()))?;
    let mappings = read_mapping(&cli.mapping)?;

    let costs = area_costs(&quotes, &mappings);
    let costed = broadcast(&mappings, &costs.costs);
    write_csv(&cli.output, &costed).with_context(|| format!("Failed to write {}", cli.output.display()))?;

    println!("Quotes read: {}", quotes.len());
    println!("  Dropped N/A / ERROR: {}", costs.sentinels);
    println!("  Without a rating area: {}", costs.unmapped.len());
    println!("Rating areas priced: {}", costs.costs.len());
    if !costs.conflicts.is_empty() {
        println!("\nRating areas quoted more than once with different costs:");
        for conflict in &costs.conflicts {
            println!(
                "  {}: kept {:.2}, {} quoted {:.2}",
                conflict.area, conflict.kept, conflict.zip, conflict.other
            );
        }
    }
    println!("\nSaved {} rows to {}", costed.len(), cli.output.display());

    let report = check_consistency(&costed, &quotes);
    println!("\nRating areas with multiple SLCSP values: {}", report.inconsistent_areas.len());
    for area in &report.inconsistent_areas {
        println!("  {}", area);
    }
    println!("Mismatched values between quotes and output: {}", report.mismatches.len());
    for mismatch in report.mismatches.iter().take(10) {
        println!("  {}: {:?} vs quoted {:.2}", mismatch.zip, mismatch.slcsp, mismatch.quoted);
    }
    println!("Rows with missing SLCSP values: {}", report.missing);

    println!("\nSummary statistics by state:");
    println!("  {:<5} {:>6} {:>9} {:>9} {:>9} {:>9}", "state", "count", "min", "max", "mean", "std");
    for s in &report.state_stats {
        println!(
            "  {:<5} {:>6} {:>9.2} {:>9.2} {:>9.2} {:>9.2}",
            s.state, s.count, s.min, s.max, s.mean, s.std_dev
        );
    }

    println!("\nOutliers (>3 std from state mean): {}", report.outliers.len());
    for row in report.outliers.iter().take(10) {
        println!(
            "  {} {} {}: {:?}",
            row.state,
            row.rating_area.as_deref().unwrap_or("-"),
            row.zip_code,
            row.slcsp
        );
    }

    Ok(())
}
