use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use rating_areas::io::{read_mapping, write_csv};
use rating_areas::representative_zips;
use rating_areas::sample::DEFAULT_SEED;

/// Picks one single-county ZIP code per rating area for the scraper.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Rating-area mapping written by resolve_rating_areas
    #[arg(long, default_value = "merged_results.csv")]
    mapping: PathBuf,

    #[arg(short, long, default_value = "zip_codes.csv")]
    output: PathBuf,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mappings = read_mapping(&cli.mapping)?;
    let zips = representative_zips(&mappings, cli.seed);
    write_csv(&cli.output, &zips).with_context(|| format!("Failed to write {}", cli.output.display()))?;

    println!("Total number of ZIP codes selected: {}", zips.len());
    let mut per_state: BTreeMap<&str, usize> = BTreeMap::new();
    for zip in &zips {
        *per_state.entry(zip.state.as_str()).or_default() += 1;
    }
    println!("\nNumber of rating areas per state:");
    for (state, count) in &per_state {
        println!("  {}: {}", state, count);
    }
    println!("\nSaved to {}", cli.output.display());

    Ok(())
}
