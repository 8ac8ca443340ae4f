use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use rating_areas::io::write_csv;
use rating_areas::parse_rating_area_table;

/// Turns a state's rating-area HTML table into STATE,AREA,COUNTY_ZIP3 rules.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Saved HTML table (e.g. the TX or ME rating-area page)
    html: PathBuf,

    /// Two-letter state the table belongs to
    #[arg(short, long)]
    state: String,

    #[arg(short, long)]
    output: PathBuf,

    /// Only treat <td>s with this class as county cells (e.g. xl66)
    #[arg(long)]
    county_class: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let html = fs::read_to_string(&cli.html)
        .with_context(|| format!("Failed to read {}", cli.html.display()))?;

    println!("Parsing {} rating areas...", cli.state.to_ascii_uppercase());
    let entries = parse_rating_area_table(&html, &cli.state, cli.county_class.as_deref());
    if entries.is_empty() {
        bail!("No \"Rating Area\" headings with counties found in {}", cli.html.display());
    }

    // Save the rules file
    write_csv(&cli.output, &entries).with_context(|| format!("Failed to write {}", cli.output.display()))?;

    println!("Found {} county mappings", entries.len());
    let mut per_area: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in &entries {
        *per_area.entry(entry.area.as_str()).or_default() += 1;
    }
    println!("Counties per rating area:");
    for (area, count) in &per_area {
        println!("  {}: {}", area, count);
    }
    println!("\nSaved to {}", cli.output.display());

    Ok(())
}
