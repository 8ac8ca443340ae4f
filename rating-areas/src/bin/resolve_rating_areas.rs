use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use rating_areas::io::{read_county_reference, read_overrides, read_rules, write_csv};
use rating_areas::{resolve, OverrideTable, ResolverOptions};

/// Assigns an ACA rating area to every ZIP/county pair of the crosswalk.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// ZIP → county crosswalk (ZIP, COUNTYNAME, STATE, STCOUNTYFP, CLASSFP)
    #[arg(long, default_value = "ZIP-COUNTY-FIPS_2017-06.csv")]
    county_reference: PathBuf,

    /// Rating-area rules (STATE, AREA, COUNTY_ZIP3)
    #[arg(long, default_value = "areas.csv")]
    rules: PathBuf,

    #[arg(short, long, default_value = "merged_results.csv")]
    output: PathBuf,

    #[arg(long, default_value = "unmatched_records.csv")]
    unmatched: PathBuf,

    /// State to leave out entirely (repeatable)
    #[arg(long = "exclude-state")]
    exclude_states: Vec<String>,

    /// CLASSFP code to leave out, e.g. H4 (repeatable)
    #[arg(long = "exclude-class")]
    exclude_classes: Vec<String>,

    /// state,zip3,rating_area table replacing the built-in Los Angeles split
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Disable geographic overrides
    #[arg(long, conflicts_with = "overrides")]
    no_overrides: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    info!("Loading data files...");
    let county_refs = read_county_reference(&cli.county_reference)?;
    println!(
        "Loaded {} with {} rows",
        cli.county_reference.display(),
        county_refs.len()
    );
    let rules = read_rules(&cli.rules)?;
    println!("Loaded {} with {} rules", cli.rules.display(), rules.len());

    let overrides = match (&cli.overrides, cli.no_overrides) {
        (Some(path), _) => read_overrides(path)?,
        (None, true) => OverrideTable::empty(),
        (None, false) => OverrideTable::los_angeles(),
    };
    let options = ResolverOptions {
        exclude_states: cli.exclude_states.iter().map(|s| s.to_ascii_uppercase()).collect::<BTreeSet<_>>(),
        exclude_classes: cli.exclude_classes.iter().cloned().collect(),
        overrides,
    };

    let resolution = resolve(&county_refs, &rules, &options);
    let stats = &resolution.stats;

    println!("\nMatching Results:");
    println!("Total records: {}", stats.total);
    if stats.excluded > 0 {
        println!("Excluded: {}", stats.excluded);
    }
    if stats.malformed > 0 {
        println!("Skipped malformed ZIPs: {}", stats.malformed);
    }
    println!("Successfully matched: {}", stats.matched());
    println!("  Territories: {}", stats.territory);
    println!("  Overrides:   {}", stats.overridden);
    println!("  ZIP3 rules:  {}", stats.by_zip3);
    println!("  County rules: {}", stats.by_county);
    println!("Success rate: {:.2}%", stats.match_rate());

    write_csv(&cli.output, &resolution.mappings)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    println!("\nResults saved to: {}", cli.output.display());

    if !resolution.unmatched.is_empty() {
        println!("\nUnmatched records by state:");
        for (state, count) in resolution.unmatched_by_state() {
            println!("  {}: {}", state, count);
        }

        write_csv(&cli.unmatched, &resolution.unmatched)
            .with_context(|| format!("Failed to write {}", cli.unmatched.display()))?;
        println!("\nUnmatched records saved to: {}", cli.unmatched.display());

        println!("\nSample of unmatched records:");
        for record in resolution.unmatched.iter().take(5) {
            println!(
                "  {} {} ({}) → {:?}",
                record.state, record.zip_code, record.county_original, record.county_standardized
            );
        }
    }

    Ok(())
}
