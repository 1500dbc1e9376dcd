use std::path::PathBuf;

use anyhow::Result;
use ayto_odds::seasongen;
use clap::Parser;
use itertools::Itertools;

/// Generates a synthetic season: ceremony and truth booth files with a
/// hidden matching behind them.
#[derive(Parser)]
struct Cli {
    /// Number of couples.
    #[clap(long, short = 'n', default_value_t = 8)]
    couples: usize,
    /// Number of ceremony weeks. The final ceremony seats the hidden
    /// matching, so the full season has exactly one solution.
    #[clap(long, short = 'w', default_value_t = 6)]
    weeks: u64,
    #[clap(long, short = 's')]
    seed: Option<u64>,
    /// Directory the week_<k>.json ceremony files are written to.
    #[clap(long, default_value = "ceremony_data")]
    ceremony_dir: PathBuf,
    /// Directory the booth_<k>.json truth booth files are written to.
    #[clap(long, default_value = "truth_booth_data")]
    booth_dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let season = seasongen::generate(args.couples, args.weeks, args.seed)?;
    let written = season.write_to(&args.ceremony_dir, &args.booth_dir)?;
    println!(
        "Wrote: {}",
        written.iter().map(|p| p.display().to_string()).join(", ")
    );
    Ok(())
}
