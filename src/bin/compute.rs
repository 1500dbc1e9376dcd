use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use ayto_odds::solver::{self, SeasonOutput};
use clap::Parser;
use indicatif::ProgressBar;
use itertools::Itertools;
use rayon::prelude::*;

/// Enumerates every matching consistent with the season's ceremonies and
/// truth booths and writes per-pair probabilities as JSON.
#[derive(Parser)]
struct Cli {
    /// Directory holding week_*.json ceremony files.
    #[clap(long, default_value = "ceremony_data")]
    ceremony_dir: PathBuf,
    /// Directory holding booth_*.json truth booth files.
    #[clap(long, default_value = "truth_booth_data")]
    truth_booth_dir: PathBuf,
    /// Path to output file. In split mode its stem becomes the
    /// <stem>_week_<k>.json prefix.
    #[clap(long, short = 'o', default_value = "data.json")]
    output: PathBuf,
    /// Allow // and /* */ comments in input files.
    #[clap(long)]
    allow_comments: bool,
    /// List files as they are read.
    #[clap(long, short = 'v')]
    verbose: bool,
    /// Emit one dataset per week, for k=0..max_week, each using only the
    /// ceremonies and truth booths up to week k.
    #[clap(long)]
    split_weeks: bool,
    /// Compute a single week only, using data up to that week.
    #[clap(long)]
    split_week: Option<u64>,
}

fn week_output(output: &Path, week: u64) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    output.with_file_name(format!("{}_week_{}.json", stem, week))
}

/// Solves one week's problem and writes its dataset. Returns the path and
/// the number of consistent matchings.
fn write_week(
    files: &solver::SeasonFiles,
    output: &Path,
    week: u64,
    warn: impl Fn(&str),
) -> Result<(PathBuf, u64)> {
    let problem = files.problem_for_week(week)?;
    let enumeration = solver::enumerate_matchings(&problem);
    if enumeration.total == 0 {
        warn(&format!(
            "[ERROR] No consistent matchings exist for week {}; writing zeros.",
            week
        ));
    }
    let out = SeasonOutput::new(&problem, &enumeration, Some(week));
    let path = week_output(output, week);
    write_dataset(&path, &out)?;
    Ok((path, enumeration.total))
}

fn write_dataset(path: &Path, out: &SeasonOutput) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer_pretty(file, out)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let files = solver::load_season(
        &args.ceremony_dir,
        &args.truth_booth_dir,
        args.allow_comments,
        args.verbose,
    )?;

    if let Some(week) = args.split_week {
        if files.ceremonies.is_empty() {
            bail!("no ceremony files found (needed for roster)");
        }
        let max_week = files.max_week().unwrap_or(0);
        if week > max_week {
            let mut available = files
                .ceremonies
                .iter()
                .filter_map(|(p, _)| solver::week_of(p))
                .sorted()
                .dedup()
                .join(", ");
            if available.is_empty() {
                available = "none".to_string();
            }
            bail!(
                "requested week {} exceeds max available week {} (ceremony weeks: {})",
                week,
                max_week,
                available
            );
        }
        let (path, total) = write_week(&files, &args.output, week, |msg| eprintln!("{}", msg))?;
        println!("Wrote {} (solutions counted: {})", path.display(), total);
    } else if args.split_weeks {
        if files.ceremonies.is_empty() {
            bail!("no ceremony files found (needed for roster)");
        }
        let max_week = files.max_week().unwrap_or(0);
        let weeks: Vec<u64> = (0..=max_week).collect();
        let bar = ProgressBar::new(weeks.len() as u64);
        let written: Vec<(PathBuf, u64)> = weeks
            .par_iter()
            .map(|&week| {
                let result = write_week(&files, &args.output, week, |msg| bar.println(msg));
                if args.verbose {
                    if let Ok((path, total)) = &result {
                        bar.println(format!(
                            "[split] Wrote {} (solutions counted: {})",
                            path.display(),
                            total
                        ));
                    }
                }
                bar.inc(1);
                result
            })
            .collect::<Result<_>>()?;
        bar.finish_and_clear();
        println!(
            "Wrote: {}",
            written.iter().map(|(p, _)| p.display().to_string()).join(", ")
        );
    } else {
        let problem = files.full_problem()?;
        let enumeration = solver::enumerate_matchings(&problem);
        if enumeration.total == 0 {
            eprintln!("[ERROR] No consistent matchings exist; writing zeros.");
        }
        let out = SeasonOutput::new(&problem, &enumeration, None);
        write_dataset(&args.output, &out)?;
        println!(
            "Wrote {} (solutions counted: {})",
            args.output.display(),
            enumeration.total
        );
    }
    Ok(())
}
