use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Result, bail};
use ayto_odds::dataset::Grid;
use ayto_odds::history::History;
use ayto_odds::scene::{self, HeatmapScene};
use ayto_odds::source::{Source, WeekBundle};
use ayto_odds::www::handlers::template;
use ayto_odds::{ceremony, svg};
use clap::{Parser, ValueEnum};

/// Renders week boards to standalone files, without serving.
#[derive(Parser)]
struct Cli {
    /// Local directory with data_week_<k>.json files. Defaults to the
    /// current directory.
    #[clap(long, conflicts_with = "base_url")]
    data_dir: Option<PathBuf>,
    /// Base URL serving the week files over HTTP instead.
    #[clap(long)]
    base_url: Option<String>,
    /// Render a single week instead of the whole season.
    #[clap(long, short = 'w')]
    week: Option<u64>,
    /// Directory the rendered files are written to.
    #[clap(long, short = 'o', default_value = "boards")]
    out_dir: PathBuf,
    /// File format: svg writes the bare heatmap, html a full page with the
    /// ceremony table.
    #[clap(long, short = 'f', default_value = "svg")]
    format: Format,
    /// Viewport width the layout is sized for.
    #[clap(long, default_value_t = scene::DEFAULT_VIEWPORT)]
    width: f64,
}

#[derive(Default, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    #[default]
    Svg,
    Html,
}

fn nav_fragment(bundles: &[WeekBundle], current: u64) -> String {
    let links: Vec<String> = bundles
        .iter()
        .map(|b| {
            if b.week == current {
                format!("<b>Week {}</b>", b.week)
            } else {
                format!(r#"<a href="week_{}.html">Week {}</a>"#, b.week, b.week)
            }
        })
        .collect();
    format!(r#"<nav class="weeks">{}</nav>"#, links.join(" | "))
}

fn html_page(
    bundles: &[WeekBundle],
    bundle: &WeekBundle,
    history: &History,
    grid: &Grid,
    board: &str,
) -> Result<String> {
    let table = ceremony::render_table(
        &bundle.ceremony,
        &history.prior(bundle.week as usize),
        &grid.key_values(),
    )?;
    let mut contents = String::new();
    write!(contents, "<h1>Week {}</h1>", bundle.week)?;
    contents.push_str(&nav_fragment(bundles, bundle.week));
    write!(contents, r#"<section class="board">{}</section>"#, board)?;
    contents.push_str("<h2>Matching ceremony</h2>");
    contents.push_str(&table);
    Ok(template::render(&contents))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let source = match (&args.data_dir, &args.base_url) {
        (_, Some(base)) => Source::http(base)?,
        (Some(dir), None) => Source::dir(dir)?,
        (None, None) => Source::dir(".")?,
    };

    let bundles = source.discover().await?;
    if bundles.is_empty() {
        bail!("no week datasets found");
    }
    let mut history = History::new();
    for b in &bundles {
        history.record(b.week as usize, &b.ceremony.pairs);
    }
    let targets: Vec<&WeekBundle> = match args.week {
        Some(week) => {
            let found: Vec<&WeekBundle> = bundles.iter().filter(|b| b.week == week).collect();
            if found.is_empty() {
                bail!(
                    "week {} not found (weeks {} through {} are available)",
                    week,
                    bundles[0].week,
                    bundles[bundles.len() - 1].week
                );
            }
            found
        }
        None => bundles.iter().collect(),
    };

    std::fs::create_dir_all(&args.out_dir)?;
    for b in targets {
        let grid = Grid::build(&b.dataset);
        let scene = HeatmapScene::build(&grid, args.width);
        let board = svg::render_scene(&scene);
        let (name, body) = match args.format {
            Format::Svg => (format!("week_{}.svg", b.week), board),
            Format::Html => (
                format!("week_{}.html", b.week),
                html_page(&bundles, b, &history, &grid, &board)?,
            ),
        };
        std::fs::write(args.out_dir.join(&name), body)?;
        eprintln!("Wrote {}", args.out_dir.join(&name).display());
    }
    Ok(())
}
