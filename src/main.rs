use anyhow::{Context, Result};
use clap::Parser;
use polars::prelude::*;
use pyramid_match::{MatchConfig, PyramidMatcher};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pyramid-match")]
#[command(about = "Match a candidate administrative pyramid onto a reference pyramid")]
struct Args {
    /// Reference pyramid CSV
    reference: PathBuf,

    /// Candidate pyramid CSV
    candidate: PathBuf,

    /// JSON file with matching settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Matcher strategy (fuzzy, exact)
    #[arg(long)]
    matcher: Option<String>,

    /// Fuzzy scorer (or set PYRAMID_MATCH_SCORER env var)
    #[arg(long)]
    scorer: Option<String>,

    /// Minimum accepted score in [0, 100] (or set PYRAMID_MATCH_THRESHOLD env var)
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Suffix of the key column of each level
    #[arg(long)]
    suffix: Option<String>,

    /// Comma separated level numbers to match, e.g. 2,3
    #[arg(long, value_delimiter = ',')]
    levels: Option<Vec<u32>>,

    /// Score candidate groups in parallel
    #[arg(long)]
    parallel: bool,

    /// Abort if matching takes longer than this many milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!("Matching settings: {:?}", config);

    let reference = read_csv(&args.reference)?;
    let candidate = read_csv(&args.candidate)?;

    let matcher = PyramidMatcher::from_config(&config)?;
    let outputs = matcher.run_matching(&reference, &candidate)?;

    println!("\n=== Matched data ===");
    println!("{}", outputs.matched_data);
    println!("\n=== Matched data (simplified) ===");
    println!("{}", outputs.matched_data_simplified);
    println!("\n=== Reference not matched ===");
    println!("{}", outputs.reference_not_matched);
    println!("\n=== Candidate not matched ===");
    println!("{}", outputs.candidate_not_matched);
    println!("\n=== Summary ===");
    println!("{}", outputs.summary);

    Ok(())
}

/// Config file, then environment, then command line flags.
fn load_config(args: &Args) -> Result<MatchConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            MatchConfig::from_json_str(&json)?
        }
        None => MatchConfig::default(),
    };

    if let Ok(value) = std::env::var("PYRAMID_MATCH_THRESHOLD") {
        match value.parse() {
            Ok(threshold) => config.threshold = threshold,
            Err(_) => warn!("Ignoring PYRAMID_MATCH_THRESHOLD={}: not a number", value),
        }
    }
    if let Ok(scorer) = std::env::var("PYRAMID_MATCH_SCORER") {
        config.scorer = scorer;
    }

    if let Some(matcher) = &args.matcher {
        config.matcher = matcher.clone();
    }
    if let Some(scorer) = &args.scorer {
        config.scorer = scorer.clone();
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(suffix) = &args.suffix {
        config.matching_col_suffix = suffix.clone();
    }
    if let Some(levels) = &args.levels {
        config.levels_to_match = Some(levels.clone());
    }
    if args.parallel {
        config.parallel = true;
    }
    if let Some(ms) = args.deadline_ms {
        config.deadline_ms = Some(ms);
    }

    config.validate()?;
    Ok(config)
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    let frame = LazyCsvReader::new(path)
        .finish()
        .and_then(|lf| lf.collect())
        .with_context(|| format!("reading {}", path.display()))?;
    info!("Loaded {} rows from {}", frame.height(), path.display());
    Ok(frame)
}
