use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use phenomatch_core::{
    analyze_morphology, Catalog, Embedding, Landmark, MatchQuery, MatchResult, ProfileMap, Sex,
};
use phenomatch_engine::{Config, PhenotypeMatcher};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "phenomatch", about = "Facial morphology analysis and phenotype matching")]
struct Cli {
    /// TOML config file (PHENOMATCH_* environment variables still apply)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a 468-point landmark set
    Analyze {
        /// JSON array of {x, y, z} points
        landmarks: PathBuf,
    },
    /// Rank the phenotype catalog against an embedding
    Match {
        /// JSON array of 128 floats
        #[arg(short, long)]
        embedding: PathBuf,
        /// m or f
        #[arg(short, long)]
        sex: Sex,
        /// Number of matches to print (default from config)
        #[arg(short = 'n', long)]
        top_n: Option<usize>,
        /// Landmarks of the same face, for morphology blending
        #[arg(short, long)]
        landmarks: Option<PathBuf>,
        /// Load and match on the calling thread
        #[arg(long)]
        no_offload: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build a reference profile file from landmark sets
    Profile {
        /// JSON object mapping "{name}_{m|f}" to a landmark array
        input: PathBuf,
        /// Profile file to write
        output: PathBuf,
    },
    /// Show catalog statistics
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Commands::Analyze { landmarks } => {
            let points: Vec<Landmark> = read_json(&landmarks)?;
            let Some(result) = analyze_morphology(&points) else {
                bail!("{}: expected 468 landmarks, got {}", landmarks.display(), points.len());
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Match {
            embedding,
            sex,
            top_n,
            landmarks,
            no_offload,
            json,
        } => {
            let embedding: Embedding = read_json(&embedding)?;
            let morphology = match landmarks {
                Some(path) => {
                    let points: Vec<Landmark> = read_json(&path)?;
                    let result = analyze_morphology(&points);
                    if result.is_none() {
                        tracing::warn!(
                            count = points.len(),
                            "too few landmarks; matching by embedding only"
                        );
                    }
                    result
                }
                None => None,
            };

            let mut options = config.matcher_options();
            options.offload &= !no_offload;
            let matcher = PhenotypeMatcher::new(options);
            let count = matcher
                .load(config.data_source())
                .await
                .with_context(|| format!("failed to load {}", config.dataset.display()))?;
            tracing::info!(count, state = ?matcher.state(), "catalog ready");

            let query = MatchQuery::new(embedding, sex)
                .top_n(top_n.unwrap_or(config.top_n))
                .morphology(morphology);
            let results = matcher.match_phenotypes(query).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for (rank, result) in results.iter().enumerate() {
                    println!("{}", format_match(rank + 1, result));
                }
            }
        }
        Commands::Profile { input, output } => {
            let sets: BTreeMap<String, Vec<Landmark>> = read_json(&input)?;
            let requested = sets.len();
            let profiles = ProfileMap::from_landmark_sets(sets);
            let text = serde_json::to_string_pretty(&profiles.to_json())?;
            std::fs::write(&output, text)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "Wrote {} of {} profiles to {}",
                profiles.len(),
                requested,
                output.display()
            );
        }
        Commands::Info => {
            let catalog = Catalog::load(&config.data_source())
                .with_context(|| format!("failed to load {}", config.dataset.display()))?;
            let summary = catalog.summary();
            println!("dataset:   {}", config.dataset.display());
            println!("profiles:  {}", config.profiles_path().display());
            println!("groups:    {}", summary.groups);
            println!("basic:     {}", summary.basic);
            println!("subtypes:  {}", summary.subtypes);
            println!("profiled:  {}", summary.profiles);
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn format_match(rank: usize, result: &MatchResult) -> String {
    let group = if result.is_basic {
        "basic".to_string()
    } else {
        result.group_name.clone()
    };
    format!(
        "{rank:>3}. {:>6.2}  {:<24} {:<20} {}",
        result.score,
        result.name,
        group,
        result.reference_url()
    )
}
