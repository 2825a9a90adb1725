//! Probe-gap-model available bandwidth estimation CLI.
//!
//! Estimates the available bandwidth of every link observation in a
//! measurement store and writes JSON and text reports.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use env_logger::Env;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use pgm_abw::config::Config;
use pgm_abw::config_loader::{self, EstimatorCliOverrides};
use pgm_abw::estimation::{
    self,
    report::{generate_json_report, generate_text_report, print_summary},
    EstimationReport, Estimator, ExperimentEstimates, FitMethod, ReportMetadata,
};
use pgm_abw::store::{self, InMemoryStore};
use pgm_abw::synth::{self, SynthSpec};

#[derive(Parser, Debug)]
#[command(name = "pgm-abw")]
#[command(about = "Robust probe-gap-model available bandwidth estimation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration YAML file (built-in experiment table if omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Measurement store: JSON dump, or compressed snapshot (.zst)
    #[arg(short, long, global = true, default_value = "measurements.json")]
    store: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Estimate available bandwidth per link observation
    Estimate {
        /// Only estimate this experiment (default: every stored experiment
        /// with a capacity profile)
        #[arg(short, long)]
        experiment: Option<String>,

        /// Regression method
        #[arg(long, value_enum)]
        method: Option<FitMethod>,

        /// Output directory for reports
        #[arg(short, long, default_value = "abw_output")]
        output: PathBuf,
    },

    /// Show measurement store statistics
    Summary,

    /// Write the measurement store as a compressed snapshot
    Snapshot {
        #[arg(long)]
        out: PathBuf,
    },

    /// Generate a synthetic measurement store for one experiment
    Synth {
        /// Experiment whose capacity profile shapes the data
        #[arg(long)]
        experiment: String,

        /// Experiment id written to the store
        #[arg(long, default_value = "1")]
        id: u64,

        /// Number of link observations
        #[arg(long, default_value = "100")]
        links: usize,

        /// Samples per link observation
        #[arg(long, default_value = "200")]
        samples: usize,

        #[arg(long, default_value = "1")]
        seed: u64,

        /// Available bandwidth to embed (bytes/s)
        #[arg(long)]
        abw: f64,

        /// Output path; a .zst extension writes a snapshot, anything else JSON
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    let mut config = config_loader::load_or_default(cli.config.as_deref())?;

    match &cli.command {
        Commands::Estimate {
            experiment,
            method,
            output,
        } => {
            let overrides = EstimatorCliOverrides {
                workers: cli.threads,
                method: *method,
            };
            config_loader::apply_overrides(&mut config, &overrides)?;
            let store = open_store(&cli.store, &config)?;
            run_estimate(&cli.store, &store, &config, experiment.as_deref(), output)?;
        }
        Commands::Summary => {
            let store = open_store(&cli.store, &config)?;
            print_store_summary(&store, &config);
        }
        Commands::Snapshot { out } => {
            let store = store::open_store(&cli.store)?;
            if !out.extension().map_or(false, |ext| ext == "zst") {
                warn!("Snapshot path {} has no .zst extension", out.display());
            }
            store::write_snapshot(&store.to_dump(), out)?;
        }
        Commands::Synth {
            experiment,
            id,
            links,
            samples,
            seed,
            abw,
            out,
        } => {
            let profile = config
                .profile(experiment)
                .ok_or_else(|| eyre!("No capacity profile for experiment '{}'", experiment))?;

            let mut spec = SynthSpec::new(*id, *links, *samples, *abw);
            spec.selection = config.selection.clone();
            let mut rng = StdRng::seed_from_u64(*seed);
            let dump = synth::generate_dump(experiment, profile, &spec, &mut rng)
                .wrap_err("Failed to generate synthetic measurements")?;

            if out.extension().map_or(false, |ext| ext == "zst") {
                store::write_snapshot(&dump, out)?;
            } else {
                store::write_json_dump(&dump, out)?;
            }
            info!(
                "Generated {} samples for {} ({} link observations)",
                dump.samples.len(),
                experiment,
                links
            );
        }
    }

    Ok(())
}

fn open_store(path: &Path, config: &Config) -> Result<InMemoryStore> {
    Ok(store::open_store(path)?.with_recomputed_candidates(config.selection.recompute_candidates))
}

/// Experiments estimated when none is named: stored and configured ones
fn default_experiments(store: &InMemoryStore, config: &Config) -> Vec<String> {
    store
        .experiments()
        .filter_map(|(name, _)| {
            if config.profile(name).is_some() {
                Some(name.to_string())
            } else {
                warn!("Skipping experiment '{}': no capacity profile configured", name);
                None
            }
        })
        .collect()
}

fn run_estimate(
    store_path: &Path,
    store: &InMemoryStore,
    config: &Config,
    experiment: Option<&str>,
    output: &Path,
) -> Result<()> {
    let estimator = Estimator::from_config(&config.estimator);
    let names = match experiment {
        Some(name) => vec![name.to_string()],
        None => default_experiments(store, config),
    };
    if names.is_empty() {
        return Err(eyre!("No experiment in {} has a capacity profile", store_path.display()));
    }

    let experiments: Vec<ExperimentEstimates> = names
        .iter()
        .map(|name| {
            estimation::estimate_experiment(store, config, &estimator, name)
                .wrap_err_with(|| format!("Failed to estimate experiment '{}'", name))
        })
        .collect::<Result<_>>()?;

    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;

    let report = EstimationReport {
        metadata: ReportMetadata {
            analysis_timestamp: chrono::Utc::now().to_rfc3339(),
            store_path: store_path.display().to_string(),
            method: estimator.method,
            workers: estimator.workers,
        },
        experiments,
    };

    generate_json_report(&report, &output.join("estimates.json"))?;
    generate_text_report(&report, &output.join("report.txt"))?;
    print_summary(&report);

    info!("Reports written to {}", output.display());
    Ok(())
}

fn print_store_summary(store: &InMemoryStore, config: &Config) {
    println!("\n=== MEASUREMENT STORE SUMMARY ===\n");
    println!("Total samples: {}", store.sample_count());

    for (name, id) in store.experiments() {
        let samples = store.samples(id);
        let flagged = samples.iter().filter(|s| s.used_in_regression).count();
        let links = samples
            .iter()
            .map(|s| s.link_state_id)
            .collect::<std::collections::BTreeSet<_>>()
            .len();

        println!("\n{} (id {}):", name, id);
        println!("  Samples: {}", samples.len());
        println!("  Flagged for regression: {}", flagged);
        println!("  Link observations: {}", links);
        match config.profile(name) {
            Some(profile) => println!(
                "  Physical capacity: {:.3} Mbit/s",
                profile.max_capacity / 1e6
            ),
            None => println!("  Physical capacity: not configured"),
        }
    }

    if config.selection.recompute_candidates {
        println!("\nCandidates are recomputed on every query");
    }
    println!();
}
