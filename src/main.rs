use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use calratio_perf::compute_family::{evaluate_all, load_inputs, roc_families};
use calratio_perf::config::AnalysisConfig;
use calratio_perf::data::splitter::{FractionFilter, FRACTION_CEILING};
use calratio_perf::report::{metrics_table, roc_family_table};

#[derive(Parser)]
#[command(name = "calratio-perf")]
#[command(about = "Weighted BIB / MJ / HSS classifier performance and ROC families")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error); RUST_LOG overrides
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    /// JSON analysis config; every field is optional
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the sample files (overrides the config)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the testing split of every signal sample
    Evaluate {
        /// Print the flat metrics map as JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Sweep the BIB cut and build one ROC family per signal sample
    RocFamily {
        /// SQLite file to store the families in (overrides the config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Signal efficiency at which background rejection is reported
        #[arg(long, default_value = "0.5")]
        working_point: f64,
    },

    /// Show the moduli chosen for a sampling fraction
    Fraction {
        goal: f64,
    },
}

fn load_config(cli: &Cli) -> Result<AnalysisConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Evaluate { json } => {
            let inputs = load_inputs(&config).context("failed to load samples")?;
            let all = evaluate_all(&config, &inputs)?;
            if json {
                let flat: std::collections::BTreeMap<_, _> = all.iter().map(|(k, m)| (k.clone(), m.to_map())).collect();
                println!("{}", serde_json::to_string_pretty(&flat)?);
            } else {
                for (name, m) in &all {
                    println!("Sample {name}\n{}", metrics_table(m));
                }
            }
        }
        Commands::RocFamily { output, working_point } => {
            if output.is_some() {
                config.output_db = output;
            }
            let inputs = load_inputs(&config).context("failed to load samples")?;
            let families = roc_families(&config, &inputs)?;
            for (name, fam) in &families {
                println!("{}", roc_family_table(name, fam, working_point));
            }
        }
        Commands::Fraction { goal } => {
            let f = FractionFilter::new(goal)?;
            println!(
                "goal {goal:.4}: moduli {:?}, covers {:.4} of [0, {FRACTION_CEILING})",
                f.moduli(),
                f.covered_fraction()
            );
        }
    }

    tracing::info!("done");
    Ok(())
}
