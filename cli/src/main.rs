//! `reco` CLI: generate toy events and run the reconstruction pipeline.

use anyhow::Result;
use clap::{Parser, Subcommand};
use reco_core::accumulator::HistogramSet;
use reco_core::pipeline::Pipeline;
use reco_core::selection::AnalysisConfig;
use sim::event_gen::EventGenerator;
use sim::scenarios::{Scenario, ScenarioKind};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reco", about = "Two-body decay reconstruction CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a scenario and run the full reconstruction over it.
    Run {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Number of events to generate
        #[arg(long, default_value_t = 1000)]
        events: u64,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// JSON cuts file; missing fields keep their defaults
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the run report to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write all histograms to a JSON file
        #[arg(long)]
        histograms: Option<PathBuf>,
    },
    /// Print the default cuts configuration as JSON.
    DefaultConfig {
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            events,
            seed,
            config,
            output,
            histograms,
        } => {
            run(
                scenario,
                events,
                seed,
                config.as_deref(),
                output.as_deref(),
                histograms.as_deref(),
            )?;
        }
        Commands::DefaultConfig { output } => {
            let text = serde_json::to_string_pretty(&AnalysisConfig::default())?;
            match output {
                Some(path) => std::fs::write(path, text)?,
                None => println!("{text}"),
            }
        }
    }

    Ok(())
}

fn run(
    kind: ScenarioKind,
    n_events: u64,
    seed: u64,
    config_path: Option<&std::path::Path>,
    output_path: Option<&std::path::Path>,
    histograms_path: Option<&std::path::Path>,
) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    let config = match config_path {
        Some(path) => AnalysisConfig::load_or_default(path),
        None => AnalysisConfig::default(),
    };

    let mut generator = EventGenerator::new(scenario.clone());
    let mut pipeline = Pipeline::new(config, HistogramSet::standard());

    println!(
        "Running scenario '{}' (seed={}, events={})...",
        scenario.name, seed, n_events
    );

    let start = std::time::Instant::now();
    for _ in 0..n_events {
        let (event, tracks) = generator.next_event();
        pipeline.process_event(&event, &tracks);
    }
    let report = pipeline.finalize();
    let elapsed = start.elapsed();

    println!(
        "Done: {} events ({} accepted), {} Lambda / {} Phi candidates, elapsed={:.2}s",
        report.events_processed,
        report.events_accepted,
        report.lambda_candidates,
        report.phi_candidates,
        elapsed.as_secs_f64(),
    );
    println!(
        "Mixed pairs: {} Lambda, {} Phi",
        report.mixed_lambda_pairs, report.mixed_phi_pairs
    );

    if let Some(path) = output_path {
        let json = serde_json::json!({
            "scenario": scenario.name,
            "seed": seed,
            "elapsed_s": elapsed.as_secs_f64(),
            "report": report,
        });
        std::fs::write(path, serde_json::to_string_pretty(&json)?)?;
        println!("Report saved to {}", path.display());
    }

    if let Some(path) = histograms_path {
        std::fs::write(path, serde_json::to_string_pretty(pipeline.sink())?)?;
        println!("Histograms saved to {}", path.display());
    }

    Ok(())
}
