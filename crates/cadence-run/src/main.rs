//! Cadence Run - evaluates a scenario cycle by cycle
//!
//! A scenario is a JSON document with a session config, named expression
//! graphs and the datasets published at each cycle. Every cycle's results
//! are printed as one JSON line, followed by the newest value of every
//! identifier.

use std::fs;
use std::path::{Path, PathBuf};

use cadence_foundation::WireValue;
use cadence_runtime::{Expressions, ExpressionGraph, GraphSpec, PointMesh, Session, SessionConfig};
use clap::Parser;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cadence-run")]
#[command(about = "Evaluate Cadence expressions over a scenario's cycles")]
struct Cli {
    /// Path to the scenario JSON
    scenario: PathBuf,

    /// Write the history cache here after the last cycle
    #[arg(long)]
    save_cache: Option<PathBuf>,

    /// Start from a previously saved history cache
    #[arg(long)]
    load_cache: Option<PathBuf>,

    /// Only run the first N cycles of the scenario
    #[arg(long)]
    cycles: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    config: SessionConfig,
    expressions: IndexMap<String, GraphSpec>,
    #[serde(default)]
    cycles: Vec<PointMesh>,
}

fn load_scenario(path: &Path) -> Result<(Scenario, Expressions), String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let scenario: Scenario =
        serde_json::from_str(&text).map_err(|e| format!("invalid scenario: {e}"))?;
    let mut expressions = Expressions::new();
    for (name, spec) in &scenario.expressions {
        let graph = ExpressionGraph::from_spec(name.as_str(), spec)
            .map_err(|e| format!("expression '{name}': {e}"))?;
        graph
            .verify()
            .map_err(|e| format!("expression '{name}': {e}"))?;
        expressions.insert(name.as_str().into(), graph);
    }
    Ok((scenario, expressions))
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    info!("Loading scenario from: {}", cli.scenario.display());
    let (scenario, expressions) = match load_scenario(&cli.scenario) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Failed to load scenario: {e}");
            std::process::exit(1);
        }
    };

    let mut session = match Session::new(scenario.config) {
        Ok(s) => s,
        Err(e) => {
            error!("Invalid session config: {e}");
            std::process::exit(1);
        }
    };

    if let Some(path) = &cli.load_cache
        && let Err(e) = session.load_cache(path)
    {
        error!("Failed to load cache from {}: {e}", path.display());
        std::process::exit(1);
    }

    let limit = cli.cycles.unwrap_or(scenario.cycles.len());
    info!(
        expressions = expressions.len(),
        cycles = limit.min(scenario.cycles.len()),
        "scenario loaded"
    );

    let mut failed = 0usize;
    for mesh in scenario.cycles.iter().take(limit) {
        if let Err(e) = mesh.validate() {
            warn!(cycle = mesh.cycle, "skipping cycle: {e}");
            failed += 1;
            continue;
        }
        match session.execute_cycle(mesh, &expressions) {
            Ok(results) => {
                let encoded: IndexMap<&str, WireValue> = results
                    .iter()
                    .map(|(name, value)| (name.as_str(), WireValue::from(value)))
                    .collect();
                println!(
                    "{}",
                    json!({"cycle": mesh.cycle, "time": mesh.time, "results": encoded})
                );
            }
            Err(e) => {
                error!(cycle = mesh.cycle, tier = ?e.tier(), "cycle failed: {e}");
                failed += 1;
            }
        }
    }

    let last: IndexMap<String, serde_json::Value> = session
        .last_values()
        .into_iter()
        .map(|(name, last)| {
            let entry = json!({
                "cycle": last.cycle,
                "time": last.time,
                "value": WireValue::from(&last.value),
            });
            (name.to_string(), entry)
        })
        .collect();
    println!("{}", json!({"last_values": last}));

    if failed > 0 {
        warn!(failed, "some cycles did not complete");
    }

    if let Some(path) = &cli.save_cache
        && let Err(e) = session.save_cache(path)
    {
        error!("Failed to save cache to {}: {e}", path.display());
        std::process::exit(1);
    }
}
