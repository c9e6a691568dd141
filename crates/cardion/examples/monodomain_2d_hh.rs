//! Hodgkin-Huxley excitation on a 2D sheet.
//!
//! Runs the default problem (or a JSON configuration) across worker
//! threads, logging progress with `tracing` and optionally writing every
//! snapshot as one JSON line.
//!
//! ```text
//! cargo run --release --example monodomain_2d_hh -- --partitions 4 --output vm.jsonl
//! RUST_LOG=cardion_engine=debug cargo run --example monodomain_2d_hh -- --print-config
//! ```

use cardion::prelude::*;
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Monodomain Hodgkin-Huxley sheet simulation")]
struct Args {
    /// JSON configuration; omitted fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the number of worker partitions.
    #[arg(long)]
    partitions: Option<u32>,

    /// Write snapshots here as JSON lines.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,
}

fn load_config(args: &Args) -> Result<SimulationConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => serde_json::from_reader(File::open(path)?)?,
        None => SimulationConfig::default(),
    };
    if let Some(p) = args.partitions {
        config.mesh.partitions = p;
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    config.validate()?;

    let mesh = config.mesh.build_mesh()?;
    tracing::info!(
        nodes = mesh.node_count(),
        elements = mesh.element_count(),
        partitions = config.mesh.partitions,
        "mesh built"
    );
    let cluster = Cluster::new(mesh, config.mesh.partitions)?;
    let model: Arc<dyn ReactionModel> = Arc::new(HodgkinHuxley1952::new());
    let boundary = BoundaryConditions::zero_flux();

    let outcome = match &args.output {
        None => cluster.simulate(&config, model, &boundary, |_| Box::new(TracingSink))?,
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            let (tx, rx) = crossbeam_channel::unbounded::<Snapshot>();
            thread::scope(|s| -> Result<ClusterOutcome, Box<dyn std::error::Error>> {
                let writer = s.spawn(move || -> std::io::Result<usize> {
                    let mut written = 0;
                    for snapshot in rx {
                        serde_json::to_writer(&mut out, &snapshot)?;
                        out.write_all(b"\n")?;
                        written += 1;
                    }
                    out.flush()?;
                    Ok(written)
                });
                let outcome = cluster.simulate(&config, model, &boundary, |_| {
                    Box::new(ChannelSink::new(tx.clone()))
                });
                drop(tx);
                let written = writer
                    .join()
                    .map_err(|_| std::io::Error::other("snapshot writer panicked"))??;
                tracing::info!(snapshots = written, path = %path.display(), "snapshots written");
                Ok(outcome?)
            })?
        }
    };

    let (min, max) = outcome
        .voltage
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let iterations: u64 = outcome
        .workers
        .iter()
        .map(|w| u64::from(w.last_metrics().cg_iterations))
        .sum();
    tracing::info!(
        time = outcome.time,
        vm_min = min,
        vm_max = max,
        last_step_cg_iterations = iterations,
        "simulation finished"
    );
    Ok(())
}
