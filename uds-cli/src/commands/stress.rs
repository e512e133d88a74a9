//! Stress command: concurrent acquire/release against in-memory grids

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use tokio::task::JoinSet;
use tracing::{debug, info};
use uds_core::{IndexSessionConfig, IndexSessionManager, MemoryGridFactory};

/// Stress arguments
#[derive(Args, Debug)]
pub struct StressArgs {
    /// Number of sessions to open
    #[arg(long, default_value_t = 4)]
    pub sessions: u32,

    /// Number of concurrent worker tasks
    #[arg(long, default_value_t = 8)]
    pub workers: u32,

    /// Operations per worker
    #[arg(long, default_value_t = 1000)]
    pub iterations: u32,

    /// Checkpoint frequency to set on every operation (varies if omitted)
    #[arg(long)]
    pub frequency: Option<u32>,
}

/// Run stress command
pub async fn run(args: StressArgs, config: IndexSessionConfig) -> Result<()> {
    anyhow::ensure!(args.sessions > 0, "--sessions must be at least 1");

    let factory = Arc::new(MemoryGridFactory::new());
    let manager = Arc::new(IndexSessionManager::new(factory.clone(), config));

    let mut ids = Vec::with_capacity(args.sessions as usize);
    for n in 0..args.sessions {
        ids.push(manager.open_index_session(&format!("grid-{n}")).await?);
    }
    let ids = Arc::new(ids);
    info!(
        sessions = ids.len(),
        workers = args.workers,
        iterations = args.iterations,
        "Starting stress run"
    );

    let started = Instant::now();
    let mut workers = JoinSet::new();
    for worker in 0..args.workers as usize {
        let manager = Arc::clone(&manager);
        let ids = Arc::clone(&ids);
        let iterations = args.iterations;
        let fixed_frequency = args.frequency;

        workers.spawn(async move {
            let mut failures = 0u64;
            for round in 0..iterations {
                let id = ids[(worker + round as usize) % ids.len()];
                let frequency = fixed_frequency.unwrap_or(round % 64);
                if let Err(error) = manager.set_checkpoint_frequency(id, frequency).await {
                    debug!(session_id = id, %error, "Operation failed");
                    failures += 1;
                }
            }
            failures
        });
    }

    let mut failures = 0u64;
    while let Some(result) = workers.join_next().await {
        failures += result?;
    }
    let elapsed = started.elapsed();

    println!("Sessions after run:");
    for session in manager.list_sessions().await {
        println!(
            "  {} - state: {}, references: {}",
            session.id, session.state, session.ref_count
        );
    }

    manager.shutdown().await?;

    let probes = factory.probes();
    let saves: usize = probes.iter().map(|(_, probe)| probe.save_count()).sum();
    let updates: usize = probes
        .iter()
        .map(|(_, probe)| probe.frequency_updates())
        .sum();
    let operations = u64::from(args.workers) * u64::from(args.iterations);

    println!();
    println!("Operations: {operations} ({failures} failed) in {elapsed:.2?}");
    println!("Checkpoint updates applied: {updates}");
    println!("Grids saved and closed: {saves}/{}", probes.len());
    Ok(())
}
