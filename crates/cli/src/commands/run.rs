//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::SynchronizerConfig;
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{RunConfig, Runner};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let sync = load_sync_config(args)?;

    info!(
        sources = ?sync.sources,
        input_capacity = sync.input_capacity,
        output_capacity = sync.output_capacity,
        distortion_threshold = sync.distortion_threshold,
        search_depth = sync.search_depth,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&sync);
        return Ok(());
    }

    let run_config = RunConfig {
        sync,
        max_sets: (args.max_sets > 0).then_some(args.max_sets),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        delays: args.delays.clone(),
        fragments_dir: args.fragments_dir.clone(),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    };

    info!("Starting synchronizer...");
    let stats = Runner::new(run_config)
        .run(shutdown_signal())
        .await
        .context("Synchronizer run failed")?;
    stats.print_summary();

    if let Some(failure) = stats.failure {
        return Err(CliError::sync_failure(failure).into());
    }

    info!("framesync finished");
    Ok(())
}

/// Config file (or defaults), with `--source` replacing the configured sources
fn load_sync_config(args: &RunArgs) -> Result<SynchronizerConfig> {
    let mut config = match args.config {
        Some(ref path) => {
            info!(config = %path.display(), "Loading configuration");
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => SynchronizerConfig::default(),
    };

    if !args.sources.is_empty() {
        info!(sources = ?args.sources, "Overriding sources from CLI");
        config.sources = args.sources.clone();
    }
    if config.sources.is_empty() {
        return Err(CliError::NoSources.into());
    }

    config_loader::ConfigLoader::validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &SynchronizerConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Sources ({}):", config.sources.len());
    for (index, source) in config.sources.iter().enumerate() {
        let role = if index == 0 { " (reference)" } else { "" };
        println!("  [{index}] {source}{role}");
    }
    println!("\nAlignment:");
    println!("  Distortion threshold: {}", config.distortion_threshold);
    println!("  Search depth: {}", config.search_depth);
    println!("  Min shift: {}", config.min_shift);
    println!("\nTracker:");
    println!(
        "  Stability: low={} high={}",
        config.tracker.low_threshold, config.tracker.high_threshold
    );
    println!("  Warm-up frames: {}", config.tracker.warmup_frames);
    println!();
}
