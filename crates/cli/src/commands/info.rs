//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::SynchronizerConfig;
use serde::Serialize;
use sync_engine::source_kind;
use tracing::info;

use crate::cli::InfoArgs;

/// Effective configuration plus how each source locator is read
#[derive(Serialize)]
struct ConfigInfo<'a> {
    sources: Vec<SourceInfo<'a>>,
    config: &'a SynchronizerConfig,
}

#[derive(Serialize)]
struct SourceInfo<'a> {
    index: usize,
    locator: &'a str,
    kind: &'static str,
    reference: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&build_config_info(&config))
            .context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config)?;
    }

    Ok(())
}

fn build_config_info(config: &SynchronizerConfig) -> ConfigInfo<'_> {
    let sources = config
        .sources
        .iter()
        .enumerate()
        .map(|(index, locator)| SourceInfo {
            index,
            locator,
            kind: source_kind(locator).label(),
            reference: index == 0,
        })
        .collect();
    ConfigInfo { sources, config }
}

fn print_config_info(config: &SynchronizerConfig) -> Result<()> {
    println!("\n=== Sources ===\n");
    for source in build_config_info(config).sources {
        let marker = if source.reference { " *" } else { "" };
        println!(
            "  [{}] {} ({}){}",
            source.index, source.locator, source.kind, marker
        );
    }
    println!("\n  * alignment reference");

    println!("\n=== Effective Configuration ===\n");
    let toml = config_loader::ConfigLoader::to_toml(config)
        .context("Failed to render configuration")?;
    println!("{}", toml);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kinds() {
        let config = SynchronizerConfig::with_sources([
            "synthetic:lead=2",
            "/data/cam1",
            "dir:x",
            "clips/b.mp4",
            "rtsp://camera/1",
        ]);
        let info = build_config_info(&config);
        let kinds: Vec<_> = info.sources.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                "synthetic",
                "image-sequence",
                "image-sequence",
                "video-file",
                "network-stream"
            ]
        );
        assert!(info.sources[0].reference);
        assert!(!info.sources[4].reference);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["config"]["search_depth"], 127);
        assert_eq!(json["sources"][1]["locator"], "/data/cam1");
    }

    #[test]
    fn test_missing_file() {
        let args = InfoArgs {
            config: "/nonexistent/framesync.toml".into(),
            json: false,
        };
        assert!(run_info(&args).is_err());
    }
}
