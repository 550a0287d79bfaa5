//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::SynchronizerConfig;
use serde::Serialize;
use sync_engine::{source_kind, SourceKind};
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    source_count: usize,
    reference_source: String,
    input_capacity: usize,
    output_capacity: usize,
    search_depth: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    source_count: config.sources.len(),
                    reference_source: config.sources[0].clone(),
                    input_capacity: config.input_capacity,
                    output_capacity: config.output_capacity,
                    search_depth: config.search_depth,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &SynchronizerConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.search_depth >= config.input_capacity {
        warnings.push(format!(
            "search_depth ({}) >= input_capacity ({}) - the search can never reach its bound",
            config.search_depth, config.input_capacity
        ));
    }

    if config.min_shift >= config.search_depth {
        warnings.push(format!(
            "min_shift ({}) >= search_depth ({}) - drift is never corrected",
            config.min_shift, config.search_depth
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for source in &config.sources {
        let kind = source_kind(source);
        if kind != SourceKind::Synthetic && !seen.insert(source.as_str()) {
            warnings.push(format!("Source '{}' is listed more than once", source));
        }
        if kind == SourceKind::Unsupported {
            warnings.push(format!("Source '{}' is not a known locator", source));
        }
        if kind.is_video() && !cfg!(feature = "video") {
            warnings.push(format!(
                "Source '{}' needs a build with the `video` feature",
                source
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Sources: {}", summary.source_count);
            println!("  Reference: {}", summary.reference_source);
            println!("  Input capacity: {}", summary.input_capacity);
            println!("  Output capacity: {}", summary.output_capacity);
            println!("  Search depth: {}", summary.search_depth);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(path: PathBuf) -> ValidateArgs {
        ValidateArgs {
            config: path,
            json: true,
        }
    }

    #[test]
    fn test_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.toml");
        std::fs::write(&path, "sources = [\"dir:a\", \"dir:a\"]\n").unwrap();

        let result = validate_config(&args(path));
        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.source_count, 2);
        assert_eq!(summary.reference_source, "dir:a");
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("more than once")));
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "sources": ["synthetic"] }"#).unwrap();

        let result = validate_config(&args(path.clone()));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("at least 2 sources"));
        assert!(run_validate(&args(path)).is_err());

        let missing = validate_config(&args(dir.path().join("nope.toml")));
        assert!(missing.error.unwrap().starts_with("File not found"));
    }

    #[test]
    fn test_locator_warnings() {
        let config = SynchronizerConfig::with_sources(["gopher://x/1", "clip.mov"]);
        let warnings = collect_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("not a known locator")));
        assert_eq!(
            warnings.iter().any(|w| w.contains("`video` feature")),
            !cfg!(feature = "video")
        );
    }
}
