//! `SynchronizerConfig` 文本解析
//!
//! 同一份配置可写成 TOML 或 JSON；缺省字段取 `contracts` 中声明的默认值，
//! 只有 `sources` 必填。取值范围检查在 `validator` 中完成。

use contracts::{ContractError, SynchronizerConfig};

/// Serialization of a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Format for a file extension, case-insensitive
    pub fn from_extension(ext: &str) -> Option<Self> {
        [Self::Toml, Self::Json]
            .into_iter()
            .find(|format| ext.eq_ignore_ascii_case(format.extension()))
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

/// Deserialize `content` as `format`.
///
/// A missing `sources` list is a parse error, not a validation error.
pub fn parse(content: &str, format: ConfigFormat) -> Result<SynchronizerConfig, ContractError> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(format, e)),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_error(format, e)),
    }
}

fn parse_error<E>(format: ConfigFormat, error: E) -> ContractError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ContractError::ConfigParse {
        message: format!("{} parse error: {error}", format.label()),
        source: Some(Box::new(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_fills_defaults() {
        let content = r#"
sources = ["dir:/data/visual", "dir:/data/thermal"]
search_depth = 64

[tracker]
warmup_frames = 8
"#;
        let config = parse(content, ConfigFormat::Toml).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.search_depth, 64);
        assert_eq!(config.input_capacity, 128);
        assert_eq!(config.tracker.warmup_frames, 8);
        assert_eq!(config.tracker.high_threshold, 250);
    }

    #[test]
    fn test_json_nested_tracker() {
        let content = r#"{
            "sources": ["synthetic", "synthetic:lead=3"],
            "distortion_threshold": 20,
            "tracker": { "smoothing": 0.1 }
        }"#;
        let config = parse(content, ConfigFormat::Json).unwrap();
        assert_eq!(config.distortion_threshold, 20);
        assert_eq!(config.tracker.smoothing, 0.1);
    }

    #[test]
    fn test_syntax_error_names_format() {
        let err = parse("invalid toml [[[", ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("TOML parse error"));

        let err = parse("{ sources: ", ConfigFormat::Json).unwrap_err();
        match err {
            ContractError::ConfigParse { message, source } => {
                assert!(message.starts_with("JSON parse error"));
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_sources_is_parse_error() {
        let result = parse("search_depth = 10", ConfigFormat::Toml);
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("Json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
        assert_eq!(ConfigFormat::Json.extension(), "json");
    }
}
