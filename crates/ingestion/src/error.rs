//! Ingestion 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 定位符无法识别
    #[error("unsupported source locator: {locator}")]
    UnsupportedLocator {
        /// 原始定位符
        locator: String,
    },

    /// 视频文件 / 网络流需要 `video` feature
    #[error("locator '{locator}' needs FFmpeg decoding; rebuild with the `video` feature")]
    VideoDisabled { locator: String },

    /// 定位符参数非法
    #[error("invalid parameter '{key}' in locator '{locator}': {message}")]
    InvalidParameter {
        locator: String,
        key: String,
        message: String,
    },

    /// 采集线程创建失败
    #[error("failed to spawn capture thread for {source_name}")]
    Spawn {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    /// 采集已启动
    #[error("capture already started")]
    AlreadyStarted,

    /// 视频源错误
    #[error(transparent)]
    Source(#[from] ContractError),
}

impl IngestionError {
    pub(crate) fn invalid_parameter(
        locator: &str,
        key: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            locator: locator.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
