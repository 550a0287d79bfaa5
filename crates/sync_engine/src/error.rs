//! Sync engine 错误类型

use contracts::{ContractError, SourceIndex};
use ingestion::IngestionError;
use thiserror::Error;

/// Sync engine 错误
#[derive(Debug, Error)]
pub enum SyncError {
    /// 源数量不足
    #[error("at least two sources are required, got {count}")]
    NotEnoughSources { count: usize },

    /// 缓冲区在读取期间被清空
    #[error("buffer of source {index} emptied during a tick")]
    BufferUnderrun { index: SourceIndex },

    #[error("synchronizer already started")]
    AlreadyStarted,

    #[error("failed to spawn synchronizer thread")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Sync engine Result 类型别名
pub type Result<T> = std::result::Result<T, SyncError>;
