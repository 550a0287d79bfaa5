//! 配置校验模块
//!
//! 校验规则：
//! - 至少两个源，且定位符非空
//! - 输入/输出队列容量 > 0
//! - tracker: low_threshold < high_threshold
//! - tracker: smoothing / accumulate_weight 在 (0, 1] 内
//! - min_shift >= 1, default_fps > 0

use contracts::{ContractError, SynchronizerConfig, TrackerConfig};

/// 校验 SynchronizerConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &SynchronizerConfig) -> Result<(), ContractError> {
    validate_sources(config)?;
    validate_capacities(config)?;
    validate_alignment(config)?;
    validate_tracker(&config.tracker)?;
    Ok(())
}

/// 校验源列表
fn validate_sources(config: &SynchronizerConfig) -> Result<(), ContractError> {
    if config.sources.len() < 2 {
        return Err(ContractError::config_validation(
            "sources",
            format!(
                "at least 2 sources are required, got {}",
                config.sources.len()
            ),
        ));
    }
    for (idx, source) in config.sources.iter().enumerate() {
        if source.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sources[{idx}]"),
                "source locator cannot be empty",
            ));
        }
    }
    Ok(())
}

/// 校验队列容量
fn validate_capacities(config: &SynchronizerConfig) -> Result<(), ContractError> {
    if config.input_capacity == 0 {
        return Err(ContractError::config_validation(
            "input_capacity",
            "input_capacity must be > 0",
        ));
    }
    if config.output_capacity == 0 {
        return Err(ContractError::config_validation(
            "output_capacity",
            "output_capacity must be > 0",
        ));
    }
    Ok(())
}

/// 校验对齐参数
fn validate_alignment(config: &SynchronizerConfig) -> Result<(), ContractError> {
    if config.min_shift == 0 {
        return Err(ContractError::config_validation(
            "min_shift",
            "min_shift must be >= 1",
        ));
    }
    if !(config.default_fps > 0.0) {
        return Err(ContractError::config_validation(
            "default_fps",
            format!("default_fps must be > 0, got {}", config.default_fps),
        ));
    }
    Ok(())
}

/// 校验跟踪器参数
fn validate_tracker(tracker: &TrackerConfig) -> Result<(), ContractError> {
    if tracker.low_threshold >= tracker.high_threshold {
        return Err(ContractError::config_validation(
            "tracker.low_threshold / tracker.high_threshold",
            format!(
                "low_threshold ({}) must be < high_threshold ({})",
                tracker.low_threshold, tracker.high_threshold
            ),
        ));
    }
    if !(tracker.smoothing > 0.0 && tracker.smoothing <= 1.0) {
        return Err(ContractError::config_validation(
            "tracker.smoothing",
            format!("smoothing must be in (0, 1], got {}", tracker.smoothing),
        ));
    }
    if !(tracker.accumulate_weight > 0.0 && tracker.accumulate_weight <= 1.0) {
        return Err(ContractError::config_validation(
            "tracker.accumulate_weight",
            format!(
                "accumulate_weight must be in (0, 1], got {}",
                tracker.accumulate_weight
            ),
        ));
    }
    if tracker.blur_sigma < 0.0 {
        return Err(ContractError::config_validation(
            "tracker.blur_sigma",
            "blur_sigma must be >= 0",
        ));
    }
    Ok(())
}
