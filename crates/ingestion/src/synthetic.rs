//! 合成视频源
//!
//! 暗背景上移动的亮方块，内容完全由帧号决定。`lead` 让内容提前若干帧，
//! 用于模拟源之间的时间漂移。无需任何摄像头即可测试。

use contracts::{ContractError, FrameSource, SourceInfo};
use image::{Rgb, RgbImage};
use tracing::{debug, trace};

const BACKGROUND: Rgb<u8> = Rgb([20, 20, 20]);
const FOREGROUND: Rgb<u8> = Rgb([230, 230, 230]);

/// 故障注入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticFailure {
    /// 打开失败
    Open,
    /// 输出指定帧数后解码失败
    DecodeAfter(u64),
}

/// 合成源配置
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    /// 标称帧率
    pub fps: f64,
    /// 总帧数 (None = 无限)
    pub frames: Option<u64>,
    /// 内容超前帧数
    pub lead: u64,
    /// 方块边长
    pub block: u32,
    pub failure: Option<SyntheticFailure>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 48,
            fps: 25.0,
            frames: None,
            lead: 0,
            block: 12,
            failure: None,
        }
    }
}

/// 合成视频源
#[derive(Debug)]
pub struct SyntheticSource {
    name: String,
    config: SyntheticConfig,
    produced: u64,
    opened: bool,
}

impl SyntheticSource {
    pub fn new(name: impl Into<String>, config: SyntheticConfig) -> Self {
        Self {
            name: name.into(),
            config,
            produced: 0,
            opened: false,
        }
    }

    /// 内容序号为 `t` 的帧
    ///
    /// 方块水平每帧移动 2 像素、垂直 1 像素，在画面内折返。
    pub fn render(config: &SyntheticConfig, t: u64) -> RgbImage {
        let mut image = RgbImage::from_pixel(config.width, config.height, BACKGROUND);
        let block = config.block.min(config.width).min(config.height);
        let x = bounce(t * 2, config.width - block);
        let y = bounce(t, config.height - block);
        for py in y..y + block {
            for px in x..x + block {
                image.put_pixel(px, py, FOREGROUND);
            }
        }
        image
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }
}

/// 三角波：0..=span 之间往返
fn bounce(step: u64, span: u32) -> u32 {
    if span == 0 {
        return 0;
    }
    let span = span as u64;
    let phase = step % (2 * span);
    (if phase <= span { phase } else { 2 * span - phase }) as u32
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<SourceInfo, ContractError> {
        if self.config.failure == Some(SyntheticFailure::Open) {
            return Err(ContractError::source_open(&self.name, "injected open failure"));
        }
        self.opened = true;
        self.produced = 0;
        debug!(source = %self.name, lead = self.config.lead, "synthetic source opened");
        Ok(SourceInfo {
            nominal_fps: Some(self.config.fps),
            width: self.config.width,
            height: self.config.height,
        })
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>, ContractError> {
        if !self.opened {
            return Err(ContractError::decode(&self.name, "source not open"));
        }
        if let Some(SyntheticFailure::DecodeAfter(n)) = self.config.failure {
            if self.produced >= n {
                return Err(ContractError::decode(&self.name, "injected decode failure"));
            }
        }
        if self.config.frames.is_some_and(|limit| self.produced >= limit) {
            return Ok(None);
        }

        let t = self.produced + self.config.lead;
        self.produced += 1;
        trace!(source = %self.name, t, "synthetic frame");
        Ok(Some(Self::render(&self.config, t)))
    }

    fn release(&mut self) {
        self.opened = false;
    }
}
