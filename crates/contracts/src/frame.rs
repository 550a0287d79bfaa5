//! DecodedFrame - Ingestion 输出
//!
//! 单个视频源解码后的帧。

use std::time::Instant;

use image::RgbImage;

/// Index of a source inside the configured source list
pub type SourceIndex = usize;

/// 解码帧
///
/// 由采集线程创建，进入缓冲区后只读。
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// 所属视频源
    pub source: SourceIndex,

    /// 源内严格递增的帧序号
    pub seq: u64,

    /// 到达时间
    pub arrived_at: Instant,

    /// RGB 像素
    pub image: RgbImage,
}

impl DecodedFrame {
    pub fn new(source: SourceIndex, seq: u64, image: RgbImage) -> Self {
        Self {
            source,
            seq,
            arrived_at: Instant::now(),
            image,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
