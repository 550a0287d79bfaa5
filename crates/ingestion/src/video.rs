//! Video file / network stream source decoded with FFmpeg (`video` feature).

use contracts::{ContractError, FrameSource, SourceInfo};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::ffi;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame;
use image::RgbImage;
use tracing::{debug, info, warn};

/// Open decoder state, present between `open` and `release`
struct Decoding {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    /// Created on the first frame, once the decoded pixel format is known
    scaler: Option<scaling::Context>,
    packet: ffmpeg::Packet,
    eof_sent: bool,
}

/// Decodes the best video stream of a file or URL into RGB frames.
pub struct VideoSource {
    name: String,
    locator: String,
    decoding: Option<Decoding>,
}

// SAFETY: a source is owned by exactly one capture worker and never shared;
// the raw FFmpeg pointers inside `Decoding` are only touched from that thread.
unsafe impl Send for VideoSource {}

impl VideoSource {
    pub fn new(locator: impl Into<String>) -> Self {
        let locator = locator.into();
        Self {
            name: locator.clone(),
            locator,
            decoding: None,
        }
    }

    fn open_error(&self, message: impl std::fmt::Display) -> ContractError {
        ContractError::source_open(&self.name, message.to_string())
    }

    fn decode_error(&self, message: impl std::fmt::Display) -> ContractError {
        ContractError::decode(&self.name, message.to_string())
    }
}

impl Decoding {
    /// Next decoded frame; `false` once the stream is drained.
    fn receive(&mut self, target: &mut frame::Video) -> Result<bool, ffmpeg::Error> {
        loop {
            match self.decoder.receive_frame(target) {
                Ok(()) => return Ok(true),
                Err(ffmpeg::Error::Eof) => return Ok(false),
                Err(ffmpeg::Error::Other { errno: ffi::EAGAIN }) if self.eof_sent => {
                    return Ok(false)
                }
                Err(ffmpeg::Error::Other { errno: ffi::EAGAIN }) => {}
                Err(e) => return Err(e),
            }

            let mut fed = false;
            while self.packet.read(&mut self.input).is_ok() {
                if self.packet.stream() == self.stream_index {
                    self.decoder.send_packet(&self.packet)?;
                    fed = true;
                    break;
                }
            }
            if !fed {
                self.decoder.send_eof()?;
                self.eof_sent = true;
            }
        }
    }

    fn convert(&mut self, decoded: &frame::Video) -> Result<RgbImage, ffmpeg::Error> {
        let (width, height) = (decoded.width(), decoded.height());
        let stale = self.scaler.as_ref().is_some_and(|s| {
            let input = s.input();
            input.format != decoded.format() || input.width != width || input.height != height
        });
        if stale {
            debug!(width, height, "decoded format changed, rebuilding scaler");
            self.scaler = None;
        }
        let mut scaler = match self.scaler.take() {
            Some(scaler) => scaler,
            None => scaling::Context::get(
                decoded.format(),
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                scaling::Flags::BILINEAR,
            )?,
        };

        let mut rgb = frame::Video::empty();
        scaler.run(decoded, &mut rgb)?;
        self.scaler = Some(scaler);
        Ok(packed_rgb(&rgb))
    }
}

/// Copy an RGB24 frame into a tightly packed image, dropping row padding.
fn packed_rgb(rgb: &frame::Video) -> RgbImage {
    let (width, height) = (rgb.width(), rgb.height());
    let stride = rgb.stride(0);
    let row = width as usize * 3;
    let data = rgb.data(0);

    let mut image = RgbImage::new(width, height);
    for (y, dst) in image.chunks_exact_mut(row.max(1)).enumerate() {
        let start = y * stride;
        dst.copy_from_slice(&data[start..start + row]);
    }
    image
}

impl FrameSource for VideoSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<SourceInfo, ContractError> {
        self.release();
        ffmpeg::init().map_err(|e| self.open_error(e))?;

        let input = ffmpeg::format::input(&self.locator).map_err(|e| self.open_error(e))?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| self.open_error("no video stream"))?;
        let stream_index = stream.index();

        let rate = stream.avg_frame_rate();
        let nominal_fps = (rate.numerator() > 0 && rate.denominator() > 0)
            .then(|| f64::from(rate.numerator()) / f64::from(rate.denominator()));
        if nominal_fps.is_none() {
            warn!(source = %self.name, "stream reports no frame rate");
        }

        let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| self.open_error(e))?;
        let (width, height) = (decoder.width(), decoder.height());

        info!(
            source = %self.name,
            width,
            height,
            nominal_fps = ?nominal_fps,
            "video opened"
        );

        self.decoding = Some(Decoding {
            input,
            decoder,
            stream_index,
            scaler: None,
            packet: ffmpeg::Packet::empty(),
            eof_sent: false,
        });
        Ok(SourceInfo {
            nominal_fps,
            width,
            height,
        })
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>, ContractError> {
        let Some(decoding) = self.decoding.as_mut() else {
            return Err(self.decode_error("source is not open"));
        };

        let mut decoded = frame::Video::empty();
        let result = match decoding.receive(&mut decoded) {
            Ok(true) => decoding.convert(&decoded).map(Some),
            Ok(false) => Ok(None),
            Err(e) => Err(e),
        };
        result.map_err(|e| self.decode_error(e))
    }

    fn release(&mut self) {
        if self.decoding.take().is_some() {
            debug!(source = %self.name, "video released");
        }
    }
}
