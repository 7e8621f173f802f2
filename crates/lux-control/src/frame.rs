// SPDX-License-Identifier: Apache-2.0
//! Framebuffer encoding and stream pacing.

use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder};
use lux_proto::RpcError;
use lux_scene::FrameBuffer;
use serde::{Deserialize, Serialize};

/// A rendered frame ready to embed in a JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedFrame {
    /// Image container format.
    pub format: &'static str,
    /// Base64 of the encoded image.
    pub data: String,
}

/// Encode the framebuffer contents as base64 PNG.
pub fn encode_frame(fb: &FrameBuffer) -> Result<EncodedFrame, RpcError> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(fb.rgba(), fb.width(), fb.height(), ExtendedColorType::Rgba8)
        .map_err(|err| RpcError::result_encoding(err.to_string()))?;
    Ok(EncodedFrame {
        format: "png",
        data: STANDARD.encode(png),
    })
}

/// Paces the frame stream at a target FPS.
///
/// Time left over past each period carries into the next decision (capped
/// at one period), so an irregular render loop still averages the target
/// rate instead of drifting below it.
#[derive(Debug, Default)]
pub struct FramePacer {
    last: Option<Instant>,
    leftover: Duration,
}

impl FramePacer {
    /// Whether a frame should go out now at the given target rate.
    pub fn due(&mut self, now: Instant, fps: f32) -> bool {
        if fps <= 0.0 {
            return false;
        }
        let period = Duration::from_secs_f32(1.0 / fps);
        let Some(last) = self.last else {
            self.last = Some(now);
            return true;
        };
        let elapsed = now.saturating_duration_since(last) + self.leftover;
        if elapsed < period {
            return false;
        }
        self.leftover = (elapsed - period).min(period);
        self.last = Some(now);
        true
    }
}
