mod v4l_capture;

pub use v4l_capture::WebcamCapture;

use anyhow::Result;
use image::RgbImage;

/// A blocking source of RGB camera frames
///
/// Any error returned by `capture_frame` ends the session.
pub trait CaptureSource {
    /// Block until the next frame is available
    fn capture_frame(&mut self) -> Result<RgbImage>;

    /// Negotiated (width, height) of captured frames
    fn resolution(&self) -> (u32, u32);
}
