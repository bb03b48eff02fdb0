mod loopback;

pub use loopback::LoopbackOutput;

use anyhow::Result;
use image::RgbImage;

/// Consumer of finished frames
pub trait OutputSink {
    /// Hand one frame to the sink; the sink may rescale it
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// (width, height) the sink delivers
    fn resolution(&self) -> (u32, u32);
}
