use super::OutputSink;
use anyhow::{Context, Result};
use image::{imageops, RgbImage};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use v4l::video::Output;
use v4l::{Device, Format, FourCC};

/// v4l2loopback device fed with packed YUYV frames
pub struct LoopbackOutput {
    // Held open so the negotiated format stays in place while we write.
    _device: Option<Device>,
    file: File,
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl LoopbackOutput {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            path.display(),
            width,
            height
        );

        let device = match Self::configure(path, width, height) {
            Ok(device) => Some(device),
            Err(e) => {
                tracing::warn!("Could not set YUYV output format: {e:#}");
                None
            }
        };

        // v4l2loopback accepts raw frame data written to the device file
        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;

        tracing::info!("v4l2loopback device opened successfully");

        Ok(Self {
            _device: device,
            file,
            width,
            height,
            buffer: Vec::with_capacity((width * height * 2) as usize),
        })
    }

    fn configure(path: &Path, width: u32, height: u32) -> Result<Device> {
        let device = Device::with_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let requested = Format::new(width, height, FourCC::new(b"YUYV"));
        let actual = Output::set_format(&device, &requested).context("VIDIOC_S_FMT failed")?;
        tracing::debug!(
            "Loopback format: {}x{} {}",
            actual.width,
            actual.height,
            actual.fourcc
        );
        Ok(device)
    }
}

/// Pack an RGB frame as YUV 4:2:2 (Y0 U Y1 V)
///
/// Each pair of pixels shares the averaged chroma. An odd trailing column
/// is paired with itself.
fn rgb_to_yuyv_into(rgb_image: &RgbImage, yuyv: &mut Vec<u8>) {
    let (width, height) = rgb_image.dimensions();
    yuyv.clear();
    yuyv.reserve((width.div_ceil(2) * 4 * height) as usize);

    for y in 0..height {
        for x in (0..width).step_by(2) {
            let p1 = rgb_image.get_pixel(x, y);
            let p2 = if x + 1 < width {
                rgb_image.get_pixel(x + 1, y)
            } else {
                p1
            };

            let (y1, u1, v1) = rgb_to_yuv(p1[0], p1[1], p1[2]);
            let (y2, u2, v2) = rgb_to_yuv(p2[0], p2[1], p2[2]);

            let u = ((u1 as u16 + u2 as u16) / 2) as u8;
            let v = ((v1 as u16 + v2 as u16) / 2) as u8;

            yuyv.extend_from_slice(&[y1, u, y2, v]);
        }
    }
}

fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8;
    let u = ((-0.147 * r - 0.289 * g + 0.436 * b) + 128.0).round().clamp(0.0, 255.0) as u8;
    let v = ((0.615 * r - 0.515 * g - 0.100 * b) + 128.0).round().clamp(0.0, 255.0) as u8;

    (y, u, v)
}

impl OutputSink for LoopbackOutput {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            let resized = imageops::resize(
                frame,
                self.width,
                self.height,
                imageops::FilterType::Triangle,
            );
            rgb_to_yuyv_into(&resized, &mut self.buffer);
        } else {
            rgb_to_yuyv_into(frame, &mut self.buffer);
        }

        self.file
            .write_all(&self.buffer)
            .context("Failed to write frame to v4l2loopback device")?;

        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
