use super::error::{CloakError, Result};
use image::{imageops, RgbImage};
use std::path::Path;

/// Holds the background plate substituted into cloaked regions
#[derive(Debug, Default)]
pub struct BackgroundStore {
    plate: Option<RgbImage>,
    is_static: bool,
}

impl BackgroundStore {
    /// An empty store, waiting for a live capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a static plate from disk, resized once to the capture resolution
    pub fn load<P: AsRef<Path>>(path: P, width: u32, height: u32) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading static background from {}", path.display());

        let image = image::open(path)
            .map_err(|source| CloakError::BackgroundLoad {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();

        let plate = if image.dimensions() != (width, height) {
            tracing::info!(
                "Resizing background from {}x{} to {}x{}",
                image.width(),
                image.height(),
                width,
                height
            );
            imageops::resize(&image, width, height, imageops::FilterType::Lanczos3)
        } else {
            image
        };

        Ok(Self {
            plate: Some(plate),
            is_static: true,
        })
    }

    /// Replace the plate with a freshly captured frame
    pub fn capture(&mut self, frame: RgbImage) {
        tracing::info!("Background captured ({}x{})", frame.width(), frame.height());
        self.plate = Some(frame);
        self.is_static = false;
    }

    pub fn plate(&self) -> Option<&RgbImage> {
        self.plate.as_ref()
    }

    pub fn is_captured(&self) -> bool {
        self.plate.is_some()
    }

    /// Whether the plate came from an image file rather than the camera
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Mirror a camera-captured plate to follow a change in frame mirroring
    ///
    /// A static plate is left alone since it never went through the mirror.
    pub fn flip_live_plate(&mut self) {
        if self.is_static {
            return;
        }
        if let Some(plate) = self.plate.as_mut() {
            imageops::flip_horizontal_in_place(plate);
        }
    }
}
