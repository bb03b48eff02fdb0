use super::error::{CloakError, Result};
use super::types::{Mask, MASK_CLEAR};
use image::{Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;

/// How mask edges are treated when compositing
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EdgeMode {
    /// Each pixel comes entirely from the plate or entirely from the frame
    #[default]
    Hard,
    /// The mask is blurred and used as an alpha channel
    Soft { sigma: f32 },
}

impl EdgeMode {
    /// Soft edges with the given blur sigma, or hard edges if `sigma` is not
    /// a positive finite number
    pub fn soft(sigma: f32) -> Self {
        if sigma.is_finite() && sigma > 0.0 {
            EdgeMode::Soft { sigma }
        } else {
            EdgeMode::Hard
        }
    }
}

/// Replace masked pixels of `frame` with the matching pixels of `plate`
pub fn composite(frame: &RgbImage, mask: &Mask, plate: &RgbImage, edge: EdgeMode) -> Result<RgbImage> {
    let _span = tracing::debug_span!("composite").entered();

    let dims = frame.dimensions();
    CloakError::check_dimensions("background plate", dims, plate.dimensions())?;
    CloakError::check_dimensions("mask", dims, mask.dimensions())?;

    let output = match edge {
        EdgeMode::Hard => select(frame, mask, plate),
        EdgeMode::Soft { sigma } if sigma.is_finite() && sigma > 0.0 => {
            let alpha = gaussian_blur_f32(mask, sigma);
            blend(frame, &alpha, plate)
        }
        EdgeMode::Soft { .. } => select(frame, mask, plate),
    };

    Ok(output)
}

fn select(frame: &RgbImage, mask: &Mask, plate: &RgbImage) -> RgbImage {
    let mut output = frame.clone();
    for ((dst, m), bg) in output.pixels_mut().zip(mask.pixels()).zip(plate.pixels()) {
        if m[0] != MASK_CLEAR {
            *dst = *bg;
        }
    }
    output
}

fn blend(frame: &RgbImage, alpha: &Mask, plate: &RgbImage) -> RgbImage {
    let mut output = frame.clone();
    for ((dst, a), bg) in output.pixels_mut().zip(alpha.pixels()).zip(plate.pixels()) {
        let a = a[0] as u32;
        let fg = *dst;
        *dst = Rgb(std::array::from_fn(|c| {
            ((bg[c] as u32 * a + fg[c] as u32 * (255 - a) + 127) / 255) as u8
        }));
    }
    output
}
