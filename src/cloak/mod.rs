mod background;
mod color;
mod composite;
pub mod error;
mod pipeline;
mod refine;
pub mod types;

pub use background::BackgroundStore;
pub use color::{classify, rgb_to_hsv, CloakColor, HsvRange};
pub use composite::{composite, EdgeMode};
pub use error::CloakError;
pub use pipeline::{CloakPipeline, StageTimings};
pub use refine::{refine, remove_small_regions, RefineConfig};
pub use types::{Mask, MASK_CLEAR, MASK_SET};

use image::{Rgb, RgbImage};

/// Render a mask as a black and white RGB image for preview
pub fn mask_to_rgb(mask: &Mask) -> RgbImage {
    RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
        let value = mask.get_pixel(x, y)[0];
        Rgb([value, value, value])
    })
}
