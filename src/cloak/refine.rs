use super::types::{Mask, MASK_CLEAR, MASK_SET};
use image::Luma;
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use imageproc::region_labelling::{connected_components, Connectivity};

/// Parameters for mask cleanup
///
/// Radii are in pixels under the chessboard norm, so a radius of `r` acts
/// like a `(2r + 1) x (2r + 1)` square kernel. A radius of zero skips the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefineConfig {
    /// Opening radius, removes isolated speckles before closing
    pub open_radius: u8,
    /// Closing radius, fills holes and gaps inside cloak regions
    pub close_radius: u8,
    /// Extra dilation after closing. Grows the mask on every pass, so
    /// refinement is no longer idempotent when this is non-zero.
    pub dilate_radius: u8,
    /// Connected regions smaller than this many pixels are dropped
    pub min_area: u32,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            open_radius: 0,
            close_radius: 2,
            dilate_radius: 0,
            min_area: 1500,
        }
    }
}

/// Smooth the raw mask, then drop small connected regions
///
/// Smoothing runs first so that small holes do not split one cloak into
/// fragments that would each fall under the area threshold.
pub fn refine(mask: &Mask, config: &RefineConfig) -> Mask {
    let _span = tracing::debug_span!("refine").entered();

    let mut smoothed = mask.clone();
    if config.open_radius > 0 {
        smoothed = morphology::open(&smoothed, Norm::LInf, config.open_radius);
    }
    if config.close_radius > 0 {
        smoothed = morphology::close(&smoothed, Norm::LInf, config.close_radius);
    }
    if config.dilate_radius > 0 {
        smoothed = morphology::dilate(&smoothed, Norm::LInf, config.dilate_radius);
    }

    remove_small_regions(&smoothed, config.min_area)
}

/// Clear every 8-connected region whose area is below `min_area`
pub fn remove_small_regions(mask: &Mask, min_area: u32) -> Mask {
    let labels = connected_components(mask, Connectivity::Eight, Luma([MASK_CLEAR]));

    let region_count = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    let mut areas = vec![0u32; region_count + 1];
    for label in labels.pixels() {
        areas[label[0] as usize] += 1;
    }

    let kept = areas
        .iter()
        .enumerate()
        .skip(1)
        .filter(|&(_, &area)| area >= min_area)
        .count();
    tracing::trace!(regions = region_count, kept, "area filter");

    let mut cleaned = Mask::new(mask.width(), mask.height());
    for (label, dst) in labels.pixels().zip(cleaned.pixels_mut()) {
        let label = label[0] as usize;
        if label != 0 && areas[label] >= min_area {
            *dst = Luma([MASK_SET]);
        }
    }

    cleaned
}
