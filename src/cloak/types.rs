use image::GrayImage;

/// Binary cloak mask: `MASK_SET` where the cloak colour was found, `MASK_CLEAR` elsewhere
/// Dimensions match the frame it was computed from
pub type Mask = GrayImage;

pub const MASK_SET: u8 = 255;
pub const MASK_CLEAR: u8 = 0;

#[cfg(test)]
pub(crate) fn set_pixel_count(mask: &Mask) -> usize {
    mask.pixels().filter(|p| p[0] != MASK_CLEAR).count()
}
