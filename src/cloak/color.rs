use super::error::{CloakError, Result};
use super::types::{Mask, MASK_CLEAR, MASK_SET};
use image::{Luma, RgbImage};
use std::fmt;
use std::str::FromStr;

/// Inclusive lower/upper bounds in 8-bit HSV space
///
/// Hue runs 0..=179 (degrees halved), saturation and value 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| self.lower[c] <= hsv[c] && hsv[c] <= self.upper[c])
    }
}

// Red sits on both ends of the hue circle, so it needs two ranges.
const RED_RANGES: [HsvRange; 2] = [
    HsvRange::new([0, 120, 70], [10, 255, 255]),
    HsvRange::new([170, 120, 70], [180, 255, 255]),
];
const BLUE_RANGES: [HsvRange; 1] = [HsvRange::new([94, 80, 2], [126, 255, 255])];
const GREEN_RANGES: [HsvRange; 1] = [HsvRange::new([36, 50, 70], [89, 255, 255])];

/// The colour treated as transparent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloakColor {
    #[default]
    Red,
    Blue,
    Green,
}

impl CloakColor {
    pub const ALL: [CloakColor; 3] = [CloakColor::Red, CloakColor::Blue, CloakColor::Green];

    /// HSV ranges whose union makes up this colour
    pub fn ranges(self) -> &'static [HsvRange] {
        match self {
            CloakColor::Red => &RED_RANGES,
            CloakColor::Blue => &BLUE_RANGES,
            CloakColor::Green => &GREEN_RANGES,
        }
    }

    pub fn matches(self, hsv: [u8; 3]) -> bool {
        self.ranges().iter().any(|range| range.contains(hsv))
    }

    pub fn name(self) -> &'static str {
        match self {
            CloakColor::Red => "red",
            CloakColor::Blue => "blue",
            CloakColor::Green => "green",
        }
    }
}

impl fmt::Display for CloakColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CloakColor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        CloakColor::ALL
            .into_iter()
            .find(|color| color.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown cloak color '{s}' (expected red, blue or green)"))
    }
}

/// Convert an RGB pixel to 8-bit HSV
///
/// Matches the usual 8-bit convention: hue is halved so it fits a byte
/// (0..=179), saturation and value are scaled to 0..=255.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v == 0 { 0 } else { (255 * diff + v / 2) / v };

    let degrees = if diff == 0 {
        0.0
    } else if v == r {
        60.0 * (g - b) as f32 / diff as f32
    } else if v == g {
        120.0 + 60.0 * (b - r) as f32 / diff as f32
    } else {
        240.0 + 60.0 * (r - g) as f32 / diff as f32
    };

    let mut h = (degrees / 2.0).round() as i32;
    if h < 0 {
        h += 180;
    }
    if h >= 180 {
        h -= 180;
    }

    [h as u8, s as u8, v as u8]
}

/// Classify every pixel of an RGB frame against the cloak colour
///
/// The frame is converted to HSV here; callers pass raw RGB frames.
pub fn classify(frame: &RgbImage, color: CloakColor) -> Result<Mask> {
    let _span = tracing::debug_span!("classify", color = color.name()).entered();

    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(CloakError::EmptyFrame { width, height });
    }

    let mut mask = Mask::new(width, height);
    for (src, dst) in frame.pixels().zip(mask.pixels_mut()) {
        let hsv = rgb_to_hsv(src[0], src[1], src[2]);
        *dst = if color.matches(hsv) {
            Luma([MASK_SET])
        } else {
            Luma([MASK_CLEAR])
        };
    }

    Ok(mask)
}
