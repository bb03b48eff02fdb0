use super::color::{classify, CloakColor};
use super::composite::{composite, EdgeMode};
use super::error::{CloakError, Result};
use super::refine::{refine, RefineConfig};
use super::types::Mask;
use image::RgbImage;
use std::time::{Duration, Instant};

/// Accumulated per-stage processing time
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimings {
    /// Masks computed, with or without compositing
    pub masks: u64,
    /// Frames composited
    pub frames: u64,
    pub classify: Duration,
    pub refine: Duration,
    pub composite: Duration,
}

impl StageTimings {
    /// Average milliseconds for (classify, refine, composite)
    ///
    /// Classify and refine are averaged over masks, composite over frames.
    pub fn average_ms(&self) -> (f64, f64, f64) {
        let average = |d: Duration, n: u64| {
            if n == 0 {
                0.0
            } else {
                d.as_secs_f64() * 1000.0 / n as f64
            }
        };
        (
            average(self.classify, self.masks),
            average(self.refine, self.masks),
            average(self.composite, self.frames),
        )
    }
}

/// Classify, refine and composite one frame at a time
///
/// The pipeline holds only its tuning parameters. The cloak colour and the
/// background plate are passed in on every call.
#[derive(Debug, Default)]
pub struct CloakPipeline {
    refine: RefineConfig,
    edge: EdgeMode,
    timings: StageTimings,
}

impl CloakPipeline {
    pub fn new(refine: RefineConfig, edge: EdgeMode) -> Self {
        Self {
            refine,
            edge,
            timings: StageTimings::default(),
        }
    }

    pub fn timings(&self) -> &StageTimings {
        &self.timings
    }

    /// Cleaned cloak mask for `frame`
    pub fn mask_for(&mut self, frame: &RgbImage, color: CloakColor) -> Result<Mask> {
        let start = Instant::now();
        let raw = classify(frame, color)?;
        self.timings.classify += start.elapsed();

        let start = Instant::now();
        let cleaned = refine(&raw, &self.refine);
        self.timings.refine += start.elapsed();
        self.timings.masks += 1;

        Ok(cleaned)
    }

    /// Replace the cloak-coloured regions of `frame` with the background plate
    ///
    /// Fails with `BackgroundNotCaptured` when no plate is given and with
    /// `DimensionMismatch` when the plate does not match the frame size.
    pub fn process_frame(
        &mut self,
        frame: &RgbImage,
        color: CloakColor,
        plate: Option<&RgbImage>,
    ) -> Result<RgbImage> {
        let _span = tracing::debug_span!("process_frame").entered();

        let plate = plate.ok_or(CloakError::BackgroundNotCaptured)?;
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(CloakError::EmptyFrame { width, height });
        }
        CloakError::check_dimensions("background plate", frame.dimensions(), plate.dimensions())?;

        let mask = self.mask_for(frame, color)?;

        let start = Instant::now();
        let output = composite(frame, &mask, plate, self.edge)?;
        self.timings.composite += start.elapsed();
        self.timings.frames += 1;

        Ok(output)
    }
}
