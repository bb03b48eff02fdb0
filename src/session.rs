use crate::capture::CaptureSource;
use crate::cloak::{mask_to_rgb, BackgroundStore, CloakError, CloakPipeline};
use crate::control::{Command, ModeState};
use crate::output::OutputSink;
use anyhow::{Context, Result};
use image::{imageops, RgbImage};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

/// Frame loop settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub fps: u32,
    /// Frames read while the camera settles; the last one becomes the plate
    pub warmup_frames: u32,
    /// Output the cleaned mask instead of the composited frame
    pub show_mask: bool,
    /// Log averaged timings every this many frames
    pub stats_interval: u64,
    /// Stop after this many frames
    pub max_frames: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            warmup_frames: 20,
            show_mask: false,
            stats_interval: 30,
            max_frames: None,
        }
    }
}

/// What happened during a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub composited: u64,
    pub passthrough: u64,
    pub background_captures: u64,
}

/// Everything the loop reads or mutates between frames
pub struct Session<'a, C, O> {
    capture: &'a mut C,
    output: &'a mut O,
    pipeline: CloakPipeline,
    background: BackgroundStore,
    mode: ModeState,
    config: SessionConfig,
}

impl<'a, C, O> Session<'a, C, O>
where
    C: CaptureSource,
    O: OutputSink,
{
    pub fn new(
        capture: &'a mut C,
        output: &'a mut O,
        pipeline: CloakPipeline,
        background: BackgroundStore,
        mode: ModeState,
        config: SessionConfig,
    ) -> Self {
        Self {
            capture,
            output,
            pipeline,
            background,
            mode,
            config,
        }
    }

    pub fn mode(&self) -> &ModeState {
        &self.mode
    }

    pub fn background(&self) -> &BackgroundStore {
        &self.background
    }

    /// Run until a quit command, a frame limit or a capture/output failure
    pub fn run(&mut self, commands: &Receiver<Command>) -> Result<SessionSummary> {
        let frame_duration = Duration::from_secs_f32(1.0 / self.config.fps.max(1) as f32);
        let mut summary = SessionSummary::default();
        let mut total_capture_time = Duration::ZERO;
        let mut total_process_time = Duration::ZERO;
        let mut total_output_time = Duration::ZERO;
        let mut warned_no_background = false;
        let mut commands_open = true;

        tracing::info!("Starting main pipeline loop");
        if !self.background.is_captured() {
            tracing::info!("Clear the frame, then press 'b' + Enter to capture the background");
        }
        tracing::info!("Keys: [b] background  [1] red  [2] blue  [3] green  [m] mirror  [q] quit");

        loop {
            if let Some(limit) = self.config.max_frames {
                if summary.frames >= limit {
                    break;
                }
            }

            let loop_start = Instant::now();

            // Apply mode changes between frames only
            let mut quit = false;
            while commands_open {
                match commands.try_recv() {
                    Ok(Command::Quit) => {
                        quit = true;
                        break;
                    }
                    Ok(Command::CaptureBackground) => {
                        if self.capture_background()? {
                            summary.background_captures += 1;
                            warned_no_background = false;
                        }
                    }
                    Ok(Command::ToggleMirror) => {
                        self.mode.apply(Command::ToggleMirror);
                        // A live plate was captured in the old orientation
                        self.background.flip_live_plate();
                    }
                    Ok(command) => self.mode.apply(command),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => commands_open = false,
                }
            }
            if quit {
                tracing::info!("Quit requested");
                break;
            }

            let capture_start = Instant::now();
            let frame = self.next_frame().context("Failed to capture frame")?;
            total_capture_time += capture_start.elapsed();

            let process_start = Instant::now();
            let output_frame = if self.config.show_mask {
                let mask = self.pipeline.mask_for(&frame, self.mode.color)?;
                mask_to_rgb(&mask)
            } else {
                match self
                    .pipeline
                    .process_frame(&frame, self.mode.color, self.background.plate())
                {
                    Ok(composited) => {
                        summary.composited += 1;
                        composited
                    }
                    Err(CloakError::BackgroundNotCaptured) => {
                        if !warned_no_background {
                            tracing::warn!("Background not captured, passing frames through");
                            warned_no_background = true;
                        }
                        summary.passthrough += 1;
                        frame
                    }
                    Err(e) => return Err(e).context("Failed to process frame"),
                }
            };
            total_process_time += process_start.elapsed();

            let output_start = Instant::now();
            self.output
                .write_frame(&output_frame)
                .context("Failed to write frame")?;
            total_output_time += output_start.elapsed();

            summary.frames += 1;

            if self.config.stats_interval > 0 && summary.frames % self.config.stats_interval == 0 {
                let n = summary.frames as f64;
                let avg_capture_ms = total_capture_time.as_secs_f64() * 1000.0 / n;
                let avg_process_ms = total_process_time.as_secs_f64() * 1000.0 / n;
                let avg_output_ms = total_output_time.as_secs_f64() * 1000.0 / n;
                let total_ms = avg_capture_ms + avg_process_ms + avg_output_ms;
                let actual_fps = if total_ms > 0.0 { 1000.0 / total_ms } else { 0.0 };
                let (classify_ms, refine_ms, composite_ms) = self.pipeline.timings().average_ms();

                tracing::info!(
                    "Frame {}: capture={:.1}ms, process={:.1}ms (classify={:.1} refine={:.1} composite={:.1}), output={:.1}ms, fps={:.1}, color={}",
                    summary.frames,
                    avg_capture_ms,
                    avg_process_ms,
                    classify_ms,
                    refine_ms,
                    composite_ms,
                    avg_output_ms,
                    actual_fps,
                    self.mode.color
                );
            }

            // Frame rate limiting
            let elapsed = loop_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }

        Ok(summary)
    }

    /// Capture a fresh background plate, returning whether one was stored
    ///
    /// Ignored when the plate was loaded from an image file.
    pub fn capture_background(&mut self) -> Result<bool> {
        if self.background.is_static() {
            tracing::info!("Using a static background, ignoring capture request");
            return Ok(false);
        }

        tracing::info!(
            "Capturing background (keeping the last of {} warm-up frames)",
            self.config.warmup_frames
        );

        for _ in 1..self.config.warmup_frames {
            self.next_frame()
                .context("Failed to capture background frame")?;
        }
        let plate = self
            .next_frame()
            .context("Failed to capture background frame")?;
        self.background.capture(plate);
        Ok(true)
    }

    fn next_frame(&mut self) -> Result<RgbImage> {
        let mut frame = self.capture.capture_frame()?;
        if self.mode.mirror {
            imageops::flip_horizontal_in_place(&mut frame);
        }
        Ok(frame)
    }
}
