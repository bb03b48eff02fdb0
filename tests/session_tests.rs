use anyhow::{anyhow, Result};
use cloak_fx::capture::CaptureSource;
use cloak_fx::cloak::{BackgroundStore, CloakColor, CloakPipeline, EdgeMode, RefineConfig};
use cloak_fx::control::{Command, ModeState};
use cloak_fx::output::OutputSink;
use cloak_fx::session::{Session, SessionConfig};
use image::{Rgb, RgbImage};
use std::collections::VecDeque;
use std::sync::mpsc;

const GREY: Rgb<u8> = Rgb([100, 100, 100]);
const RED: Rgb<u8> = Rgb([230, 10, 10]);
const WALL: Rgb<u8> = Rgb([40, 80, 40]);

/// Plays back a fixed list of frames, then repeats the last one or fails
///
/// A `None` entry in the script is a read failure.
struct ScriptedCapture {
    frames: VecDeque<Option<RgbImage>>,
    last: Option<RgbImage>,
    fail_when_empty: bool,
}

impl ScriptedCapture {
    fn new(frames: Vec<RgbImage>) -> Self {
        Self::with_dropouts(frames.into_iter().map(Some).collect())
    }

    fn with_dropouts(frames: Vec<Option<RgbImage>>) -> Self {
        Self {
            frames: frames.into(),
            last: None,
            fail_when_empty: false,
        }
    }

    fn failing_after(frames: Vec<RgbImage>) -> Self {
        Self {
            fail_when_empty: true,
            ..Self::new(frames)
        }
    }
}

impl CaptureSource for ScriptedCapture {
    fn capture_frame(&mut self) -> Result<RgbImage> {
        match self.frames.pop_front() {
            Some(Some(frame)) => {
                self.last = Some(frame.clone());
                Ok(frame)
            }
            Some(None) => Err(anyhow!("device unplugged")),
            None if self.fail_when_empty => Err(anyhow!("device unplugged")),
            None => self.last.clone().ok_or_else(|| anyhow!("no frames")),
        }
    }

    fn resolution(&self) -> (u32, u32) {
        (20, 20)
    }
}

#[derive(Default)]
struct RecordingSink {
    frames: Vec<RgbImage>,
}

impl OutputSink for RecordingSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (20, 20)
    }
}

fn cloak_frame() -> RgbImage {
    RgbImage::from_fn(20, 20, |x, y| {
        if (5..15).contains(&x) && (5..15).contains(&y) {
            RED
        } else {
            GREY
        }
    })
}

fn test_config(max_frames: u64) -> SessionConfig {
    SessionConfig {
        fps: 1000,
        warmup_frames: 2,
        show_mask: false,
        stats_interval: 0,
        max_frames: Some(max_frames),
    }
}

fn test_pipeline() -> CloakPipeline {
    CloakPipeline::new(
        RefineConfig {
            min_area: 50,
            ..RefineConfig::default()
        },
        EdgeMode::Hard,
    )
}

#[test]
fn test_passthrough_until_background_captured() {
    let mut capture = ScriptedCapture::new(vec![cloak_frame()]);
    let mut sink = RecordingSink::default();
    let (_tx, rx) = mpsc::channel();

    let mut session = Session::new(
        &mut capture,
        &mut sink,
        test_pipeline(),
        BackgroundStore::new(),
        ModeState::new(CloakColor::Red, false),
        test_config(3),
    );
    let summary = session.run(&rx).unwrap();

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.passthrough, 3);
    assert_eq!(summary.composited, 0);
    assert_eq!(sink.frames.len(), 3);
    assert!(sink.frames.iter().all(|f| *f == cloak_frame()));
}

#[test]
fn test_captured_background_replaces_cloak() {
    let wall = RgbImage::from_pixel(20, 20, WALL);
    let mut capture = ScriptedCapture::new(vec![wall.clone(), wall.clone(), cloak_frame()]);
    let mut sink = RecordingSink::default();
    let (tx, rx) = mpsc::channel();
    tx.send(Command::CaptureBackground).unwrap();

    let mut session = Session::new(
        &mut capture,
        &mut sink,
        test_pipeline(),
        BackgroundStore::new(),
        ModeState::new(CloakColor::Red, false),
        test_config(2),
    );
    let summary = session.run(&rx).unwrap();

    assert_eq!(summary.background_captures, 1);
    assert_eq!(summary.composited, 2);
    let out = &sink.frames[0];
    assert_eq!(out.get_pixel(10, 10), &WALL);
    assert_eq!(out.get_pixel(0, 0), &GREY);
}

#[test]
fn test_color_switch_applies_between_frames() {
    let wall = RgbImage::from_pixel(20, 20, WALL);
    let mut capture = ScriptedCapture::new(vec![wall.clone(), wall, cloak_frame()]);
    let mut sink = RecordingSink::default();
    let (tx, rx) = mpsc::channel();
    tx.send(Command::CaptureBackground).unwrap();
    tx.send(Command::SetColor(CloakColor::Blue)).unwrap();

    let mut session = Session::new(
        &mut capture,
        &mut sink,
        test_pipeline(),
        BackgroundStore::new(),
        ModeState::new(CloakColor::Red, false),
        test_config(1),
    );
    session.run(&rx).unwrap();

    assert_eq!(session.mode().color, CloakColor::Blue);
    // Red is no longer the cloak colour, so the frame is untouched.
    assert_eq!(sink.frames[0], cloak_frame());
}

#[test]
fn test_quit_stops_before_capturing() {
    let mut capture = ScriptedCapture::new(vec![cloak_frame()]);
    let mut sink = RecordingSink::default();
    let (tx, rx) = mpsc::channel();
    tx.send(Command::Quit).unwrap();

    let mut session = Session::new(
        &mut capture,
        &mut sink,
        test_pipeline(),
        BackgroundStore::new(),
        ModeState::new(CloakColor::Red, false),
        test_config(10),
    );
    let summary = session.run(&rx).unwrap();

    assert_eq!(summary.frames, 0);
    assert!(sink.frames.is_empty());
}

#[test]
fn test_capture_failure_ends_session() {
    let mut capture = ScriptedCapture::failing_after(vec![cloak_frame()]);
    let mut sink = RecordingSink::default();
    let (_tx, rx) = mpsc::channel();

    let mut session = Session::new(
        &mut capture,
        &mut sink,
        test_pipeline(),
        BackgroundStore::new(),
        ModeState::new(CloakColor::Red, false),
        test_config(5),
    );
    let err = session.run(&rx).unwrap_err();

    assert!(format!("{err:#}").contains("device unplugged"));
    assert_eq!(sink.frames.len(), 1);
}

#[test]
fn test_mirror_flips_frames() {
    let frame = RgbImage::from_fn(20, 20, |x, _| if x == 0 { RED } else { GREY });
    let mut capture = ScriptedCapture::new(vec![frame]);
    let mut sink = RecordingSink::default();
    let (_tx, rx) = mpsc::channel();

    let mut session = Session::new(
        &mut capture,
        &mut sink,
        test_pipeline(),
        BackgroundStore::new(),
        ModeState::new(CloakColor::Red, true),
        test_config(1),
    );
    session.run(&rx).unwrap();

    assert_eq!(sink.frames[0].get_pixel(19, 3), &RED);
    assert_eq!(sink.frames[0].get_pixel(0, 3), &GREY);
}

#[test]
fn test_show_mask_outputs_cleaned_mask() {
    let mut capture = ScriptedCapture::new(vec![cloak_frame()]);
    let mut sink = RecordingSink::default();
    let (_tx, rx) = mpsc::channel();
    let config = SessionConfig {
        show_mask: true,
        ..test_config(1)
    };

    let mut session = Session::new(
        &mut capture,
        &mut sink,
        test_pipeline(),
        BackgroundStore::new(),
        ModeState::new(CloakColor::Red, false),
        config,
    );
    session.run(&rx).unwrap();

    let mask = &sink.frames[0];
    assert_eq!(mask.get_pixel(10, 10), &Rgb([255, 255, 255]));
    assert_eq!(mask.get_pixel(1, 1), &Rgb([0, 0, 0]));
}

#[test]
fn test_static_background_ignores_capture_request() {
    let path = std::env::temp_dir().join(format!("cloak-fx-session-{}.png", std::process::id()));
    RgbImage::from_pixel(20, 20, WALL).save(&path).unwrap();
    let background = BackgroundStore::load(&path, 20, 20).unwrap();
    std::fs::remove_file(&path).ok();

    let mut capture = ScriptedCapture::new(vec![cloak_frame()]);
    let mut sink = RecordingSink::default();
    let (tx, rx) = mpsc::channel();
    tx.send(Command::CaptureBackground).unwrap();

    let mut session = Session::new(
        &mut capture,
        &mut sink,
        test_pipeline(),
        background,
        ModeState::new(CloakColor::Red, false),
        test_config(1),
    );
    let summary = session.run(&rx).unwrap();

    assert_eq!(summary.background_captures, 0);
    assert!(session.background().is_static());
    assert_eq!(sink.frames[0].get_pixel(10, 10), &WALL);
}

#[test]
fn test_toggling_mirror_keeps_plate_aligned() {
    // Left half black, right half white, as the camera delivers it.
    let wall = RgbImage::from_fn(20, 20, |x, _| {
        if x < 10 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    });
    let all_red = RgbImage::from_pixel(20, 20, RED);
    let mut capture = ScriptedCapture::new(vec![wall.clone(), wall, all_red]);
    let mut sink = RecordingSink::default();
    let (tx, rx) = mpsc::channel();
    tx.send(Command::CaptureBackground).unwrap();
    tx.send(Command::ToggleMirror).unwrap();

    let mut session = Session::new(
        &mut capture,
        &mut sink,
        test_pipeline(),
        BackgroundStore::new(),
        ModeState::new(CloakColor::Red, true),
        test_config(1),
    );
    session.run(&rx).unwrap();

    assert!(!session.mode().mirror);
    let out = &sink.frames[0];
    assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
    assert_eq!(out.get_pixel(19, 0), &Rgb([255, 255, 255]));
}

#[test]
fn test_background_warmup_failure_ends_session() {
    let wall = RgbImage::from_pixel(20, 20, WALL);
    let mut capture =
        ScriptedCapture::with_dropouts(vec![Some(wall.clone()), None, Some(wall)]);
    let mut sink = RecordingSink::default();
    let (tx, rx) = mpsc::channel();
    tx.send(Command::CaptureBackground).unwrap();

    let mut session = Session::new(
        &mut capture,
        &mut sink,
        test_pipeline(),
        BackgroundStore::new(),
        ModeState::new(CloakColor::Red, false),
        test_config(3),
    );
    let err = session.run(&rx).unwrap_err();

    assert!(format!("{err:#}").contains("device unplugged"));
    assert!(!session.background().is_captured());
    assert!(sink.frames.is_empty());
}
