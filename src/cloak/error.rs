use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the cloaking pipeline
#[derive(Debug, Error)]
pub enum CloakError {
    #[error("frame is empty ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("background not captured")]
    BackgroundNotCaptured,

    #[error("{what} is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        what: &'static str,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("failed to load background image {}", path.display())]
    BackgroundLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl CloakError {
    pub(crate) fn check_dimensions(
        what: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    ) -> Result<()> {
        if expected == actual {
            return Ok(());
        }
        Err(CloakError::DimensionMismatch {
            what,
            expected_width: expected.0,
            expected_height: expected.1,
            actual_width: actual.0,
            actual_height: actual.1,
        })
    }
}

pub type Result<T> = std::result::Result<T, CloakError>;
