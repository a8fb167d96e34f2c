//! Errors reported at the rasterizer's host boundary.
//!
//! Geometric degeneracies are never errors: they cull silently. These variants
//! cover buffers handed in with the wrong shape.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RasterError {
    #[error("Image has zero area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("Buffer `{name}` has length {actual}, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("SH degree {degree} exceeds the 16-coefficient block (max {max})")]
    ShDegree { degree: u32, max: u32 },

    #[error("Tile {tile} range [{start}, {end}) is malformed for a point list of length {len}")]
    MalformedRange {
        tile: usize,
        start: u32,
        end: u32,
        len: usize,
    },

    #[error("Point list entry {position} references primitive {index}, but only {count} exist")]
    IndexOutOfRange {
        position: usize,
        index: u32,
        count: usize,
    },
}

/// Check a buffer length against the expected one.
pub(crate) fn expect_len(name: &'static str, expected: usize, actual: usize) -> Result<(), RasterError> {
    if expected == actual {
        Ok(())
    } else {
        Err(RasterError::LengthMismatch {
            name,
            expected,
            actual,
        })
    }
}
