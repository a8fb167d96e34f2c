//! Tile grid geometry.
//!
//! The image is partitioned into `BLOCK_X × BLOCK_Y` tiles, row-major. A
//! primitive's footprint disc is mapped to the half-open rectangle of tiles it
//! overlaps; the number of tiles in that rectangle is what the binning stage
//! duplicates the primitive into.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Tile width in pixels.
pub const BLOCK_X: u32 = 16;

/// Tile height in pixels.
pub const BLOCK_Y: u32 = 16;

/// Pixels per tile, also the number of primitives staged per batch.
pub const BLOCK_SIZE: usize = (BLOCK_X * BLOCK_Y) as usize;

/// Half-open `[start, end)` range into the sorted point list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRange {
    pub start: u32,
    pub end: u32,
}

impl TileRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Half-open rectangle of tiles `[min, max)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRect {
    pub min: (u32, u32),
    pub max: (u32, u32),
}

impl TileRect {
    /// Number of tiles covered.
    pub fn area(&self) -> u32 {
        self.max.0.saturating_sub(self.min.0) * self.max.1.saturating_sub(self.min.1)
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Iterate `(tile_x, tile_y)` row-major.
    pub fn tiles(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.min.1..self.max.1).flat_map(move |y| (self.min.0..self.max.0).map(move |x| (x, y)))
    }
}

/// Pixel bounds of one tile, clipped to the image. Half-open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn len(&self) -> usize {
        (self.width() * self.height()) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate `(x, y)` pixel coordinates row-major.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y0..self.y1).flat_map(move |y| (self.x0..self.x1).map(move |x| (x, y)))
    }
}

/// The tile partition of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    pub width: u32,
    pub height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
}

impl TileGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles_x: width.div_ceil(BLOCK_X),
            tiles_y: height.div_ceil(BLOCK_Y),
        }
    }

    pub fn num_tiles(&self) -> usize {
        (self.tiles_x * self.tiles_y) as usize
    }

    pub fn num_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Row-major tile index.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> usize {
        debug_assert!(tile_x < self.tiles_x && tile_y < self.tiles_y);
        (tile_y * self.tiles_x + tile_x) as usize
    }

    /// Pixels owned by a tile, clipped to the image.
    pub fn tile_pixels(&self, tile: usize) -> PixelRect {
        debug_assert!(tile < self.num_tiles(), "tile {tile} out of range");
        let tx = tile as u32 % self.tiles_x;
        let ty = tile as u32 / self.tiles_x;
        let x0 = tx * BLOCK_X;
        let y0 = ty * BLOCK_Y;
        PixelRect {
            x0,
            y0,
            x1: (x0 + BLOCK_X).min(self.width),
            y1: (y0 + BLOCK_Y).min(self.height),
        }
    }

    /// Tiles overlapped by the bounding square of a disc, clipped to the grid.
    ///
    /// Integer conversion truncates toward zero before clamping.
    pub fn tile_rect(&self, center: &Vector2<f32>, radius: u32) -> TileRect {
        let r = radius as f32;
        let bx = BLOCK_X as f32;
        let by = BLOCK_Y as f32;
        let clamp = |v: f32, hi: u32| -> u32 { (v as i32).clamp(0, hi as i32) as u32 };

        TileRect {
            min: (
                clamp((center.x - r) / bx, self.tiles_x),
                clamp((center.y - r) / by, self.tiles_y),
            ),
            max: (
                clamp((center.x + r + bx - 1.0) / bx, self.tiles_x),
                clamp((center.y + r + by - 1.0) / by, self.tiles_y),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_rounds_up_partial_tiles() {
        let grid = TileGrid::new(33, 16);
        assert_eq!(grid.tiles_x, 3);
        assert_eq!(grid.tiles_y, 1);
        assert_eq!(grid.num_tiles(), 3);
    }

    #[test]
    fn test_edge_tile_is_clipped() {
        let grid = TileGrid::new(33, 20);
        let last = grid.tile_pixels(grid.tile_index(2, 1));
        assert_eq!(last, PixelRect { x0: 32, y0: 16, x1: 33, y1: 20 });
        assert_eq!(last.len(), 4);
        assert_eq!(last.pixels().count(), 4);
    }

    #[test]
    fn test_tile_rect_small_disc_in_one_tile() {
        let grid = TileGrid::new(64, 64);
        let rect = grid.tile_rect(&Vector2::new(24.0, 24.0), 2);
        assert_eq!(rect, TileRect { min: (1, 1), max: (2, 2) });
        assert_eq!(rect.area(), 1);
    }

    #[test]
    fn test_tile_rect_straddles_boundary() {
        let grid = TileGrid::new(64, 64);
        let rect = grid.tile_rect(&Vector2::new(16.0, 16.0), 3);
        assert_eq!(rect.area(), 4);
        assert_eq!(rect.tiles().count(), 4);
    }

    #[test]
    fn test_tile_rect_offscreen_is_empty() {
        let grid = TileGrid::new(64, 64);
        assert!(grid.tile_rect(&Vector2::new(-100.0, 10.0), 5).is_empty());
        assert!(grid.tile_rect(&Vector2::new(10.0, 500.0), 5).is_empty());
    }

    #[test]
    fn test_tile_range_len() {
        assert_eq!(TileRange::new(3, 7).len(), 4);
        assert!(TileRange::new(5, 5).is_empty());
    }
}
