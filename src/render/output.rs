//! Output assembly: scatter per-tile results into full-frame buffers.

use crate::core::color::OutputEncoding;
use crate::render::alpha::SUBPIXEL_COUNT;
use crate::render::composite::TileOutput;
use crate::render::tiles::TileGrid;
use image::{Rgb, RgbImage};

/// Final frame produced by one forward pass.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameBuffers {
    pub width: u32,
    pub height: u32,

    /// Channel-major linear RGB: `color[ch·H·W + y·W + x]`
    pub color: Vec<f32>,

    /// Remaining transmittance per pixel, `y·W + x`
    pub final_t: Vec<f32>,

    /// Primitives blended per pixel, `y·W + x`
    pub n_contrib: Vec<u32>,
}

impl FrameBuffers {
    fn new(width: u32, height: u32) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            color: vec![0.0; 3 * n],
            final_t: vec![1.0; n],
            n_contrib: vec![0; n],
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }

    fn plane(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Linear RGB of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        let i = self.index(x, y);
        let n = self.plane();
        [self.color[i], self.color[n + i], self.color[2 * n + i]]
    }

    pub fn transmittance(&self, x: u32, y: u32) -> f32 {
        self.final_t[self.index(x, y)]
    }

    pub fn contributors(&self, x: u32, y: u32) -> u32 {
        self.n_contrib[self.index(x, y)]
    }

    /// Encode the frame as an 8-bit RGB image.
    pub fn to_rgb_image(&self, encoding: OutputEncoding) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let [r, g, b] = self.pixel(x, y);
            Rgb([encoding.encode(r), encoding.encode(g), encoding.encode(b)])
        })
    }
}

/// Write every tile's pixels into the frame, blending the background by the
/// remaining transmittance.
///
/// When `subpixel_t` is given, each tile's updated sub-cell transmittances are
/// written back to it.
pub fn assemble(
    grid: &TileGrid,
    tiles: &[TileOutput],
    background: [f32; 3],
    mut subpixel_t: Option<&mut [f32]>,
) -> FrameBuffers {
    let mut frame = FrameBuffers::new(grid.width, grid.height);
    let n = frame.plane();

    for tile in tiles {
        debug_assert_eq!(tile.pixels.len(), tile.rect.len());
        for ((x, y), (k, px)) in tile.rect.pixels().zip(tile.pixels.iter().enumerate()) {
            let i = frame.index(x, y);
            for (ch, bg) in background.iter().enumerate() {
                frame.color[ch * n + i] = px.color[ch] + px.transmittance * bg;
            }
            frame.final_t[i] = px.transmittance;
            frame.n_contrib[i] = px.n_contrib;

            if let Some(buffer) = subpixel_t.as_deref_mut() {
                let src = &tile.subpixel_t[k * SUBPIXEL_COUNT..(k + 1) * SUBPIXEL_COUNT];
                buffer[i * SUBPIXEL_COUNT..(i + 1) * SUBPIXEL_COUNT].copy_from_slice(src);
            }
        }
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::composite::PixelResult;
    use crate::render::tiles::PixelRect;
    use approx::assert_relative_eq;

    fn tile_with(rect: PixelRect, px: PixelResult) -> TileOutput {
        TileOutput {
            tile: 0,
            rect,
            pixels: vec![px; rect.len()],
            subpixel_t: vec![0.5; rect.len() * SUBPIXEL_COUNT],
            early_exit: false,
        }
    }

    #[test]
    fn test_background_blend_and_layout() {
        let grid = TileGrid::new(2, 1);
        let rect = grid.tile_pixels(0);
        let px = PixelResult {
            color: [0.2, 0.0, 0.0],
            transmittance: 0.5,
            n_contrib: 3,
        };
        let frame = assemble(&grid, &[tile_with(rect, px)], [0.0, 0.0, 1.0], None);

        assert_eq!(frame.color.len(), 6);
        assert_relative_eq!(frame.color[0], 0.2);
        assert_relative_eq!(frame.color[1], 0.2);
        assert_relative_eq!(frame.color[4], 0.5);
        assert_eq!(frame.pixel(1, 0), [0.2, 0.0, 0.5]);
        assert_eq!(frame.contributors(1, 0), 3);
        assert_relative_eq!(frame.transmittance(0, 0), 0.5);
    }

    #[test]
    fn test_subpixel_write_back() {
        let grid = TileGrid::new(3, 2);
        let rect = grid.tile_pixels(0);
        let px = PixelResult {
            color: [0.0; 3],
            transmittance: 0.5,
            n_contrib: 1,
        };
        let mut buffer = vec![1.0; grid.num_pixels() * SUBPIXEL_COUNT];
        assemble(&grid, &[tile_with(rect, px)], [0.0; 3], Some(&mut buffer));
        assert!(buffer.iter().all(|&t| t == 0.5));
    }

    #[test]
    fn test_to_rgb_image_encodes() {
        let grid = TileGrid::new(1, 1);
        let px = PixelResult {
            color: [1.0, 0.0, 0.0],
            transmittance: 0.0,
            n_contrib: 1,
        };
        let frame = assemble(&grid, &[tile_with(grid.tile_pixels(0), px)], [0.0; 3], None);
        let img = frame.to_rgb_image(OutputEncoding::Linear);
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }
}
