//! Tile compositor.
//!
//! One invocation per tile. The tile walks its `[start, end)` slice of the
//! depth-sorted point list in batches of `BLOCK_SIZE`:
//!
//! 1. Vote: if every pixel of the tile is saturated, stop.
//! 2. Stage the batch's attributes into tile-local scratch.
//! 3. Every still-active pixel blends every staged primitive, front to back.
//!
//! Per pixel (point-sample and analytic models):
//!   T = 1, C = 0
//!   for each primitive with alpha α:
//!     C += feature · α · T
//!     T *= 1 - α
//!     stop once T < 1e-4
//!
//! The multisample model keeps one transmittance per sub-cell instead, read
//! from and written back to a caller-owned buffer.

use crate::error::{expect_len, RasterError};
use crate::render::alpha::{
    point_sample_alpha, subpixel_offset, AlphaModel, AlphaStrategy, AnalyticIntegral, PointSample,
    StagedSplat, SUBPIXEL_COUNT, T_EPSILON,
};
use crate::render::output::{assemble, FrameBuffers};
use crate::render::preprocess::ScreenSplat;
use crate::render::tiles::{PixelRect, TileGrid, TileRange, BLOCK_SIZE};
use nalgebra::{Vector2, Vector3};
use rayon::prelude::*;

/// Everything the compositor reads. All of it is immutable during the pass.
#[derive(Clone, Copy, Debug)]
pub struct CompositeInputs<'a> {
    pub grid: TileGrid,
    /// One range per tile into `point_list`
    pub ranges: &'a [TileRange],
    /// Primitive indices sorted by (tile, depth)
    pub point_list: &'a [u32],
    /// Output of the projection pass
    pub splats: &'a [ScreenSplat],
    /// Linear RGB background
    pub background: [f32; 3],
    pub model: AlphaModel,
}

/// Final state of one pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelResult {
    pub color: [f32; 3],
    pub transmittance: f32,
    pub n_contrib: u32,
}

/// Result of compositing one tile, in the tile's row-major pixel order.
#[derive(Clone, Debug)]
pub struct TileOutput {
    pub tile: usize,
    pub rect: PixelRect,
    pub pixels: Vec<PixelResult>,
    /// Updated sub-cell transmittances (multisample model only)
    pub subpixel_t: Vec<f32>,
    /// The tile stopped before exhausting its range
    pub early_exit: bool,
}

/// Per-pixel accumulation state.
#[derive(Clone, Copy, Debug)]
struct PixelState {
    pixel: Vector2<f32>,
    t: f32,
    color: Vector3<f32>,
    n_contrib: u32,
    done: bool,
}

impl PixelState {
    fn new(x: u32, y: u32) -> Self {
        Self {
            pixel: Vector2::new(x as f32, y as f32),
            t: 1.0,
            color: Vector3::zeros(),
            n_contrib: 0,
            done: false,
        }
    }

    #[inline]
    fn blend(&mut self, alpha: f32, feature: &Vector3<f32>) {
        self.color += feature * (alpha * self.t);
        self.t *= 1.0 - alpha;
        self.n_contrib += 1;
        if self.t < T_EPSILON {
            self.done = true;
        }
    }

    fn finish(&self) -> PixelResult {
        PixelResult {
            color: [self.color.x, self.color.y, self.color.z],
            transmittance: self.t,
            n_contrib: self.n_contrib,
        }
    }
}

#[inline]
fn feature(splat: &ScreenSplat) -> Vector3<f32> {
    Vector3::new(splat.rgb[0], splat.rgb[1], splat.rgb[2])
}

/// Copy one batch of attributes into the tile's scratch buffer.
fn stage_batch(scratch: &mut Vec<StagedSplat>, ids: &[u32], splats: &[ScreenSplat]) {
    scratch.clear();
    scratch.extend(ids.iter().map(|&id| {
        let s = &splats[id as usize];
        debug_assert!(s.is_visible(), "point list references culled primitive {id}");
        StagedSplat {
            id,
            xy: s.mean,
            conic_opacity: s.conic_opacity,
            eigen_vecs: s.eigen_vecs,
            eigen_vals: s.eigen_vals,
        }
    }));
}

/// Walk a tile's range batch by batch, letting `consume` blend each staged
/// batch into the pixel states. Returns whether the tile exited early.
fn for_each_batch<P>(
    inputs: &CompositeInputs<'_>,
    range: TileRange,
    pixels: &mut [P],
    is_done: impl Fn(&P) -> bool,
    mut consume: impl FnMut(&mut [P], &[StagedSplat]),
) -> bool {
    let mut scratch = Vec::with_capacity(BLOCK_SIZE);
    let ids = &inputs.point_list[range.start as usize..range.end as usize];

    for batch in ids.chunks(BLOCK_SIZE) {
        // Tile-wide vote.
        if pixels.iter().all(&is_done) {
            return true;
        }
        stage_batch(&mut scratch, batch, inputs.splats);
        consume(pixels, &scratch);
    }
    false
}

fn composite_tile_with<A: AlphaStrategy>(
    strategy: &A,
    inputs: &CompositeInputs<'_>,
    tile: usize,
) -> TileOutput {
    let rect = inputs.grid.tile_pixels(tile);
    let mut pixels: Vec<PixelState> = rect.pixels().map(|(x, y)| PixelState::new(x, y)).collect();

    let early_exit = for_each_batch(
        inputs,
        inputs.ranges[tile],
        &mut pixels,
        |p| p.done,
        |pixels, batch| {
            for px in pixels.iter_mut().filter(|p| !p.done) {
                for staged in batch {
                    let Some(alpha) = strategy.alpha(&px.pixel, staged) else {
                        continue;
                    };
                    px.blend(alpha, &feature(&inputs.splats[staged.id as usize]));
                    if px.done {
                        break;
                    }
                }
            }
        },
    );

    TileOutput {
        tile,
        rect,
        pixels: pixels.iter().map(PixelState::finish).collect(),
        subpixel_t: Vec::new(),
        early_exit,
    }
}

/// Per-pixel state for the multisample model.
#[derive(Clone, Copy, Debug)]
struct SubpixelState {
    pixel: Vector2<f32>,
    sub_t: [f32; SUBPIXEL_COUNT],
    color: Vector3<f32>,
    n_contrib: u32,
    done: bool,
}

impl SubpixelState {
    fn new(x: u32, y: u32, sub_t: [f32; SUBPIXEL_COUNT]) -> Self {
        Self {
            pixel: Vector2::new(x as f32, y as f32),
            sub_t,
            color: Vector3::zeros(),
            n_contrib: 0,
            done: sub_t.iter().all(|&t| t < T_EPSILON),
        }
    }

    fn blend(&mut self, staged: &StagedSplat, feature: &Vector3<f32>) {
        let mut weight = 0.0f32;
        for (k, t) in self.sub_t.iter_mut().enumerate() {
            if *t < T_EPSILON {
                continue;
            }
            let Some(alpha) = point_sample_alpha(&(self.pixel + subpixel_offset(k)), staged) else {
                continue;
            };
            weight += alpha * *t;
            *t *= 1.0 - alpha;
        }
        if weight > 0.0 {
            self.color += feature * (weight / SUBPIXEL_COUNT as f32);
            self.n_contrib += 1;
        }
        if self.sub_t.iter().all(|&t| t < T_EPSILON) {
            self.done = true;
        }
    }

    fn finish(&self) -> PixelResult {
        PixelResult {
            color: [self.color.x, self.color.y, self.color.z],
            transmittance: self.sub_t.iter().sum::<f32>() / SUBPIXEL_COUNT as f32,
            n_contrib: self.n_contrib,
        }
    }
}

fn composite_tile_subpixel(inputs: &CompositeInputs<'_>, subpixel_t: &[f32], tile: usize) -> TileOutput {
    let rect = inputs.grid.tile_pixels(tile);
    let width = inputs.grid.width as usize;

    let mut pixels: Vec<SubpixelState> = rect
        .pixels()
        .map(|(x, y)| {
            let base = (y as usize * width + x as usize) * SUBPIXEL_COUNT;
            let mut sub_t = [0.0f32; SUBPIXEL_COUNT];
            sub_t.copy_from_slice(&subpixel_t[base..base + SUBPIXEL_COUNT]);
            SubpixelState::new(x, y, sub_t)
        })
        .collect();

    let early_exit = for_each_batch(
        inputs,
        inputs.ranges[tile],
        &mut pixels,
        |p| p.done,
        |pixels, batch| {
            for px in pixels.iter_mut().filter(|p| !p.done) {
                for staged in batch {
                    px.blend(staged, &feature(&inputs.splats[staged.id as usize]));
                    if px.done {
                        break;
                    }
                }
            }
        },
    );

    TileOutput {
        tile,
        rect,
        pixels: pixels.iter().map(SubpixelState::finish).collect(),
        subpixel_t: pixels.iter().flat_map(|p| p.sub_t).collect(),
        early_exit,
    }
}

/// Composite a single tile with the given model.
///
/// `subpixel_t` is only read by the multisample model.
pub fn composite_tile(inputs: &CompositeInputs<'_>, subpixel_t: &[f32], tile: usize) -> TileOutput {
    debug_assert!(tile < inputs.grid.num_tiles());
    debug_assert!(
        inputs.model != AlphaModel::SubpixelMultisample
            || subpixel_t.len() == inputs.grid.num_pixels() * SUBPIXEL_COUNT,
        "subpixel_t holds {} entries, expected {}",
        subpixel_t.len(),
        inputs.grid.num_pixels() * SUBPIXEL_COUNT
    );
    match inputs.model {
        AlphaModel::PointSample => composite_tile_with(&PointSample, inputs, tile),
        AlphaModel::AnalyticIntegral => composite_tile_with(&AnalyticIntegral, inputs, tile),
        AlphaModel::SubpixelMultisample => composite_tile_subpixel(inputs, subpixel_t, tile),
    }
}

/// Check the collaborator contracts the kernels rely on.
pub fn validate_inputs(inputs: &CompositeInputs<'_>) -> Result<(), RasterError> {
    if inputs.grid.width == 0 || inputs.grid.height == 0 {
        return Err(RasterError::EmptyImage {
            width: inputs.grid.width,
            height: inputs.grid.height,
        });
    }
    expect_len("ranges", inputs.grid.num_tiles(), inputs.ranges.len())?;

    let len = inputs.point_list.len();
    for (tile, r) in inputs.ranges.iter().enumerate() {
        if r.start > r.end || r.end as usize > len {
            return Err(RasterError::MalformedRange {
                tile,
                start: r.start,
                end: r.end,
                len,
            });
        }
    }

    let count = inputs.splats.len();
    if let Some((position, &index)) = inputs
        .point_list
        .iter()
        .enumerate()
        .find(|&(_, &i)| i as usize >= count)
    {
        return Err(RasterError::IndexOutOfRange {
            position,
            index,
            count,
        });
    }
    Ok(())
}

/// Composite every tile in parallel and assemble the frame.
///
/// `subpixel_t` is the persisted per-sub-cell transmittance buffer, laid out
/// pixel-major with `SUBPIXEL_COUNT` entries per pixel. It is required to have
/// that length for the multisample model (ignored otherwise) and is updated in
/// place.
pub fn composite(inputs: &CompositeInputs<'_>, subpixel_t: &mut [f32]) -> Result<FrameBuffers, RasterError> {
    validate_inputs(inputs)?;
    let multisample = inputs.model == AlphaModel::SubpixelMultisample;
    if multisample {
        expect_len(
            "subpixel_t",
            inputs.grid.num_pixels() * SUBPIXEL_COUNT,
            subpixel_t.len(),
        )?;
    }

    let shared: &[f32] = subpixel_t;
    let tiles: Vec<TileOutput> = (0..inputs.grid.num_tiles())
        .into_par_iter()
        .map(|tile| composite_tile(inputs, shared, tile))
        .collect();

    let early = tiles.iter().filter(|t| t.early_exit).count();
    log::debug!(
        "composite: {} tiles, {early} saturated early, model {:?}",
        tiles.len(),
        inputs.model
    );

    Ok(assemble(
        &inputs.grid,
        &tiles,
        inputs.background,
        multisample.then_some(subpixel_t),
    ))
}

/// A fresh sub-pixel transmittance buffer (all cells fully transparent).
pub fn new_subpixel_buffer(grid: &TileGrid) -> Vec<f32> {
    vec![1.0; grid.num_pixels() * SUBPIXEL_COUNT]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    fn splat(mean: Vector2<f32>, var: f32, opacity: f32, rgb: [f32; 3]) -> ScreenSplat {
        ScreenSplat {
            depth: 1.0,
            radius: (3.0 * var.sqrt()).ceil() as u32,
            mean,
            conic_opacity: Vector4::new(1.0 / var, 0.0, 1.0 / var, opacity),
            eigen_vecs: Vector4::new(1.0, 0.0, 0.0, 1.0),
            eigen_vals: Vector2::new(var, var),
            tiles_touched: 1,
            rgb,
            clamped: [false; 3],
            cov3d: [0.0; 6],
        }
    }

    fn single_tile_inputs<'a>(
        splats: &'a [ScreenSplat],
        point_list: &'a [u32],
        ranges: &'a [TileRange],
        model: AlphaModel,
    ) -> CompositeInputs<'a> {
        CompositeInputs {
            grid: TileGrid::new(16, 16),
            ranges,
            point_list,
            splats,
            background: [0.0, 0.0, 1.0],
            model,
        }
    }

    #[test]
    fn test_pixel_state_blend_sequence() {
        let mut px = PixelState::new(0, 0);
        px.blend(0.5, &Vector3::new(1.0, 0.0, 0.0));
        px.blend(0.5, &Vector3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(px.color, Vector3::new(0.5, 0.25, 0.0), epsilon = 1e-6);
        assert_relative_eq!(px.t, 0.25, epsilon = 1e-6);
        assert_eq!(px.n_contrib, 2);
        assert!(!px.done);
    }

    #[test]
    fn test_pixel_state_terminates() {
        let mut px = PixelState::new(0, 0);
        while !px.done {
            px.blend(0.99, &Vector3::new(1.0, 1.0, 1.0));
        }
        assert!(px.n_contrib <= 3);
        assert!(px.t > 0.0 && px.t < T_EPSILON);
    }

    #[test]
    fn test_front_primitive_dominates() {
        let splats = [
            splat(Vector2::new(8.0, 8.0), 4.0, 0.9, [1.0, 0.0, 0.0]),
            splat(Vector2::new(8.0, 8.0), 4.0, 0.9, [0.0, 1.0, 0.0]),
        ];
        let ranges = [TileRange::new(0, 2)];
        let inputs = single_tile_inputs(&splats, &[1, 0], &ranges, AlphaModel::PointSample);
        let out = composite_tile(&inputs, &[], 0);
        let center = out.pixels[8 * 16 + 8];
        assert!(center.color[1] > center.color[0]);
        assert_eq!(center.n_contrib, 2);
    }

    #[test]
    fn test_saturated_tile_exits_early() {
        // Enough opaque, wide splats to saturate every pixel in the first batch,
        // followed by a second batch that must never be touched.
        let n = BLOCK_SIZE + 10;
        let splats: Vec<ScreenSplat> = (0..n)
            .map(|_| splat(Vector2::new(8.0, 8.0), 1.0e4, 1.0, [1.0, 1.0, 1.0]))
            .collect();
        let point_list: Vec<u32> = (0..n as u32).collect();
        let ranges = [TileRange::new(0, n as u32)];
        let inputs = single_tile_inputs(&splats, &point_list, &ranges, AlphaModel::PointSample);
        let out = composite_tile(&inputs, &[], 0);
        assert!(out.early_exit);
        assert!(out
            .pixels
            .iter()
            .all(|p| p.n_contrib <= 3 && p.transmittance < T_EPSILON));
    }

    #[test]
    fn test_subpixel_state_is_read_and_written() {
        let splats = [splat(Vector2::new(8.0, 8.0), 1.0e6, 0.5, [1.0, 1.0, 1.0])];
        let ranges = [TileRange::new(0, 1)];
        let inputs = single_tile_inputs(&splats, &[0], &ranges, AlphaModel::SubpixelMultisample);
        let mut buffer = new_subpixel_buffer(&inputs.grid);

        let first = composite(&inputs, &mut buffer).unwrap();
        assert!(buffer.iter().all(|&t| (t - 0.5).abs() < 1e-3));

        let second = composite(&inputs, &mut buffer).unwrap();
        assert!(buffer.iter().all(|&t| (t - 0.25).abs() < 1e-3));

        // The second pass only sees the light the first one let through.
        // Background has no red component.
        let c1 = first.pixel(8, 8)[0];
        let c2 = second.pixel(8, 8)[0];
        assert_relative_eq!(c2, 0.5 * c1, epsilon = 1e-3);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "subpixel_t holds 9 entries")]
    fn test_composite_tile_asserts_subpixel_length() {
        let splats = [splat(Vector2::new(8.0, 8.0), 4.0, 0.5, [1.0; 3])];
        let ranges = [TileRange::new(0, 1)];
        let inputs = single_tile_inputs(&splats, &[0], &ranges, AlphaModel::SubpixelMultisample);
        composite_tile(&inputs, &[1.0; SUBPIXEL_COUNT], 0);
    }

    #[test]
    fn test_validate_rejects_bad_contracts() {
        let splats = [splat(Vector2::new(8.0, 8.0), 1.0, 0.5, [1.0; 3])];

        let ranges = [TileRange::new(0, 2)];
        let inputs = single_tile_inputs(&splats, &[0], &ranges, AlphaModel::PointSample);
        assert!(matches!(validate_inputs(&inputs), Err(RasterError::MalformedRange { .. })));

        let ranges = [TileRange::new(0, 1)];
        let inputs = single_tile_inputs(&splats, &[5], &ranges, AlphaModel::PointSample);
        assert!(matches!(validate_inputs(&inputs), Err(RasterError::IndexOutOfRange { index: 5, .. })));

        let ranges = [TileRange::new(0, 1), TileRange::new(0, 1)];
        let inputs = single_tile_inputs(&splats, &[0], &ranges, AlphaModel::PointSample);
        assert!(matches!(validate_inputs(&inputs), Err(RasterError::LengthMismatch { name: "ranges", .. })));

        let ranges = [TileRange::new(0, 1)];
        let inputs = single_tile_inputs(&splats, &[0], &ranges, AlphaModel::SubpixelMultisample);
        let mut short = vec![1.0; 3];
        assert!(matches!(
            composite(&inputs, &mut short),
            Err(RasterError::LengthMismatch { name: "subpixel_t", .. })
        ));
    }
}
