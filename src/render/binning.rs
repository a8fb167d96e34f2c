//! Reference binning: duplicate, sort, and range.
//!
//! Each visible splat is emitted once per tile its footprint rectangle
//! touches. Entries are sorted by tile, then by view-space depth, and each
//! tile's contiguous slice becomes its [`TileRange`].

use crate::render::preprocess::ScreenSplat;
use crate::render::tiles::{TileGrid, TileRange};
use rayon::prelude::*;

/// Sorted per-tile work lists for the compositor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BinnedFrame {
    /// Splat indices, grouped by tile and depth-ascending within a tile
    pub point_list: Vec<u32>,
    /// Tile index of each `point_list` entry
    pub tile_ids: Vec<u32>,
    /// One `[start, end)` range per tile
    pub ranges: Vec<TileRange>,
}

impl BinnedFrame {
    /// Splat indices composited by `tile`, front to back.
    pub fn tile_list(&self, tile: usize) -> &[u32] {
        let r = self.ranges[tile];
        &self.point_list[r.start as usize..r.end as usize]
    }
}

/// Find the `[start, end)` slice of each tile in a tile-sorted key list.
pub fn identify_tile_ranges(tile_ids: &[u32], num_tiles: usize) -> Vec<TileRange> {
    let mut ranges = vec![TileRange::default(); num_tiles];
    let n = tile_ids.len();
    for (i, &tile) in tile_ids.iter().enumerate() {
        let tile = tile as usize;
        debug_assert!(tile < num_tiles, "tile {tile} out of range");
        if i == 0 || tile_ids[i - 1] as usize != tile {
            ranges[tile].start = i as u32;
        }
        if i + 1 == n || tile_ids[i + 1] as usize != tile {
            ranges[tile].end = (i + 1) as u32;
        }
    }
    ranges
}

/// Bin every visible splat into the tiles it overlaps.
pub fn bin_splats(splats: &[ScreenSplat], grid: &TileGrid) -> BinnedFrame {
    let total: usize = splats.iter().map(|s| s.tiles_touched as usize).sum();
    let mut entries: Vec<(u32, f32, u32)> = Vec::with_capacity(total);

    for (id, s) in splats.iter().enumerate() {
        if !s.is_visible() {
            continue;
        }
        let rect = grid.tile_rect(&s.mean, s.radius);
        debug_assert_eq!(rect.area(), s.tiles_touched);
        for (tx, ty) in rect.tiles() {
            entries.push((grid.tile_index(tx, ty) as u32, s.depth, id as u32));
        }
    }

    // Stable, so equal depths keep submission order.
    entries.par_sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let tile_ids: Vec<u32> = entries.iter().map(|e| e.0).collect();
    let ranges = identify_tile_ranges(&tile_ids, grid.num_tiles());
    let point_list = entries.into_iter().map(|e| e.2).collect();

    log::debug!(
        "binning: {total} tile entries, {} non-empty tiles",
        ranges.iter().filter(|r| !r.is_empty()).count()
    );

    BinnedFrame {
        point_list,
        tile_ids,
        ranges,
    }
}
