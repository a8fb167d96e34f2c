//! Reference binning produces per-tile, depth-ordered work lists.

use nalgebra::{Quaternion, Vector3};
use splat_raster::core::{Camera, Gaussian};
use splat_raster::render::{bin_splats, preprocess, TileGrid};
use splat_raster::RasterSettings;

/// A deterministic scatter of primitives in front of the camera.
fn scatter(n: usize) -> Vec<Gaussian> {
    (0..n)
        .map(|i| {
            let t = i as f32;
            let position = Vector3::new(
                ((t * 0.37).sin()) * 2.0,
                ((t * 0.73).cos()) * 1.5,
                3.0 + (t * 0.11) % 4.0,
            );
            Gaussian::with_constant_color(
                position,
                Vector3::new(0.05 + 0.02 * (i % 5) as f32, 0.08, 0.04),
                Quaternion::new(1.0, 0.1 * (i % 3) as f32, 0.0, 0.05),
                0.6,
                [0.5, 0.4, 0.3],
            )
        })
        .collect()
}

fn create_camera() -> Camera {
    Camera::look_at(
        &Vector3::new(0.0, 0.0, -1.0),
        &Vector3::new(0.0, 0.0, 5.0),
        &Vector3::y(),
        1.2,
        80,
        56,
    )
}

#[test]
fn test_ranges_hold_their_tile_in_depth_order() {
    let camera = create_camera();
    let splats = preprocess(&scatter(200), &camera, &RasterSettings::default()).unwrap();
    let grid = TileGrid::new(camera.width, camera.height);
    let binned = bin_splats(&splats, &grid);

    assert_eq!(binned.ranges.len(), grid.num_tiles());
    for (tile, range) in binned.ranges.iter().enumerate() {
        let list = binned.tile_list(tile);
        for (k, &id) in list.iter().enumerate() {
            assert_eq!(binned.tile_ids[range.start as usize + k] as usize, tile);
            let rect = grid.tile_rect(&splats[id as usize].mean, splats[id as usize].radius);
            assert!(rect
                .tiles()
                .any(|(tx, ty)| grid.tile_index(tx, ty) == tile));
        }
        for pair in list.windows(2) {
            assert!(splats[pair[0] as usize].depth <= splats[pair[1] as usize].depth);
        }
    }
}

#[test]
fn test_every_visible_primitive_is_duplicated_per_tile() {
    let camera = create_camera();
    let splats = preprocess(&scatter(120), &camera, &RasterSettings::default()).unwrap();
    let binned = bin_splats(&splats, &TileGrid::new(camera.width, camera.height));

    let mut counts = vec![0u32; splats.len()];
    for &id in &binned.point_list {
        counts[id as usize] += 1;
    }
    for (s, count) in splats.iter().zip(counts) {
        assert_eq!(count, s.tiles_touched);
    }
    let total: u32 = splats.iter().map(|s| s.tiles_touched).sum();
    assert_eq!(binned.point_list.len(), total as usize);
    assert!(total > 0);
}

#[test]
fn test_ranges_tile_the_point_list() {
    let camera = create_camera();
    let splats = preprocess(&scatter(60), &camera, &RasterSettings::default()).unwrap();
    let binned = bin_splats(&splats, &TileGrid::new(camera.width, camera.height));

    let covered: usize = binned.ranges.iter().map(|r| r.len()).sum();
    assert_eq!(covered, binned.point_list.len());
    let mut non_empty: Vec<_> = binned.ranges.iter().filter(|r| !r.is_empty()).collect();
    non_empty.sort_by_key(|r| r.start);
    for pair in non_empty.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }
}
