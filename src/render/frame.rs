//! End-to-end forward pass: preprocess, bin, composite.

use crate::config::RasterSettings;
use crate::core::Camera;
use crate::core::Gaussian;
use crate::error::RasterError;
use crate::render::alpha::AlphaModel;
use crate::render::binning::{bin_splats, BinnedFrame};
use crate::render::composite::{composite, new_subpixel_buffer, CompositeInputs};
use crate::render::output::FrameBuffers;
use crate::render::preprocess::{preprocess, ScreenSplat};
use crate::render::tiles::TileGrid;

/// Everything one forward pass produces.
///
/// Besides the image, the per-primitive attributes and the binning are kept
/// so a backward pass can replay the same blend order.
#[derive(Clone, Debug)]
pub struct ForwardOutput {
    pub splats: Vec<ScreenSplat>,
    pub binned: BinnedFrame,
    pub frame: FrameBuffers,
}

impl ForwardOutput {
    /// Number of primitives that survived culling.
    pub fn visible_count(&self) -> usize {
        self.splats.iter().filter(|s| s.is_visible()).count()
    }
}

/// Render `gaussians` from `camera`.
///
/// `subpixel_t` is the persisted sub-pixel transmittance buffer used by the
/// multisample model. Pass `None` to start from a fresh (all-transparent)
/// buffer that is discarded afterwards.
pub fn render_frame(
    gaussians: &[Gaussian],
    camera: &Camera,
    settings: &RasterSettings,
    subpixel_t: Option<&mut [f32]>,
) -> Result<ForwardOutput, RasterError> {
    let splats = preprocess(gaussians, camera, settings)?;
    let grid = TileGrid::new(camera.width, camera.height);
    let binned = bin_splats(&splats, &grid);

    let inputs = CompositeInputs {
        grid,
        ranges: &binned.ranges,
        point_list: &binned.point_list,
        splats: &splats,
        background: settings.background,
        model: settings.alpha_model,
    };

    let frame = match subpixel_t {
        Some(buffer) => composite(&inputs, buffer)?,
        None if settings.alpha_model == AlphaModel::SubpixelMultisample => {
            composite(&inputs, &mut new_subpixel_buffer(&grid))?
        }
        None => composite(&inputs, &mut [])?,
    };

    log::debug!(
        "render_frame: {}x{} {:?}, {} primitives",
        camera.width,
        camera.height,
        settings.alpha_model,
        gaussians.len()
    );

    Ok(ForwardOutput {
        splats,
        binned,
        frame,
    })
}
