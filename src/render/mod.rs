//! Forward rasterization pipeline (CPU implementation).
//!
//! - `preprocess`: project and cull every primitive
//! - `binning`: duplicate visible primitives per tile and depth-sort them
//! - `composite`: front-to-back blending per tile under an alpha model
//! - `output`: assemble the frame buffers
//!
//! `frame::render_frame` runs all of them in order.

pub mod alpha;
pub mod binning;
pub mod composite;
pub mod frame;
pub mod output;
pub mod preprocess;
pub mod tiles;

// Re-export
pub use alpha::AlphaModel;
pub use binning::{bin_splats, BinnedFrame};
pub use composite::{composite, new_subpixel_buffer, CompositeInputs};
pub use frame::{render_frame, ForwardOutput};
pub use output::FrameBuffers;
pub use preprocess::{preprocess, ScreenSplat};
pub use tiles::{TileGrid, TileRange, BLOCK_SIZE, BLOCK_X, BLOCK_Y};
