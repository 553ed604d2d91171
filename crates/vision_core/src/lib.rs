//! vision_core: tile grids, crop windows, and mask encoding shared by training and inference.

pub mod crop;
pub mod overlay;
pub mod rle;
pub mod tiling;

pub use crop::CropWindow;
pub use tiling::{partition, reassemble, TileGrid, TilingError, DEFAULT_TILE_SIZE};

pub mod prelude {
    pub use crate::crop::*;
    pub use crate::overlay::*;
    pub use crate::rle::*;
    pub use crate::tiling::*;
}
