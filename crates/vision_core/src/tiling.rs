//! Fixed-size tiling of padded images.
//!
//! Shapes:
//! - Input image/mask: `[C, H, W]` with `H % T == 0` and `W % T == 0`
//! - Tiles: `[C, T, T]`, row-major over the grid (outer loop over rows, inner over columns)
//! - Reassembled output: `[1, C, H, W]`
//!
//! Reassembly is positional: the `i`-th tile handed to [`reassemble`] is written to the
//! `i`-th grid cell, so callers must keep tiles in the order [`partition`] produced them.

use burn::tensor::{backend::Backend, Tensor};
use thiserror::Error;

/// Tile edge used by the segmentation network.
pub const DEFAULT_TILE_SIZE: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TilingError {
    #[error("tile size must be non-zero")]
    ZeroTileSize,
    #[error("image {height}x{width} is not a multiple of tile size {tile}")]
    NotTileAligned {
        height: usize,
        width: usize,
        tile: usize,
    },
    #[error("expected {expected} tiles for the grid, got {actual}")]
    TileCount { expected: usize, actual: usize },
    #[error("tile {index} has shape {actual:?}, expected [{channels}, {tile}, {tile}]")]
    TileShape {
        index: usize,
        actual: [usize; 3],
        channels: usize,
        tile: usize,
    },
}

/// Geometry of a padded image cut into `tile x tile` cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub tile: usize,
    pub height: usize,
    pub width: usize,
}

impl TileGrid {
    /// Fails fast when the padded dims are not an exact multiple of the tile size.
    pub fn new(height: usize, width: usize, tile: usize) -> Result<Self, TilingError> {
        if tile == 0 {
            return Err(TilingError::ZeroTileSize);
        }
        if height % tile != 0 || width % tile != 0 {
            return Err(TilingError::NotTileAligned {
                height,
                width,
                tile,
            });
        }
        Ok(Self {
            tile,
            height,
            width,
        })
    }

    pub fn rows(&self) -> usize {
        self.height / self.tile
    }

    pub fn cols(&self) -> usize {
        self.width / self.tile
    }

    pub fn len(&self) -> usize {
        self.rows() * self.cols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-left pixel `(y, x)` of the tile at list position `index`.
    pub fn origin(&self, index: usize) -> (usize, usize) {
        let row = index / self.cols();
        let col = index % self.cols();
        (row * self.tile, col * self.tile)
    }

    /// Tile origins in partition order.
    pub fn origins(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.len()).map(move |idx| self.origin(idx))
    }
}

/// Split a `[C, H, W]` tensor into row-major `[C, T, T]` tiles.
pub fn partition<B: Backend>(
    image: Tensor<B, 3>,
    tile: usize,
) -> Result<(Vec<Tensor<B, 3>>, TileGrid), TilingError> {
    let [channels, height, width] = image.dims();
    let grid = TileGrid::new(height, width, tile)?;
    let tiles = grid
        .origins()
        .map(|(y, x)| {
            image
                .clone()
                .slice([0..channels, y..y + tile, x..x + tile])
        })
        .collect();
    Ok((tiles, grid))
}

/// Inverse of [`partition`]: stitch tiles back into a `[1, C, H, W]` tensor.
pub fn reassemble<B: Backend>(
    tiles: Vec<Tensor<B, 3>>,
    grid: &TileGrid,
) -> Result<Tensor<B, 4>, TilingError> {
    if tiles.len() != grid.len() || tiles.is_empty() {
        return Err(TilingError::TileCount {
            expected: grid.len(),
            actual: tiles.len(),
        });
    }
    let channels = tiles[0].dims()[0];
    for (index, tile) in tiles.iter().enumerate() {
        let dims = tile.dims();
        if dims != [channels, grid.tile, grid.tile] {
            return Err(TilingError::TileShape {
                index,
                actual: dims,
                channels,
                tile: grid.tile,
            });
        }
    }

    let cols = grid.cols();
    let mut row_strips = Vec::with_capacity(grid.rows());
    let mut iter = tiles.into_iter();
    for _ in 0..grid.rows() {
        let row: Vec<_> = iter.by_ref().take(cols).collect();
        row_strips.push(Tensor::cat(row, 2));
    }
    Ok(Tensor::cat(row_strips, 1).unsqueeze::<4>())
}
