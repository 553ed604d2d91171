//! Centered crop from padded size back to the original image size.
//!
//! Excess on each axis is split `left = excess / 2`, `right = excess - left`, so an odd
//! excess removes the extra row/column from the trailing edge.

use burn::tensor::{backend::Backend, Tensor};
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("original {axis} {original} exceeds padded {padded}")]
pub struct CropError {
    pub axis: &'static str,
    pub original: usize,
    pub padded: usize,
}

/// Rows and columns kept after removing padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropWindow {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

/// `(left, right)` amounts trimmed from one axis.
pub fn split_excess(padded: usize, original: usize) -> Option<(usize, usize)> {
    let excess = padded.checked_sub(original)?;
    let left = excess / 2;
    Some((left, excess - left))
}

fn axis_range(axis: &'static str, padded: usize, original: usize) -> Result<Range<usize>, CropError> {
    let (left, right) = split_excess(padded, original).ok_or(CropError {
        axis,
        original,
        padded,
    })?;
    // right == 0 keeps everything through the end of the axis.
    let end = if right == 0 { padded } else { padded - right };
    Ok(left..end)
}

impl CropWindow {
    /// Window for a `padded_height x padded_width` mask whose source was `width x height`.
    pub fn centered(
        padded_height: usize,
        padded_width: usize,
        original_width: usize,
        original_height: usize,
    ) -> Result<Self, CropError> {
        Ok(Self {
            rows: axis_range("height", padded_height, original_height)?,
            cols: axis_range("width", padded_width, original_width)?,
        })
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.cols.len()
    }

    /// Crop a row-major `height x width` buffer.
    pub fn apply<T: Copy>(&self, data: &[T], width: usize) -> Vec<T> {
        let mut out = Vec::with_capacity(self.height() * self.width());
        for row in self.rows.clone() {
            let start = row * width;
            out.extend_from_slice(&data[start + self.cols.start..start + self.cols.end]);
        }
        out
    }

    /// Crop the trailing two axes of a `[N, C, H, W]` tensor.
    pub fn apply_tensor<B: Backend>(&self, tensor: Tensor<B, 4>) -> Tensor<B, 4> {
        let [n, c, _, _] = tensor.dims();
        tensor.slice([0..n, 0..c, self.rows.clone(), self.cols.clone()])
    }
}
