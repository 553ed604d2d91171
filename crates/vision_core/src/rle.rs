//! Instance labelling and run-length encoding for submission masks.
//!
//! Runs are emitted column-major (the mask is walked down each column in turn) with
//! 1-based start positions: `[start, length, start, length, ...]`.

use std::collections::VecDeque;

/// Binary mask in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>,
}

impl BinaryMask {
    pub fn new(width: usize, height: usize, data: Vec<bool>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    /// Threshold row-major probabilities (`> cutoff` is foreground).
    pub fn from_probs(width: usize, height: usize, probs: &[f32], cutoff: f32) -> Self {
        Self::new(width, height, probs.iter().map(|p| *p > cutoff).collect())
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|v| **v).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Label 8-connected foreground components. Labels start at 1 in raster-scan order; 0 is background.
pub fn label_components(mask: &BinaryMask) -> (Vec<u32>, u32) {
    let (w, h) = (mask.width, mask.height);
    let mut labels = vec![0u32; w * h];
    let mut next = 0u32;
    let mut queue = VecDeque::new();

    for start in 0..w * h {
        if !mask.data[start] || labels[start] != 0 {
            continue;
        }
        next += 1;
        labels[start] = next;
        queue.push_back(start);
        while let Some(idx) = queue.pop_front() {
            let (y, x) = ((idx / w) as isize, (idx % w) as isize);
            for dy in -1..=1isize {
                for dx in -1..=1isize {
                    let (ny, nx) = (y + dy, x + dx);
                    if ny < 0 || nx < 0 || ny >= h as isize || nx >= w as isize {
                        continue;
                    }
                    let nidx = ny as usize * w + nx as usize;
                    if mask.data[nidx] && labels[nidx] == 0 {
                        labels[nidx] = next;
                        queue.push_back(nidx);
                    }
                }
            }
        }
    }
    (labels, next)
}

/// Column-major run-length encoding of one mask.
pub fn rle_encode(mask: &BinaryMask) -> Vec<usize> {
    let mut runs: Vec<usize> = Vec::new();
    let mut prev: Option<usize> = None;
    for x in 0..mask.width {
        for y in 0..mask.height {
            if !mask.data[y * mask.width + x] {
                continue;
            }
            let pos = x * mask.height + y;
            match prev {
                Some(p) if pos == p + 1 => {
                    if let Some(len) = runs.last_mut() {
                        *len += 1;
                    }
                }
                _ => runs.extend([pos + 1, 1]),
            }
            prev = Some(pos);
        }
    }
    runs
}

/// One RLE per connected component, in label order.
pub fn instance_rles(mask: &BinaryMask) -> Vec<Vec<usize>> {
    let (labels, count) = label_components(mask);
    (1..=count)
        .map(|label| {
            let instance = BinaryMask::new(
                mask.width,
                mask.height,
                labels.iter().map(|l| *l == label).collect(),
            );
            rle_encode(&instance)
        })
        .collect()
}

/// Space-joined form used in the `EncodedPixels` column.
pub fn format_rle(runs: &[usize]) -> String {
    runs.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
