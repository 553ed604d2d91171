//! Deterministic geometric augmentation.
//!
//! Every labelled training image expands into six variants. The same transform is applied to
//! the image and its label so pixel correspondence is preserved.

use crate::types::ChwImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    Identity,
    /// Quarter turn counter-clockwise.
    Rot90,
    Rot180,
    /// Three quarter turns counter-clockwise.
    Rot270,
    /// Mirror left/right.
    FlipHorizontal,
    /// Mirror top/bottom.
    FlipVertical,
}

/// Variant order stored in every training record.
pub const AUGMENTATIONS: [Transform; 6] = [
    Transform::Identity,
    Transform::Rot90,
    Transform::Rot180,
    Transform::Rot270,
    Transform::FlipHorizontal,
    Transform::FlipVertical,
];

impl Transform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transform::Identity => "identity",
            Transform::Rot90 => "rot90",
            Transform::Rot180 => "rot180",
            Transform::Rot270 => "rot270",
            Transform::FlipHorizontal => "fliplr",
            Transform::FlipVertical => "flipud",
        }
    }

    /// Output `(height, width)` for an input of the given size.
    pub fn output_dims(&self, height: usize, width: usize) -> (usize, usize) {
        match self {
            Transform::Rot90 | Transform::Rot270 => (width, height),
            _ => (height, width),
        }
    }

    /// Source `(y, x)` feeding output pixel `(i, j)` of an `height x width` input.
    #[inline]
    fn source(&self, i: usize, j: usize, height: usize, width: usize) -> (usize, usize) {
        match self {
            Transform::Identity => (i, j),
            Transform::Rot90 => (j, width - 1 - i),
            Transform::Rot180 => (height - 1 - i, width - 1 - j),
            Transform::Rot270 => (height - 1 - j, i),
            Transform::FlipHorizontal => (i, width - 1 - j),
            Transform::FlipVertical => (height - 1 - i, j),
        }
    }

    /// Produce a new, independent buffer; the input is never modified.
    pub fn apply(&self, img: &ChwImage) -> ChwImage {
        if *self == Transform::Identity {
            return img.clone();
        }
        let (out_h, out_w) = self.output_dims(img.height, img.width);
        let mut data = Vec::with_capacity(img.data.len());
        for c in 0..img.channels {
            for i in 0..out_h {
                for j in 0..out_w {
                    let (y, x) = self.source(i, j, img.height, img.width);
                    data.push(img.get(c, y, x));
                }
            }
        }
        ChwImage::new(img.channels, out_h, out_w, data)
    }
}

/// All six variants of one image, in [`AUGMENTATIONS`] order.
pub fn augment(img: &ChwImage) -> Vec<ChwImage> {
    AUGMENTATIONS.iter().map(|t| t.apply(img)).collect()
}
