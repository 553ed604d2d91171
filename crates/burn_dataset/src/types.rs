//! Core types, error definitions, and data structures for burn_dataset.

use burn::tensor::{backend::Backend, Tensor, TensorData};
use data_contracts::{CatalogError, DatasetMode, OriginalDims};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("sample {id}: label {label_w}x{label_h} does not match image {image_w}x{image_h}")]
    ShapeMismatch {
        id: String,
        image_w: u32,
        image_h: u32,
        label_w: u32,
        label_h: u32,
    },
    #[error("cache {path}: {msg}")]
    Cache { path: PathBuf, msg: String },
}

/// Dense `[channels, height, width]` f32 buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChwImage {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

impl ChwImage {
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), channels * height * width);
        Self {
            channels,
            height,
            width,
            data,
        }
    }

    pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
        Self::new(channels, height, width, vec![0.0; channels * height * width])
    }

    #[inline]
    pub fn index(&self, c: usize, y: usize, x: usize) -> usize {
        (c * self.height + y) * self.width + x
    }

    #[inline]
    pub fn get(&self, c: usize, y: usize, x: usize) -> f32 {
        self.data[self.index(c, y, x)]
    }

    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 3> {
        Tensor::from_data(
            TensorData::new(self.data.clone(), [self.channels, self.height, self.width]),
            device,
        )
    }
}

/// One logical example: image variants, matching label variants, and identity.
///
/// Training records hold six augmented variants; validation and test records hold one.
/// `labels[i]` is always produced by the same transform as `images[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub id: String,
    pub images: Vec<ChwImage>,
    pub labels: Option<Vec<ChwImage>>,
    /// Unpadded size, kept for test-time cropping.
    pub original: Option<OriginalDims>,
}

impl SampleRecord {
    pub fn variants(&self) -> usize {
        self.images.len()
    }

    /// `(image, label)` pairs for labelled records; empty for test records.
    pub fn labelled_variants(&self) -> impl Iterator<Item = (&ChwImage, &ChwImage)> {
        self.labels
            .iter()
            .flat_map(move |labels| self.images.iter().zip(labels.iter()))
    }
}

/// Records for one split.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub mode: DatasetMode,
    pub records: Vec<SampleRecord>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
