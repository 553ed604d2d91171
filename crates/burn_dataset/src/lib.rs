//! Dataset loading for nucleus segmentation.
//!
//! This crate provides utilities for:
//! - Decoding catalog rows into normalized CHW buffers
//! - Six-way geometric augmentation of training pairs
//! - A binary per-split cache that is rebuilt when missing or stale

pub mod aug;
pub mod cache;
pub mod loader;
pub mod types;

pub use aug::{augment, Transform, AUGMENTATIONS};
pub use cache::{cache_path, fingerprint, load_or_build, read_cache, write_cache};
pub use loader::{decode_image, decode_label, load_record, load_records};
pub use types::*;
