//! Shared data contracts for sample catalogs and dataset modes.

pub mod catalog;

pub use catalog::{read_catalog, CatalogError, CatalogRow, DatasetMode, OriginalDims};
