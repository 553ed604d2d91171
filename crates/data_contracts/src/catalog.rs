use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Which split a catalog describes. Controls augmentation and which columns are required.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DatasetMode {
    Train,
    Val,
    Test,
}

impl DatasetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetMode::Train => "train",
            DatasetMode::Val => "val",
            DatasetMode::Test => "test",
        }
    }

    /// Train and validation rows carry a ground-truth mask.
    pub fn is_labelled(&self) -> bool {
        !matches!(self, DatasetMode::Test)
    }

    /// Only training records are expanded into augmented variants.
    pub fn augments(&self) -> bool {
        matches!(self, DatasetMode::Train)
    }
}

impl fmt::Display for DatasetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unpadded image size as recorded before external padding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OriginalDims {
    pub width: u32,
    pub height: u32,
}

/// One row of a sample catalog (`Image`, `Label`, `ID`, `Width`, `Height`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogRow {
    #[serde(rename = "Image")]
    pub image: PathBuf,
    #[serde(rename = "Label", default, deserialize_with = "empty_as_none")]
    pub label: Option<PathBuf>,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Width", default)]
    pub width: Option<u32>,
    #[serde(rename = "Height", default)]
    pub height: Option<u32>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("catalog {path} row {row}: empty image path")]
    MissingImage { path: PathBuf, row: usize },
    #[error("catalog {path} row {row} ({id}): label path required for {mode} samples")]
    MissingLabel {
        path: PathBuf,
        row: usize,
        id: String,
        mode: DatasetMode,
    },
    #[error("catalog {path} row {row} ({id}): original width/height required for {mode} samples")]
    MissingDims {
        path: PathBuf,
        row: usize,
        id: String,
        mode: DatasetMode,
    },
    #[error("catalog {path} row {row} ({id}): original dims must be non-zero, got {width}x{height}")]
    ZeroDims {
        path: PathBuf,
        row: usize,
        id: String,
        width: u32,
        height: u32,
    },
    #[error("catalog {path} row {row}: empty sample id")]
    MissingId { path: PathBuf, row: usize },
}

impl CatalogRow {
    pub fn original_dims(&self) -> Option<OriginalDims> {
        match (self.width, self.height) {
            (Some(width), Some(height)) => Some(OriginalDims { width, height }),
            _ => None,
        }
    }

    fn validate(&self, path: &Path, row: usize, mode: DatasetMode) -> Result<(), CatalogError> {
        if self.image.as_os_str().is_empty() {
            return Err(CatalogError::MissingImage {
                path: path.to_path_buf(),
                row,
            });
        }
        if self.id.trim().is_empty() {
            return Err(CatalogError::MissingId {
                path: path.to_path_buf(),
                row,
            });
        }
        if mode.is_labelled() && self.label.is_none() {
            return Err(CatalogError::MissingLabel {
                path: path.to_path_buf(),
                row,
                id: self.id.clone(),
                mode,
            });
        }
        if mode == DatasetMode::Test {
            let dims = self.original_dims().ok_or_else(|| CatalogError::MissingDims {
                path: path.to_path_buf(),
                row,
                id: self.id.clone(),
                mode,
            })?;
            if dims.width == 0 || dims.height == 0 {
                return Err(CatalogError::ZeroDims {
                    path: path.to_path_buf(),
                    row,
                    id: self.id.clone(),
                    width: dims.width,
                    height: dims.height,
                });
            }
        }
        Ok(())
    }

    fn resolve_against(mut self, base: &Path) -> Self {
        if self.image.is_relative() {
            self.image = base.join(&self.image);
        }
        if let Some(label) = self.label.take() {
            self.label = Some(if label.is_relative() {
                base.join(label)
            } else {
                label
            });
        }
        self
    }
}

/// Read and validate a catalog. Relative paths resolve against the catalog's directory.
pub fn read_catalog(path: &Path, mode: DatasetMode) -> Result<Vec<CatalogRow>, CatalogError> {
    let read_err = |source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(read_err)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut rows = Vec::new();
    for (idx, record) in reader.deserialize::<CatalogRow>().enumerate() {
        let row = record.map_err(read_err)?;
        row.validate(path, idx + 1, mode)?;
        rows.push(row.resolve_against(base));
    }
    Ok(rows)
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()).map(PathBuf::from))
}
