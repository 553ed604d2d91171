//! Binary dataset cache keyed by catalog fingerprint.
//!
//! Layout (little-endian):
//! - header: `NSC1` magic, u32 format version, 32-byte SHA-256 fingerprint, u32 mode, u64 record count
//! - per record: u32 id length + utf-8 id, u32 has-dims + u32 width + u32 height,
//!   u32 variant count, u32 has-labels, then each image (and each label) as
//!   u32 channels, u32 height, u32 width, f32 data.

use crate::loader::load_records;
use crate::types::{ChwImage, Dataset, DatasetError, DatasetResult, SampleRecord};
use data_contracts::{read_catalog, DatasetMode, OriginalDims};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const CACHE_MAGIC: &[u8; 4] = b"NSC1";
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Cache file for one split: `<cache_dir>/<mode>.bin`.
pub fn cache_path(cache_dir: &Path, mode: DatasetMode) -> PathBuf {
    cache_dir.join(format!("{}.bin", mode.as_str()))
}

/// SHA-256 over the catalog bytes, the mode name, and the cache format version.
pub fn fingerprint(catalog_bytes: &[u8], mode: DatasetMode) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(catalog_bytes);
    hasher.update(mode.as_str().as_bytes());
    hasher.update(CACHE_FORMAT_VERSION.to_le_bytes());
    hasher.finalize().into()
}

fn mode_code(mode: DatasetMode) -> u32 {
    match mode {
        DatasetMode::Train => 0,
        DatasetMode::Val => 1,
        DatasetMode::Test => 2,
    }
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_image(buf: &mut Vec<u8>, img: &ChwImage) {
    put_u32(buf, img.channels as u32);
    put_u32(buf, img.height as u32);
    put_u32(buf, img.width as u32);
    for v in &img.data {
        buf.extend_from_slice(&v.to_le_bytes());
    }
}

fn encode_record(buf: &mut Vec<u8>, record: &SampleRecord) {
    put_u32(buf, record.id.len() as u32);
    buf.extend_from_slice(record.id.as_bytes());
    match record.original {
        Some(dims) => {
            put_u32(buf, 1);
            put_u32(buf, dims.width);
            put_u32(buf, dims.height);
        }
        None => {
            put_u32(buf, 0);
            put_u32(buf, 0);
            put_u32(buf, 0);
        }
    }
    put_u32(buf, record.images.len() as u32);
    put_u32(buf, record.labels.is_some() as u32);
    for img in &record.images {
        put_image(buf, img);
    }
    if let Some(labels) = &record.labels {
        for lbl in labels {
            put_image(buf, lbl);
        }
    }
}

/// Persist a dataset, creating the cache directory if needed.
pub fn write_cache(path: &Path, fingerprint: &[u8; 32], dataset: &Dataset) -> DatasetResult<()> {
    let io_err = |p: &Path| {
        let p = p.to_path_buf();
        move |source| DatasetError::Io { path: p, source }
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let file = fs::File::create(path).map_err(io_err(path))?;
    let mut out = BufWriter::new(file);

    let mut header = Vec::with_capacity(52);
    header.extend_from_slice(CACHE_MAGIC);
    put_u32(&mut header, CACHE_FORMAT_VERSION);
    header.extend_from_slice(fingerprint);
    put_u32(&mut header, mode_code(dataset.mode));
    header.extend_from_slice(&(dataset.records.len() as u64).to_le_bytes());
    out.write_all(&header).map_err(io_err(path))?;

    let mut buf = Vec::new();
    for record in &dataset.records {
        buf.clear();
        encode_record(&mut buf, record);
        out.write_all(&buf).map_err(io_err(path))?;
    }
    out.flush().map_err(io_err(path))
}

struct Reader<'a> {
    path: &'a Path,
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> DatasetResult<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(self.corrupt("truncated")),
        }
    }

    fn u32(&mut self) -> DatasetResult<u32> {
        let mut arr = [0u8; 4];
        arr.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(arr))
    }

    fn u64(&mut self) -> DatasetResult<u64> {
        let mut arr = [0u8; 8];
        arr.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(arr))
    }

    fn image(&mut self) -> DatasetResult<ChwImage> {
        let c = self.u32()? as usize;
        let h = self.u32()? as usize;
        let w = self.u32()? as usize;
        let elems = c
            .checked_mul(h)
            .and_then(|v| v.checked_mul(w))
            .ok_or_else(|| self.corrupt("overflow computing image elems"))?;
        let bytes = elems
            .checked_mul(std::mem::size_of::<f32>())
            .ok_or_else(|| self.corrupt("overflow computing image bytes"))?;
        let data = self
            .take(bytes)?
            .chunks_exact(4)
            .map(|b| {
                let mut arr = [0u8; 4];
                arr.copy_from_slice(b);
                f32::from_le_bytes(arr)
            })
            .collect();
        Ok(ChwImage::new(c, h, w, data))
    }

    fn corrupt(&self, msg: &str) -> DatasetError {
        DatasetError::Cache {
            path: self.path.to_path_buf(),
            msg: msg.to_string(),
        }
    }
}

/// Read a cache file, failing on bad magic, version, fingerprint, mode, or truncation.
pub fn read_cache(
    path: &Path,
    expected: &[u8; 32],
    mode: DatasetMode,
) -> DatasetResult<Dataset> {
    let data = fs::read(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut r = Reader {
        path,
        data: &data,
        pos: 0,
    };
    if r.take(4)? != CACHE_MAGIC {
        return Err(r.corrupt("bad magic"));
    }
    let version = r.u32()?;
    if version != CACHE_FORMAT_VERSION {
        return Err(r.corrupt(&format!(
            "format version mismatch {} vs {}",
            version, CACHE_FORMAT_VERSION
        )));
    }
    if r.take(32)? != expected.as_slice() {
        return Err(r.corrupt("catalog fingerprint mismatch"));
    }
    if r.u32()? != mode_code(mode) {
        return Err(r.corrupt("mode mismatch"));
    }
    let count = r.u64()? as usize;

    let mut records = Vec::new();
    for _ in 0..count {
        let id_len = r.u32()? as usize;
        let id = String::from_utf8(r.take(id_len)?.to_vec())
            .map_err(|_| r.corrupt("id is not utf-8"))?;
        let has_dims = r.u32()? != 0;
        let width = r.u32()?;
        let height = r.u32()?;
        let variants = r.u32()? as usize;
        let has_labels = r.u32()? != 0;
        let images = (0..variants)
            .map(|_| r.image())
            .collect::<DatasetResult<Vec<_>>>()?;
        let labels = if has_labels {
            Some(
                (0..variants)
                    .map(|_| r.image())
                    .collect::<DatasetResult<Vec<_>>>()?,
            )
        } else {
            None
        };
        records.push(SampleRecord {
            id,
            images,
            labels,
            original: has_dims.then_some(OriginalDims { width, height }),
        });
    }
    if r.pos != data.len() {
        return Err(r.corrupt("trailing bytes"));
    }
    Ok(Dataset { mode, records })
}

/// Load a split from its cache, rebuilding from the catalog when the cache is
/// missing, unreadable, or stale.
pub fn load_or_build(catalog: &Path, cache_dir: &Path, mode: DatasetMode) -> DatasetResult<Dataset> {
    let catalog_bytes = fs::read(catalog).map_err(|source| DatasetError::Io {
        path: catalog.to_path_buf(),
        source,
    })?;
    let key = fingerprint(&catalog_bytes, mode);
    let path = cache_path(cache_dir, mode);

    if path.exists() {
        match read_cache(&path, &key, mode) {
            Ok(dataset) => {
                log::info!(
                    "loaded {} {} records from cache {}",
                    dataset.len(),
                    mode,
                    path.display()
                );
                return Ok(dataset);
            }
            Err(err) => log::warn!("rebuilding {mode} cache: {err}"),
        }
    } else {
        log::warn!(
            "no {mode} cache at {}; building from {}",
            path.display(),
            catalog.display()
        );
    }

    let rows = read_catalog(catalog, mode)?;
    let dataset = Dataset {
        mode,
        records: load_records(&rows, mode)?,
    };
    if let Err(err) = write_cache(&path, &key, &dataset) {
        log::warn!("could not persist {mode} cache: {err}");
    }
    log::info!("built {} {} records from {}", dataset.len(), mode, catalog.display());
    Ok(dataset)
}
