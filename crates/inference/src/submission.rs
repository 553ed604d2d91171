use serde::Serialize;
use std::fs::File;
use std::path::Path;
use vision_core::rle::{format_rle, instance_rles, BinaryMask};

#[derive(Debug, Serialize)]
struct SubmissionRow<'a> {
    #[serde(rename = "ImageId")]
    image_id: &'a str,
    #[serde(rename = "EncodedPixels")]
    encoded_pixels: String,
}

/// `ImageId,EncodedPixels` CSV with one row per connected instance.
pub struct SubmissionWriter {
    writer: csv::Writer<File>,
}

impl SubmissionWriter {
    /// Create the file (and its parent directory) and write the header.
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        writer.write_record(["ImageId", "EncodedPixels"])?;
        Ok(Self { writer })
    }

    /// Append one row per 8-connected component of `mask`. Returns the number of rows written.
    pub fn write_mask(&mut self, image_id: &str, mask: &BinaryMask) -> anyhow::Result<usize> {
        let rles = instance_rles(mask);
        for runs in &rles {
            self.writer.serialize(SubmissionRow {
                image_id,
                encoded_pixels: format_rle(runs),
            })?;
        }
        Ok(rles.len())
    }

    pub fn finish(mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
