use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_CONFIG_NAME: &str = "nuclei-seg.toml";
pub const CONFIG_ENV: &str = "NUCLEI_SEG_CONFIG";

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub inputs_root: PathBuf,
    pub train_catalog: PathBuf,
    pub val_catalog: PathBuf,
    pub test_catalog: PathBuf,
    pub cache_dir: PathBuf,
    pub outputs_root: PathBuf,
    pub test_group: String,
    pub tile_size: usize,
    pub threshold: f32,
    pub checkpoint_every: usize,
    pub base_channels: usize,
    pub depth: usize,
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from_file(RunConfigFile::default())
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RunConfigFile {
    inputs_root: Option<String>,
    train_catalog: Option<String>,
    val_catalog: Option<String>,
    test_catalog: Option<String>,
    cache_dir: Option<String>,
    outputs_root: Option<String>,
    test_group: Option<String>,
    tile_size: Option<usize>,
    threshold: Option<f32>,
    checkpoint_every: Option<usize>,
    base_channels: Option<usize>,
    depth: Option<usize>,
    seed: Option<u64>,
}

impl RunConfig {
    /// Load from `$NUCLEI_SEG_CONFIG`, else `nuclei-seg.toml`, else defaults.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME));
        Self::load_or_default(&path)
    }

    /// Missing file means defaults; an unreadable or invalid file warns and uses defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let cfg = match Self::from_path(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("run config {}: {err}; using defaults", path.display());
                Self::default()
            }
        };
        cfg.warn_if_invalid();
        cfg
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: RunConfigFile = toml::from_str(&raw)?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: RunConfigFile) -> Self {
        let inputs_root = file
            .inputs_root
            .map(|v| expand_path(&v))
            .unwrap_or_else(|| PathBuf::from("inputs"));
        let train_catalog = file
            .train_catalog
            .map(|v| expand_path(&v))
            .unwrap_or_else(|| inputs_root.join("stage_1_train/samples.csv"));
        let val_catalog = file
            .val_catalog
            .map(|v| expand_path(&v))
            .unwrap_or_else(|| inputs_root.join("stage_1_test/vsamples.csv"));
        let test_catalog = file
            .test_catalog
            .map(|v| expand_path(&v))
            .unwrap_or_else(|| inputs_root.join("stage_2_test/samples.csv"));
        let cache_dir = file
            .cache_dir
            .map(|v| expand_path(&v))
            .unwrap_or_else(|| inputs_root.join("cropped"));

        RunConfig {
            inputs_root,
            train_catalog,
            val_catalog,
            test_catalog,
            cache_dir,
            outputs_root: file
                .outputs_root
                .map(|v| expand_path(&v))
                .unwrap_or_else(|| PathBuf::from(".")),
            test_group: file
                .test_group
                .filter(|g| !g.trim().is_empty())
                .unwrap_or_else(|| "stage_2_test".to_string()),
            tile_size: file.tile_size.unwrap_or(vision_core::DEFAULT_TILE_SIZE),
            threshold: file.threshold.unwrap_or(0.5),
            checkpoint_every: file.checkpoint_every.unwrap_or(10),
            base_channels: file.base_channels.unwrap_or(16),
            depth: file.depth.unwrap_or(7),
            seed: file.seed,
        }
    }

    fn warn_if_invalid(&self) {
        if self.tile_size == 0 {
            log::warn!("run config: tile_size is 0; training will refuse to start");
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            log::warn!(
                "run config: threshold {} is outside 0..=1; masks will be all foreground or empty",
                self.threshold
            );
        }
        if self.checkpoint_every == 0 {
            log::warn!("run config: checkpoint_every is 0; no checkpoints will be written");
        }
    }
}

fn expand_path(raw: &str) -> PathBuf {
    let mut out = raw.to_string();
    if let Some(stripped) = out.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            out = format!("{home}{stripped}");
        }
    }
    PathBuf::from(expand_env(&out))
}

/// Replace `${VAR}` with its value; unknown variables are left as written.
fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match std::env::var(key) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => out.push_str(&rest[start..start + end + 3]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
