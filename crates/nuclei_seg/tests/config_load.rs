use nuclei_seg::RunConfig;
use std::fs;
use std::path::PathBuf;

#[test]
fn partial_file_keeps_defaults_and_derives_catalogs_from_inputs_root() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nuclei-seg.toml");
    fs::write(
        &path,
        r#"
inputs_root = "/data/dsb"
tile_size = 128
seed = 42
"#,
    )?;

    let cfg = RunConfig::from_path(&path)?;
    assert_eq!(cfg.inputs_root, PathBuf::from("/data/dsb"));
    assert_eq!(
        cfg.train_catalog,
        PathBuf::from("/data/dsb/stage_1_train/samples.csv")
    );
    assert_eq!(
        cfg.val_catalog,
        PathBuf::from("/data/dsb/stage_1_test/vsamples.csv")
    );
    assert_eq!(cfg.cache_dir, PathBuf::from("/data/dsb/cropped"));
    assert_eq!(cfg.tile_size, 128);
    assert_eq!(cfg.seed, Some(42));
    assert_eq!(cfg.threshold, 0.5);
    assert_eq!(cfg.checkpoint_every, 10);
    assert_eq!(cfg.test_group, "stage_2_test");
    Ok(())
}

#[test]
fn explicit_paths_win_and_expand_env() -> anyhow::Result<()> {
    std::env::set_var("NUCLEI_SEG_TEST_OUT", "/tmp/nuclei-out");
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("run.toml");
    fs::write(
        &path,
        r#"
test_catalog = "elsewhere/test.csv"
outputs_root = "${NUCLEI_SEG_TEST_OUT}/runs"
test_group = "holdout"
"#,
    )?;

    let cfg = RunConfig::from_path(&path)?;
    assert_eq!(cfg.test_catalog, PathBuf::from("elsewhere/test.csv"));
    assert_eq!(cfg.outputs_root, PathBuf::from("/tmp/nuclei-out/runs"));
    assert_eq!(cfg.test_group, "holdout");
    assert_eq!(cfg.train_catalog, PathBuf::from("inputs/stage_1_train/samples.csv"));
    Ok(())
}

#[test]
fn unknown_keys_are_rejected_and_fall_back_to_defaults() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bad.toml");
    fs::write(&path, "tile = 64\n")?;

    assert!(RunConfig::from_path(&path).is_err());
    assert_eq!(RunConfig::load_or_default(&path), RunConfig::default());
    assert_eq!(
        RunConfig::load_or_default(&dir.path().join("missing.toml")),
        RunConfig::default()
    );
    Ok(())
}
