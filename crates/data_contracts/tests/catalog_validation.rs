use data_contracts::catalog::{read_catalog, CatalogError, DatasetMode, OriginalDims};
use std::fs;

fn write_catalog(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write catalog");
    path
}

#[test]
fn train_rows_resolve_relative_paths() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_catalog(
        &dir,
        "samples.csv",
        "Image,Label,Width,Height,ID\nimages/a.png,labels/a.png,250,260,a\n",
    );
    let rows = read_catalog(&path, DatasetMode::Train).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "a");
    assert_eq!(rows[0].image, dir.path().join("images/a.png"));
    assert_eq!(rows[0].label, Some(dir.path().join("labels/a.png")));
    assert_eq!(
        rows[0].original_dims(),
        Some(OriginalDims {
            width: 250,
            height: 260
        })
    );
}

#[test]
fn test_rows_do_not_need_labels() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_catalog(
        &dir,
        "test.csv",
        "Image,ID,Width,Height\n/abs/x.png,x,255,255\n",
    );
    let rows = read_catalog(&path, DatasetMode::Test).unwrap();
    assert_eq!(rows[0].label, None);
    assert_eq!(rows[0].image, std::path::PathBuf::from("/abs/x.png"));
}

#[test]
fn missing_label_is_fatal_for_labelled_modes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_catalog(&dir, "val.csv", "Image,Label,ID\na.png,,a\n");
    let err = read_catalog(&path, DatasetMode::Val).unwrap_err();
    assert!(matches!(err, CatalogError::MissingLabel { row: 1, .. }));
}

#[test]
fn test_rows_require_original_dims() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_catalog(&dir, "test.csv", "Image,ID,Width,Height\na.png,a,,\n");
    let err = read_catalog(&path, DatasetMode::Test).unwrap_err();
    assert!(matches!(err, CatalogError::MissingDims { .. }));

    let path = write_catalog(&dir, "zero.csv", "Image,ID,Width,Height\na.png,a,0,12\n");
    let err = read_catalog(&path, DatasetMode::Test).unwrap_err();
    assert!(matches!(err, CatalogError::ZeroDims { width: 0, .. }));
}

#[test]
fn unreadable_catalog_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.csv");
    let err = read_catalog(&missing, DatasetMode::Train).unwrap_err();
    assert!(err.to_string().contains("nope.csv"));
}
