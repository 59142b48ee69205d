mod common;

use std::fs;

use assetsearch::catalog::{AssetCatalog, AssetOrigin, BoundingBox, TEXT_UIDS};
use assetsearch::config::DataDir;
use assetsearch::{Error, SharedCatalog};
use common::*;
use ndarray::Axis;
use rstest::*;
use serde_json::json;
use tempfile::TempDir;

#[fixture]
fn data() -> (TempDir, DataDir) {
    sample_data().unwrap()
}

fn build(data: &DataDir) -> assetsearch::Result<AssetCatalog> {
    AssetCatalog::build(&data.sources(), &data.objathor_assets(), false)
}

#[rstest]
fn test_build_from_disk(data: (TempDir, DataDir)) {
    let (_root, data) = data;
    let catalog = build(&data).unwrap();

    // table 被精选数据源覆盖，lamp 没有资产文件
    assert_eq!(catalog.asset_ids(), ["chair", "thor_chair", "table"]);
    assert_eq!(catalog.origin(0), AssetOrigin::OpenCatalog);
    assert_eq!(catalog.origin(2), AssetOrigin::Curated);

    let stats = catalog.stats();
    assert_eq!(stats.sources, vec![("objathor".to_string(), 3), ("thor".to_string(), 2)]);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.available, 3);
    assert_eq!(stats.total(), 5);
}

#[rstest]
fn test_rows_aligned_and_normalized(data: (TempDir, DataDir)) {
    let (_root, data) = data;
    let catalog = build(&data).unwrap();

    let image = catalog.image_features();
    assert_eq!(image.dim(), (3, 1, 2));
    assert_eq!(catalog.text_features().dim(), (3, 2));

    for view in image.lanes(Axis(2)) {
        let norm = view.dot(&view).sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
    // chair 的原始特征为 [3, 4]
    assert!((image[[0, 0, 0]] - 0.6).abs() < 1e-6);
    assert!((image[[0, 0, 1]] - 0.8).abs() < 1e-6);
    // 文本特征保持原样，table 的行来自精选数据源
    assert_eq!(catalog.text_features().row(2).to_vec(), vec![0.1, 0.9]);
}

#[rstest]
fn test_annotations_later_source_wins(data: (TempDir, DataDir)) {
    let (_root, data) = data;
    let catalog = build(&data).unwrap();

    assert_eq!(catalog.category("table"), Some("dining table"));
    assert_eq!(catalog.bounding_box("table"), Some(BoundingBox::new(2.0, 0.75, 1.0)));
    // 被过滤的资产仍然保留标注
    assert_eq!(catalog.category("lamp"), Some("lamp"));
}

#[rstest]
fn test_misaligned_uids(data: (TempDir, DataDir)) {
    let (_root, data) = data;
    write_json(&data.thor_features().join(TEXT_UIDS), &json!(["table", "thor_chair"])).unwrap();

    let err = build(&data).unwrap_err();
    assert!(matches!(err, Error::Misaligned { ref source_name, .. } if source_name == "thor"));
}

#[rstest]
fn test_missing_annotations(data: (TempDir, DataDir)) {
    let (_root, data) = data;
    fs::remove_file(data.thor_annotations()).unwrap();

    let err = build(&data).unwrap_err();
    assert!(matches!(err, Error::MissingFile(path) if path == data.thor_annotations()));
}

#[rstest]
fn test_all_assets_missing(data: (TempDir, DataDir)) {
    let (_root, data) = data;
    fs::remove_dir_all(data.objathor_assets().root()).unwrap();

    let catalog = build(&data).unwrap();
    // 精选资产不需要资产文件
    assert_eq!(catalog.asset_ids(), ["thor_chair", "table"]);
    assert_eq!(catalog.stats().dropped, 2);
}

#[rstest]
fn test_shared_catalog_from_disk(data: (TempDir, DataDir)) {
    let (_root, data) = data;
    let shared = SharedCatalog::new();
    assert!(shared.get().is_none());

    let first = shared.get_or_build(|| build(&data)).unwrap();
    let second = shared.get_or_build(|| panic!("不应重复构建")).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

#[rstest]
#[tokio::test]
async fn test_open_catalog_once_per_process(data: (TempDir, DataDir)) {
    let (_root, data) = data;
    let first = assetsearch::cli::open_catalog(&data).await.unwrap();
    assert_eq!(first.len(), 3);

    // 已构建后不再读取数据目录
    let empty = TempDir::new().unwrap();
    let other = DataDir::new(empty.path(), RELEASE);
    let second = assetsearch::cli::open_catalog(&other).await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}
