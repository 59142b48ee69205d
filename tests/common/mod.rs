#![allow(dead_code)]
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use assetsearch::catalog::{IMAGE_FEATURES, IMAGE_UIDS, TEXT_FEATURES, TEXT_UIDS};
use assetsearch::config::DataDir;
use assetsearch::encoder::{CrossModalEncoder, TextEncoder};
use flate2::Compression;
use flate2::write::GzEncoder;
use ndarray::prelude::*;
use ndarray_npy::{WritableElement, write_npy};
use serde_json::{Value, json};
use tempfile::TempDir;

pub const RELEASE: &str = "2023_09_23";

/// 按查询文本返回固定向量的编码器
pub struct FixedEncoder {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl FixedEncoder {
    pub fn new(dim: usize, vectors: &[(&str, &[f32])]) -> Arc<Self> {
        let vectors = vectors.iter().map(|(k, v)| (k.to_string(), v.to_vec())).collect();
        Arc::new(Self { dim, vectors })
    }

    fn lookup(&self, texts: &[String]) -> Array2<f32> {
        let mut out = Array2::zeros((texts.len(), self.dim));
        for (mut row, text) in out.rows_mut().into_iter().zip(texts) {
            if let Some(v) = self.vectors.get(text) {
                row.assign(&ArrayView1::from(v.as_slice()));
            }
        }
        out
    }
}

impl CrossModalEncoder for FixedEncoder {
    fn encode_text(&self, texts: &[String]) -> Result<Array2<f32>> {
        Ok(self.lookup(texts))
    }
}

impl TextEncoder for FixedEncoder {
    fn encode(&self, texts: &[String]) -> Result<Array2<f32>> {
        Ok(self.lookup(texts))
    }
}

pub fn write_json(path: &Path, value: &Value) -> Result<()> {
    fs::create_dir_all(path.parent().unwrap())?;
    fs::write(path, serde_json::to_vec(value)?)?;
    Ok(())
}

pub fn write_gz_json(path: &Path, value: &Value) -> Result<()> {
    fs::create_dir_all(path.parent().unwrap())?;
    let mut encoder = GzEncoder::new(File::create(path)?, Compression::default());
    encoder.write_all(&serde_json::to_vec(value)?)?;
    encoder.finish()?;
    Ok(())
}

/// 写入一个数据源的特征目录
pub fn write_features<A, D>(dir: &Path, uids: &[&str], image: &Array<A, D>, text: &Array2<f32>) -> Result<()>
where
    A: WritableElement,
    D: Dimension,
{
    fs::create_dir_all(dir)?;
    write_npy(dir.join(IMAGE_FEATURES), image)?;
    write_npy(dir.join(TEXT_FEATURES), text)?;
    write_json(&dir.join(IMAGE_UIDS), &json!(uids))?;
    write_json(&dir.join(TEXT_UIDS), &json!(uids))?;
    Ok(())
}

pub fn touch_asset(data: &DataDir, id: &str) -> Result<()> {
    let path = data.objathor_assets().asset_path(id);
    fs::create_dir_all(path.parent().unwrap())?;
    File::create(path)?;
    Ok(())
}

fn annotation(category: &str, bbox: [f32; 3]) -> Value {
    json!({
        "category": category,
        "assetMetadata": {
            "boundingBox": { "x": bbox[0], "y": bbox[1], "z": bbox[2] }
        }
    })
}

/// 构造一套完整的数据目录
///
/// objathor: chair, table, lamp（lamp 没有资产文件）
/// thor: thor_chair, table（覆盖 objathor 的 table）
pub fn sample_data() -> Result<(TempDir, DataDir)> {
    let root = TempDir::new()?;
    let data = DataDir::new(root.path(), RELEASE);

    let objathor_ids = ["chair", "table", "lamp"];
    let image = array![[[3f32, 4.]], [[0., 2.]], [[1., 1.]]];
    let text = array![[1., 0.], [0., 1.], [0.5, 0.5]];
    write_features(&data.objathor_features(), &objathor_ids, &image, &text)?;
    write_gz_json(
        &data.objathor_annotations(),
        &json!({
            "chair": annotation("chair", [0.5, 1.0, 0.5]),
            "table": annotation("table", [1.2, 0.8, 0.6]),
            "lamp": annotation("lamp", [0.3, 1.5, 0.3]),
        }),
    )?;
    touch_asset(&data, "chair")?;
    touch_asset(&data, "table")?;

    // 精选数据源使用二维图像特征和 float64
    let thor_ids = ["thor_chair", "table"];
    let image = array![[0.8f64, 0.6], [0.0, 1.0]];
    let text = array![[0.9, 0.1], [0.1, 0.9]];
    write_features(&data.thor_features(), &thor_ids, &image, &text)?;
    write_gz_json(
        &data.thor_annotations(),
        &json!({
            "thor_chair": annotation("chair", [0.6, 0.9, 0.6]),
            "table": annotation("dining table", [2.0, 0.75, 1.0]),
        }),
    )?;

    Ok((root, data))
}
