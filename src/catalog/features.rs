use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;
use ndarray::prelude::*;
use ndarray_npy::{ReadNpyError, read_npy};

use crate::error::{Error, Result};

/// 图像特征矩阵文件名
pub const IMAGE_FEATURES: &str = "clip_features.npy";
/// 图像特征矩阵对应的 ID 列表
pub const IMAGE_UIDS: &str = "clip_uids.json";
/// 文本特征矩阵文件名
pub const TEXT_FEATURES: &str = "sbert_features.npy";
/// 文本特征矩阵对应的 ID 列表
pub const TEXT_UIDS: &str = "sbert_uids.json";

/// 单个数据源的特征，行与 `uids` 一一对应
#[derive(Debug, Clone)]
pub struct SourceFeatures {
    pub uids: Vec<String>,
    /// 图像特征，形状为 (n, views, d)
    pub image: Array3<f32>,
    /// 文本特征，形状为 (n, d)
    pub text: Array2<f32>,
}

impl SourceFeatures {
    pub fn len(&self) -> usize {
        self.uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }
}

/// 从特征目录中加载图像和文本两组特征，并检查二者的 ID 顺序
///
/// # Arguments
///
/// * `name` - 数据源名称，用于报错
/// * `dir` - 特征目录
pub fn load_features(name: &str, dir: impl AsRef<Path>) -> Result<SourceFeatures> {
    let dir = dir.as_ref();

    let image_uids = read_uids(&dir.join(IMAGE_UIDS))?;
    let text_uids = read_uids(&dir.join(TEXT_UIDS))?;
    check_alignment(name, &image_uids, &text_uids)?;

    let image_path = dir.join(IMAGE_FEATURES);
    let image = into_views(read_matrix(&image_path)?, &image_path)?;
    check_rows(&image_path, image.len_of(Axis(0)), image_uids.len())?;

    let text_path = dir.join(TEXT_FEATURES);
    let text = read_matrix(&text_path)?.into_dimensionality::<Ix2>().map_err(|_| Error::Shape {
        path: text_path.clone(),
        reason: "文本特征必须是二维矩阵".to_string(),
    })?;
    check_rows(&text_path, text.nrows(), text_uids.len())?;

    debug!(
        "{name}: {} 个资产, 图像特征 {:?}, 文本特征 {:?}",
        image_uids.len(),
        image.dim(),
        text.dim()
    );

    Ok(SourceFeatures { uids: image_uids, image, text })
}

/// 检查同一数据源两组特征的 ID 列表完全一致
pub fn check_alignment(name: &str, image_uids: &[String], text_uids: &[String]) -> Result<()> {
    if image_uids == text_uids {
        return Ok(());
    }
    let detail = match image_uids.iter().zip(text_uids).position(|(a, b)| a != b) {
        Some(i) => format!("第 {} 个 ID 不同: {} != {}", i, image_uids[i], text_uids[i]),
        None => "数量不同".to_string(),
    };
    Err(Error::Misaligned {
        source_name: name.to_string(),
        image_count: image_uids.len(),
        text_count: text_uids.len(),
        detail,
    })
}

fn read_uids(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|source| Error::Json { path: path.to_path_buf(), source })
}

/// 读取 npy 矩阵，f64 矩阵会被转换为 f32
fn read_matrix(path: &Path) -> Result<ArrayD<f32>> {
    if !path.exists() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    match read_npy::<_, ArrayD<f32>>(path) {
        Ok(matrix) => Ok(matrix),
        Err(ReadNpyError::WrongDescriptor(_)) => read_npy::<_, ArrayD<f64>>(path)
            .map(|matrix| matrix.mapv(|v| v as f32))
            .map_err(|source| Error::Npy { path: path.to_path_buf(), source }),
        Err(source) => Err(Error::Npy { path: path.to_path_buf(), source }),
    }
}

/// 二维图像特征视为只有一个视角
fn into_views(matrix: ArrayD<f32>, path: &Path) -> Result<Array3<f32>> {
    let matrix = match matrix.ndim() {
        2 => matrix.insert_axis(Axis(1)),
        3 => matrix,
        n => {
            return Err(Error::Shape {
                path: path.to_path_buf(),
                reason: format!("图像特征应为二维或三维，实际为 {n} 维"),
            });
        }
    };
    let matrix = matrix.into_dimensionality::<Ix3>().map_err(|e| Error::Shape {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if matrix.len_of(Axis(1)) == 0 {
        return Err(Error::Shape { path: path.to_path_buf(), reason: "视角数量为 0".to_string() });
    }
    Ok(matrix)
}

fn check_rows(path: &Path, rows: usize, uids: usize) -> Result<()> {
    if rows != uids {
        return Err(Error::Shape {
            path: path.to_path_buf(),
            reason: format!("矩阵有 {rows} 行，但 ID 列表有 {uids} 个"),
        });
    }
    Ok(())
}
