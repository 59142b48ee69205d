//! 查询文本编码器
//!
//! 检索需要两个编码器：把文本映射到图像特征空间的跨模态编码器（CLIP 文本塔），
//! 以及句向量编码器（SBERT）。二者都由调用方注入。

#[cfg(feature = "fastembed")]
mod fastembed;

use anyhow::Result;
use ndarray::Array2;

#[cfg(feature = "fastembed")]
pub use self::fastembed::FastEmbedEncoder;

/// 把文本编码到图像特征空间
pub trait CrossModalEncoder: Send + Sync {
    /// 返回形状为 (queries.len(), d) 的矩阵，无需单位化
    fn encode_text(&self, queries: &[String]) -> Result<Array2<f32>>;
}

/// 把文本编码到句向量空间
pub trait TextEncoder: Send + Sync {
    /// 返回形状为 (queries.len(), d) 的矩阵
    fn encode(&self, queries: &[String]) -> Result<Array2<f32>>;
}

/// 把一批等长向量拼成矩阵
pub(crate) fn to_matrix(rows: Vec<Vec<f32>>) -> Result<Array2<f32>> {
    let n = rows.len();
    let d = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != d) {
        anyhow::bail!("编码器返回的向量长度不一致");
    }
    Ok(Array2::from_shape_vec((n, d), rows.into_iter().flatten().collect())?)
}
