use std::path::PathBuf;

use thiserror::Error;

/// 检索引擎的错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 必需的数据文件不存在
    #[error("文件不存在: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("读取 {} 失败: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("解析 {} 失败: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("读取特征矩阵 {} 失败: {source}", path.display())]
    Npy {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    /// 特征矩阵的形状不符合要求
    #[error("特征矩阵 {} 形状无效: {reason}", path.display())]
    Shape { path: PathBuf, reason: String },

    /// 同一数据源的图像特征与文本特征 ID 顺序不一致
    #[error(
        "数据源 {source_name} 的特征 ID 不一致: 图像特征 {image_count} 个, 文本特征 {text_count} 个, {detail}"
    )]
    Misaligned { source_name: String, image_count: usize, text_count: usize, detail: String },

    /// 编码器调用失败
    #[error("编码器错误: {0}")]
    Encoder(#[source] anyhow::Error),

    /// 编码器输出的维度与目录不匹配
    #[error("{channel} 编码器输出形状 {actual:?}，期望 {expected:?}")]
    Dimension { channel: &'static str, expected: (usize, usize), actual: (usize, usize) },

    /// 重排序时遇到没有包围盒信息的资产
    #[error("资产 {0} 缺少包围盒信息")]
    MissingBoundingBox(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
