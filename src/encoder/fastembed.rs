use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use ::fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use log::info;
use ndarray::Array2;

use super::{CrossModalEncoder, TextEncoder, to_matrix};

/// 基于 fastembed 的本地文本编码器
///
/// fastembed 的 `embed()` 需要 `&mut self`，所以这里用 Mutex 包一层。
pub struct FastEmbedEncoder {
    model: Mutex<TextEmbedding>,
    name: String,
}

impl FastEmbedEncoder {
    /// 加载模型，首次使用时会下载到 `cache_dir`
    pub fn new(name: &str, cache_dir: PathBuf) -> Result<Self> {
        let model = parse_model_name(name)?;
        info!("加载编码器模型: {name}");
        let options =
            InitOptions::new(model).with_cache_dir(cache_dir).with_show_download_progress(true);
        let model = TextEmbedding::try_new(options)?;
        Ok(Self { model: Mutex::new(model), name: name.to_string() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn embed(&self, queries: &[String]) -> Result<Array2<f32>> {
        let mut model = self.model.lock().map_err(|e| anyhow!("获取模型锁失败: {e}"))?;
        let rows = model.embed(queries.to_vec(), None)?;
        to_matrix(rows)
    }
}

impl CrossModalEncoder for FastEmbedEncoder {
    fn encode_text(&self, queries: &[String]) -> Result<Array2<f32>> {
        self.embed(queries)
    }
}

impl TextEncoder for FastEmbedEncoder {
    fn encode(&self, queries: &[String]) -> Result<Array2<f32>> {
        self.embed(queries)
    }
}

fn parse_model_name(name: &str) -> Result<EmbeddingModel> {
    match name.to_lowercase().as_str() {
        "clip-vit-b-32" => Ok(EmbeddingModel::ClipVitB32),
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "paraphrase-multilingual-mpnet-base-v2" => Ok(EmbeddingModel::ParaphraseMLMpnetBaseV2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        _ => Err(anyhow!("未知的模型: {name}")),
    }
}
