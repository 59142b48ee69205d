use std::sync::Arc;
use std::time::Instant;

use clap::ValueEnum;
use log::debug;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::AssetCatalog;
use crate::encoder::{CrossModalEncoder, TextEncoder};
use crate::error::{Error, Result};
use crate::metrics;
use crate::utils::l2_normalize_lanes;

/// 默认的图像相似度阈值
pub const DEFAULT_THRESHOLD: f32 = 28.0;
/// 余弦相似度的缩放倍数
pub const SIMILARITY_SCALE: f32 = 100.0;

/// 分数融合方式
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FusionMode {
    /// 只使用图像相似度
    ImageOnly,
    /// 图像相似度 + 文本相似度
    #[default]
    ImageAndText,
}

impl FusionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageOnly => "image-only",
            Self::ImageAndText => "image-and-text",
        }
    }
}

/// 检索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Candidate {
    /// 资产 ID
    pub asset_id: String,
    /// 分数，越高越匹配
    pub score: f32,
}

impl Candidate {
    pub fn new(asset_id: impl Into<String>, score: f32) -> Self {
        Self { asset_id: asset_id.into(), score }
    }
}

/// 资产检索器
///
/// 图像相似度决定资产能否入选（必须超过阈值），融合后的分数决定排序。
pub struct Retriever {
    catalog: Arc<AssetCatalog>,
    cross_modal: Arc<dyn CrossModalEncoder>,
    text: Arc<dyn TextEncoder>,
    fusion: FusionMode,
    threshold: f32,
}

impl Retriever {
    pub fn new(
        catalog: Arc<AssetCatalog>,
        cross_modal: Arc<dyn CrossModalEncoder>,
        text: Arc<dyn TextEncoder>,
        fusion: FusionMode,
    ) -> Self {
        Self { catalog, cross_modal, text, fusion, threshold: DEFAULT_THRESHOLD }
    }

    /// 设置默认阈值
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn catalog(&self) -> &Arc<AssetCatalog> {
        &self.catalog
    }

    pub fn fusion(&self) -> FusionMode {
        self.fusion
    }

    /// 检索与查询匹配的资产，按融合分数降序返回
    ///
    /// 所有查询的结果合并到同一个列表中。查询为空或目录为空时直接返回空列表，不会调用编码器。
    ///
    /// # Arguments
    ///
    /// * `queries` - 查询文本
    /// * `threshold` - 图像相似度阈值，`None` 时使用默认阈值
    pub fn retrieve(&self, queries: &[String], threshold: Option<f32>) -> Result<Vec<Candidate>> {
        let threshold = threshold.unwrap_or(self.threshold);
        if queries.is_empty() || self.catalog.is_empty() {
            return Ok(vec![]);
        }
        let start = Instant::now();

        let mut query = self.cross_modal.encode_text(queries).map_err(Error::Encoder)?;
        check_dim("cross-modal", &query, (queries.len(), self.catalog.image_dim()))?;
        l2_normalize_lanes(&mut query, Axis(1));
        let image = image_similarity(query.view(), self.catalog.image_features());

        let fused = match self.fusion {
            FusionMode::ImageOnly => None,
            FusionMode::ImageAndText => {
                let query = self.text.encode(queries).map_err(Error::Encoder)?;
                check_dim("text", &query, (queries.len(), self.catalog.text_dim()))?;
                Some(&image + &query.dot(&self.catalog.text_features().t()))
            }
        };

        let results =
            gate_and_rank(self.catalog.asset_ids(), &image, fused.as_ref().unwrap_or(&image), threshold);

        let elapsed = start.elapsed().as_secs_f32();
        debug!("检索 {} 条查询, {} 个候选, 耗时 {:.3}s", queries.len(), results.len(), elapsed);
        metrics::observe_retrieve(self.fusion, elapsed, results.len());

        Ok(results)
    }
}

/// 计算查询与每个资产的图像相似度，多视角取最大值
///
/// # Arguments
///
/// * `queries` - 单位化的查询向量，形状为 (q, d)
/// * `assets` - 单位化的资产特征，形状为 (n, views, d)
///
/// 返回形状为 (q, n) 的矩阵，已乘以 [`SIMILARITY_SCALE`]
pub fn image_similarity(queries: ArrayView2<'_, f32>, assets: ArrayView3<'_, f32>) -> Array2<f32> {
    let (n, views, _) = assets.dim();
    let mut scores = Array2::from_elem((queries.nrows(), n), f32::NEG_INFINITY);
    for v in 0..views {
        let view = queries.dot(&assets.index_axis(Axis(1), v).t());
        azip!((best in &mut scores, &s in &view) *best = f32::max(*best, s));
    }
    scores * SIMILARITY_SCALE
}

/// 按图像相似度筛选，按融合分数排序
fn gate_and_rank(
    asset_ids: &[String],
    image: &Array2<f32>,
    fused: &Array2<f32>,
    threshold: f32,
) -> Vec<Candidate> {
    let mut results = image
        .indexed_iter()
        .filter(|(_, score)| **score > threshold)
        .map(|((q, a), _)| Candidate::new(asset_ids[a].clone(), fused[[q, a]]))
        .collect::<Vec<_>>();
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results
}

fn check_dim(channel: &'static str, m: &Array2<f32>, expected: (usize, usize)) -> Result<()> {
    if m.dim() != expected {
        return Err(Error::Dimension { channel, expected, actual: m.dim() });
    }
    Ok(())
}
