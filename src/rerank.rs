use crate::catalog::{AssetCatalog, BoundingBox};
use crate::error::{Error, Result};
use crate::retriever::Candidate;

/// 尺寸差异的默认惩罚权重
pub const DEFAULT_SIZE_PENALTY: f32 = 10.0;

/// 按包围盒尺寸重新排序
///
/// 比较前会把目标尺寸和候选尺寸都按升序排列，所以结果与轴向无关。
#[derive(Debug, Clone, Copy)]
pub struct SizeReranker {
    penalty: f32,
}

impl Default for SizeReranker {
    fn default() -> Self {
        Self { penalty: DEFAULT_SIZE_PENALTY }
    }
}

impl SizeReranker {
    pub fn new(penalty: f32) -> Self {
        Self { penalty }
    }

    /// 排序后三个维度的平均绝对差，单位为米
    pub fn size_difference(target: [f32; 3], bbox: &BoundingBox) -> f32 {
        let mut target = target.map(|v| v * 100.);
        target.sort_by(f32::total_cmp);
        let candidate = bbox.sorted().map(|v| v * 100.);
        let total = target.iter().zip(&candidate).map(|(a, b)| (a - b).abs()).sum::<f32>();
        total / 3. / 100.
    }

    /// 用尺寸差异修正分数并重新排序，不会丢弃任何候选
    ///
    /// 候选资产必须在目录标注中有包围盒信息，否则返回 [`Error::MissingBoundingBox`]。
    ///
    /// # Arguments
    ///
    /// * `catalog` - 资产目录
    /// * `target` - 目标尺寸，单位为米，轴向顺序不影响结果
    /// * `candidates` - 待排序的候选
    pub fn rerank(
        &self,
        catalog: &AssetCatalog,
        target: [f32; 3],
        candidates: Vec<Candidate>,
    ) -> Result<Vec<Candidate>> {
        let mut results = candidates
            .into_iter()
            .map(|c| {
                let bbox = catalog
                    .bounding_box(&c.asset_id)
                    .ok_or_else(|| Error::MissingBoundingBox(c.asset_id.clone()))?;
                let score = c.score - Self::size_difference(target, &bbox) * self.penalty;
                Ok(Candidate { score, ..c })
            })
            .collect::<Result<Vec<_>>>()?;
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(results)
    }
}
