use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::{AssetOrigin, BoundingBox};
use crate::retriever::Candidate;

/// 检索请求
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RetrieveRequest {
    /// 查询文本，可以有多条
    pub queries: Vec<String>,
    /// 图像相似度阈值，不填则使用服务器默认值
    pub threshold: Option<f32>,
    /// 目标尺寸 `[x, y, z]`（米），指定后按尺寸差异重新排序
    #[schema(value_type = Option<Vec<f32>>)]
    pub size: Option<[f32; 3]>,
    /// 返回的结果数量
    pub count: Option<usize>,
}

/// 重排请求
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RerankRequest {
    /// 目标尺寸 `[x, y, z]`（米）
    #[schema(value_type = Vec<f32>)]
    pub size: [f32; 3],
    /// 待重排的候选
    pub candidates: Vec<Candidate>,
}

/// 候选列表响应
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CandidatesResponse {
    /// 耗时，单位为毫秒
    pub time: u64,
    /// 按分数降序排列的候选
    pub candidates: Vec<Candidate>,
}

/// 资产信息
#[derive(Debug, Serialize, ToSchema)]
pub struct AssetResponse {
    pub asset_id: String,
    /// 是否可被检索，缺少资产文件的资产只保留标注
    pub retrievable: bool,
    /// 资产来源，不可检索时为空
    #[schema(value_type = Option<String>)]
    pub origin: Option<AssetOrigin>,
    pub category: Option<String>,
    pub bounding_box: Option<BoundingBox>,
}
