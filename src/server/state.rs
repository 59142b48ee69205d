use std::sync::Arc;

use crate::rerank::SizeReranker;
use crate::retriever::Retriever;

/// 应用状态
pub struct AppState {
    /// 检索器
    pub retriever: Arc<Retriever>,
    /// 尺寸重排器
    pub reranker: SizeReranker,
    /// 默认返回的结果数量
    pub count: usize,
    /// 鉴权 token
    pub token: String,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(retriever: Retriever, reranker: SizeReranker, count: usize, token: String) -> Arc<Self> {
        Arc::new(AppState { retriever: Arc::new(retriever), reranker, count, token })
    }
}
