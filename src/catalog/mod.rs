mod annotation;
mod features;
mod inventory;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{debug, info, warn};
use ndarray::RemoveAxis;
use ndarray::prelude::*;
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde::Serialize;

pub use self::annotation::*;
pub use self::features::*;
pub use self::inventory::*;
use crate::error::{Error, Result};
use crate::utils::{l2_normalize_lanes, pb_style};

/// 资产来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetOrigin {
    /// 精选资产，始终在本地可用
    Curated,
    /// 开放目录资产，需要检查文件是否存在
    OpenCatalog,
}

/// 一个数据源：一份标注文件 + 一个特征目录
#[derive(Debug, Clone)]
pub struct CatalogSource {
    pub name: String,
    pub origin: AssetOrigin,
    pub annotations: PathBuf,
    pub features: PathBuf,
}

/// 已经读入内存的数据源
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub name: String,
    pub origin: AssetOrigin,
    pub annotations: Annotations,
    pub features: SourceFeatures,
}

impl CatalogSource {
    pub fn load(&self) -> Result<LoadedSource> {
        let annotations = load_annotations(&self.annotations)?;
        let features = load_features(&self.name, &self.features)?;
        info!(
            "数据源 {}: {} 条标注, {} 个特征",
            self.name,
            annotations.len(),
            features.len()
        );
        Ok(LoadedSource { name: self.name.clone(), origin: self.origin, annotations, features })
    }
}

/// 目录构建统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogStats {
    /// 每个数据源的特征数量，按加载顺序
    pub sources: Vec<(String, usize)>,
    /// 被后加载数据源覆盖的重复 ID 数量
    pub duplicates: usize,
    /// 因资产文件缺失而被过滤的数量
    pub dropped: usize,
    /// 可检索的资产数量
    pub available: usize,
}

impl CatalogStats {
    pub fn total(&self) -> usize {
        self.sources.iter().map(|(_, n)| n).sum()
    }
}

/// 可检索的资产目录，构建后只读
///
/// `asset_ids`、`image_features`、`text_features` 按行对齐。
/// `annotations` 保留所有数据源的标注，包括被过滤掉的资产。
#[derive(Debug)]
pub struct AssetCatalog {
    asset_ids: Vec<String>,
    /// ID 到行号
    positions: HashMap<String, usize>,
    origins: Vec<AssetOrigin>,
    /// 单位化的图像特征，形状为 (n, views, d)
    image_features: Array3<f32>,
    /// 原始文本特征，形状为 (n, d)
    text_features: Array2<f32>,
    annotations: Annotations,
    stats: CatalogStats,
}

impl AssetCatalog {
    /// 按顺序加载所有数据源并构建目录，后加载的数据源优先
    ///
    /// # Arguments
    ///
    /// * `sources` - 数据源列表
    /// * `inventory` - 开放目录资产的文件清单
    /// * `progress` - 是否显示文件检查进度条
    pub fn build(
        sources: &[CatalogSource],
        inventory: &dyn AssetInventory,
        progress: bool,
    ) -> Result<Self> {
        let loaded = sources.iter().map(CatalogSource::load).collect::<Result<Vec<_>>>()?;
        Self::assemble(loaded, inventory, progress)
    }

    /// 合并已加载的数据源
    pub fn assemble(
        sources: Vec<LoadedSource>,
        inventory: &dyn AssetInventory,
        progress: bool,
    ) -> Result<Self> {
        let start = Instant::now();
        let (views, image_dim, text_dim) = embedding_shape(&sources)?;

        let mut stats = CatalogStats {
            sources: sources.iter().map(|s| (s.name.clone(), s.features.len())).collect(),
            ..Default::default()
        };

        let mut annotations = Annotations::new();
        let mut all_ids = vec![];
        let mut all_origins = vec![];
        for source in &sources {
            annotations.extend(source.annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
            all_ids.extend(source.features.uids.iter().map(String::as_str));
            all_origins.extend(std::iter::repeat_n(source.origin, source.features.len()));
        }

        // 同一个 ID 只保留最后一次出现
        let last: HashMap<&str, usize> = all_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let unique = (0..all_ids.len()).filter(|&i| last[all_ids[i]] == i).collect::<Vec<_>>();
        stats.duplicates = all_ids.len() - unique.len();
        if stats.duplicates > 0 {
            debug!("{} 个重复 ID 被后加载的数据源覆盖", stats.duplicates);
        }

        info!("检查资产文件可用性...");
        let pb = if progress {
            ProgressBar::new(unique.len() as u64).with_style(pb_style())
        } else {
            ProgressBar::hidden()
        };
        let available = unique
            .par_iter()
            .progress_with(pb.clone())
            .map(|&i| match all_origins[i] {
                AssetOrigin::Curated => true,
                AssetOrigin::OpenCatalog => inventory.contains(all_ids[i]),
            })
            .collect::<Vec<_>>();
        pb.finish_and_clear();

        let valid = unique
            .iter()
            .zip(&available)
            .filter_map(|(&i, &ok)| ok.then_some(i))
            .collect::<Vec<_>>();
        stats.dropped = unique.len() - valid.len();
        stats.available = valid.len();
        if stats.dropped > 0 {
            info!("过滤掉 {} 个缺失的资产文件", stats.dropped);
        }
        info!("可用资产: {}/{}", stats.available, all_ids.len());

        let asset_ids = valid.iter().map(|&i| all_ids[i].to_string()).collect::<Vec<_>>();
        let origins = valid.iter().map(|&i| all_origins[i]).collect::<Vec<_>>();
        let positions = asset_ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();

        let mut image_features = match sources.is_empty() {
            true => Array3::zeros((0, views, image_dim)),
            false => {
                let parts = sources.iter().map(|s| s.features.image.view()).collect::<Vec<_>>();
                stack_rows(&parts, &valid)?
            }
        };
        let text_features = match sources.is_empty() {
            true => Array2::zeros((0, text_dim)),
            false => {
                let parts = sources.iter().map(|s| s.features.text.view()).collect::<Vec<_>>();
                stack_rows(&parts, &valid)?
            }
        };
        l2_normalize_lanes(&mut image_features, Axis(2));

        if asset_ids.is_empty() {
            warn!("资产目录为空，所有检索都不会返回结果");
        }
        debug!("构建资产目录耗时: {:.2}s", start.elapsed().as_secs_f32());

        Ok(Self { asset_ids, positions, origins, image_features, text_features, annotations, stats })
    }

    /// 可检索的资产数量
    pub fn len(&self) -> usize {
        self.asset_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asset_ids.is_empty()
    }

    pub fn asset_ids(&self) -> &[String] {
        &self.asset_ids
    }

    /// 可检索资产的行号，被过滤掉的资产返回 `None`
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn origin(&self, index: usize) -> AssetOrigin {
        self.origins[index]
    }

    pub fn image_features(&self) -> ArrayView3<'_, f32> {
        self.image_features.view()
    }

    pub fn text_features(&self) -> ArrayView2<'_, f32> {
        self.text_features.view()
    }

    /// 图像特征维度
    pub fn image_dim(&self) -> usize {
        self.image_features.len_of(Axis(2))
    }

    /// 文本特征维度
    pub fn text_dim(&self) -> usize {
        self.text_features.ncols()
    }

    /// 查询任意已知资产的标注，包括不可检索的资产
    pub fn annotation(&self, id: &str) -> Option<&serde_json::Value> {
        self.annotations.get(id)
    }

    pub fn bounding_box(&self, id: &str) -> Option<BoundingBox> {
        self.annotation(id).and_then(BoundingBox::from_annotation)
    }

    pub fn category(&self, id: &str) -> Option<&str> {
        self.annotation(id).and_then(category)
    }

    pub fn stats(&self) -> &CatalogStats {
        &self.stats
    }
}

/// 检查所有数据源的特征形状一致，返回 (视角数, 图像维度, 文本维度)
fn embedding_shape(sources: &[LoadedSource]) -> Result<(usize, usize, usize)> {
    let Some(first) = sources.first() else {
        return Ok((1, 0, 0));
    };
    let (_, views, image_dim) = first.features.image.dim();
    let text_dim = first.features.text.ncols();
    for source in &sources[1..] {
        let (_, v, d) = source.features.image.dim();
        let t = source.features.text.ncols();
        if (v, d, t) != (views, image_dim, text_dim) {
            return Err(Error::Shape {
                path: PathBuf::from(&source.name),
                reason: format!(
                    "特征形状 (views={v}, image={d}, text={t}) 与 {} 的 (views={views}, image={image_dim}, text={text_dim}) 不一致",
                    first.name
                ),
            });
        }
    }
    Ok((views, image_dim, text_dim))
}

/// 拼接各数据源的特征并取出保留的行
fn stack_rows<D: RemoveAxis>(parts: &[ArrayView<'_, f32, D>], rows: &[usize]) -> Result<Array<f32, D>> {
    let stacked = ndarray::concatenate(Axis(0), parts)
        .map_err(|e| Error::Shape { path: PathBuf::from("<catalog>"), reason: e.to_string() })?;
    Ok(stacked.select(Axis(0), rows))
}

/// 进程内只构建一次的共享目录
#[derive(Debug, Default)]
pub struct SharedCatalog(OnceCell<Arc<AssetCatalog>>);

impl SharedCatalog {
    pub const fn new() -> Self {
        Self(OnceCell::new())
    }

    /// 获取目录，尚未构建时调用 `build`
    ///
    /// 并发调用时 `build` 最多执行一次；构建失败时不会缓存结果，下次调用会重试。
    pub fn get_or_build<F>(&self, build: F) -> Result<Arc<AssetCatalog>>
    where
        F: FnOnce() -> Result<AssetCatalog>,
    {
        self.0.get_or_try_init(|| build().map(Arc::new)).cloned()
    }

    pub fn get(&self) -> Option<Arc<AssetCatalog>> {
        self.0.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn source(
        name: &str,
        origin: AssetOrigin,
        ids: &[&str],
        image: Array3<f32>,
        text: Array2<f32>,
    ) -> LoadedSource {
        let annotations = ids
            .iter()
            .map(|id| (id.to_string(), json!({"category": name, "id": id})))
            .collect();
        LoadedSource {
            name: name.to_string(),
            origin,
            annotations,
            features: SourceFeatures {
                uids: ids.iter().map(|s| s.to_string()).collect(),
                image,
                text,
            },
        }
    }

    fn inventory(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dedupe_later_wins() {
        let open = source(
            "open",
            AssetOrigin::OpenCatalog,
            &["a", "b"],
            array![[[1.0, 0.0]], [[0.0, 1.0]]],
            array![[1.0], [2.0]],
        );
        let curated = source(
            "curated",
            AssetOrigin::Curated,
            &["b"],
            array![[[3.0, 4.0]]],
            array![[9.0]],
        );
        let catalog =
            AssetCatalog::assemble(vec![open, curated], &inventory(&["a"]), false).unwrap();

        assert_eq!(catalog.asset_ids(), &["a", "b"]);
        assert_eq!(catalog.position("b"), Some(1));
        assert_eq!(catalog.stats().duplicates, 1);
        assert_eq!(catalog.origin(1), AssetOrigin::Curated);
        assert_eq!(catalog.text_features()[[1, 0]], 9.0);
        assert_eq!(catalog.category("b"), Some("curated"));
        assert!((catalog.image_features()[[1, 0, 0]] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_position_of_filtered_asset() {
        let open = source(
            "open",
            AssetOrigin::OpenCatalog,
            &["a", "b"],
            array![[[1.0, 0.0]], [[0.0, 1.0]]],
            array![[1.0], [2.0]],
        );
        let catalog = AssetCatalog::assemble(vec![open], &inventory(&["b"]), false).unwrap();

        // a 没有资产文件，不可检索但标注仍然可查
        assert_eq!(catalog.position("a"), None);
        assert_eq!(catalog.category("a"), Some("open"));
        assert_eq!(catalog.position("b"), Some(0));
        assert_eq!(catalog.position("c"), None);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = source("a", AssetOrigin::Curated, &["a"], array![[[1.0, 0.0]]], array![[1.0]]);
        let b = source("b", AssetOrigin::Curated, &["b"], array![[[1.0, 0.0, 0.0]]], array![[1.0]]);
        let result = AssetCatalog::assemble(vec![a, b], &inventory(&[]), false);
        assert!(matches!(result, Err(Error::Shape { .. })));
    }

    #[test]
    fn test_no_sources() {
        let catalog = AssetCatalog::assemble(vec![], &inventory(&[]), false).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.stats().total(), 0);
    }

    #[test]
    fn test_shared_catalog_builds_once() {
        let shared = SharedCatalog::new();
        let calls = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    shared
                        .get_or_build(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            AssetCatalog::assemble(vec![], &inventory(&[]), false)
                        })
                        .unwrap()
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(shared.get().is_some());
    }

    #[test]
    fn test_shared_catalog_retries_after_failure() {
        let shared = SharedCatalog::new();
        let failed = shared.get_or_build(|| Err(Error::MissingFile(PathBuf::from("x"))));
        assert!(failed.is_err());
        assert!(shared.get().is_none());
        let ok = shared.get_or_build(|| AssetCatalog::assemble(vec![], &inventory(&[]), false));
        assert!(ok.is_ok());
    }
}
