use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tokio::task::spawn_blocking;

use crate::catalog::AssetsDir;
use crate::cli::{SubCommandExtend, load_encoders, open_catalog};
use crate::config::{EncoderOptions, Opts};
use crate::retriever::{FusionMode, Retriever};

/// 场景目录中的类别数量文件
pub const COUNTS_FILE: &str = "objav_cnts.json";
/// 输出的资产文件列表
pub const FILES_FILE: &str = "objav_files.json";

#[derive(Parser, Debug, Clone)]
pub struct ResolveCommand {
    #[command(flatten)]
    pub encoder: EncoderOptions,
    /// 场景目录，读取其中的 objav_cnts.json，写入 objav_files.json
    pub dir: PathBuf,
    /// 查询模板，`{}` 会被替换为类别名
    #[arg(long, default_value = "a 3D model of a single {}")]
    pub template: String,
    /// 图像相似度阈值
    #[arg(long, value_name = "SCORE", default_value_t = 30.)]
    pub threshold: f32,
    /// 分数融合方式
    #[arg(long, value_enum, default_value_t = FusionMode::ImageAndText)]
    pub fusion: FusionMode,
}

impl SubCommandExtend for ResolveCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let counts_path = self.dir.join(COUNTS_FILE);
        let file = File::open(&counts_path)
            .with_context(|| format!("无法打开 {}", counts_path.display()))?;
        let counts: BTreeMap<String, usize> = serde_json::from_reader(BufReader::new(file))?;

        let data = opts.data();
        let (cross_modal, text) = load_encoders(&self.encoder, &data)?;
        let catalog = open_catalog(&data).await?;
        let retriever = Retriever::new(catalog, cross_modal, text, self.fusion);

        let assets = data.objathor_assets();
        let template = self.template.clone();
        let threshold = self.threshold;
        let files = spawn_blocking(move || {
            resolve_categories(&retriever, &counts, &template, threshold, &assets)
        })
        .await?;

        let files_path = self.dir.join(FILES_FILE);
        let writer = BufWriter::new(File::create(&files_path)?);
        serde_json::to_writer_pretty(writer, &files)?;
        info!("结果已保存到 {}", files_path.display());
        Ok(())
    }
}

/// 为每个类别检索资产，返回类别到资产文件路径的映射
///
/// 每个类别最多取 `count` 个（至少一个）资产文件存在的候选；
/// 没有可用候选或检索失败的类别对应空列表。
///
/// # Arguments
///
/// * `retriever` - 检索器
/// * `counts` - 类别名到所需数量
/// * `template` - 查询模板，`{}` 会被替换为类别名
/// * `threshold` - 图像相似度阈值
/// * `assets` - 资产文件目录
pub fn resolve_categories(
    retriever: &Retriever,
    counts: &BTreeMap<String, usize>,
    template: &str,
    threshold: f32,
    assets: &AssetsDir,
) -> BTreeMap<String, Vec<PathBuf>> {
    let mut files = BTreeMap::new();
    for (category, &count) in counts {
        let query = template.replace("{}", category);
        info!("检索类别: {category}");
        let paths = match retriever.retrieve(&[query], Some(threshold)) {
            Ok(candidates) => candidates
                .iter()
                .map(|c| assets.asset_path(&c.asset_id))
                .filter(|p| p.is_file())
                .take(count.max(1))
                .collect::<Vec<_>>(),
            Err(e) => {
                warn!("检索 {category} 失败: {e}");
                vec![]
            }
        };
        if paths.is_empty() {
            warn!("{category} 没有可用的资产文件");
        }
        files.insert(category.clone(), paths);
    }
    files
}
