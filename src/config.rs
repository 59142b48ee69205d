use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::BaseDirs;

use crate::catalog::{AssetOrigin, AssetsDir, CatalogSource};
use crate::cli::*;
use crate::rerank::DEFAULT_SIZE_PENALTY;
use crate::retriever::{DEFAULT_THRESHOLD, FusionMode};

static DATA_DIR: LazyLock<String> = LazyLock::new(|| {
    let home = BaseDirs::new().map(|d| d.home_dir().to_path_buf()).unwrap_or_default();
    home.join(".objathor-assets").to_string_lossy().to_string()
});

/// 开放目录资产文件的后缀
pub const ASSET_EXTENSION: &str = "pkl.gz";

#[derive(Parser, Debug, Clone)]
pub struct RetrievalOptions {
    /// 图像相似度阈值，只有超过该值的资产才会入选
    #[arg(long, value_name = "SCORE", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f32,
    /// 分数融合方式
    #[arg(long, value_enum, default_value_t = FusionMode::ImageAndText)]
    pub fusion: FusionMode,
    /// 尺寸差异的惩罚权重
    #[arg(long, value_name = "WEIGHT", default_value_t = DEFAULT_SIZE_PENALTY)]
    pub size_penalty: f32,
    /// 显示的结果数量
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    pub count: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct EncoderOptions {
    /// 跨模态（CLIP 文本塔）编码器模型
    #[arg(long, value_name = "MODEL", default_value = "clip-vit-b-32")]
    pub clip_model: String,
    /// 句向量编码器模型
    #[arg(long, value_name = "MODEL", default_value = "all-minilm-l6-v2")]
    pub text_model: String,
    /// 模型缓存目录，默认为数据目录下的 models
    #[arg(long, value_name = "DIR")]
    pub model_cache: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "assetsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 资产数据根目录
    #[arg(short, long, global = true, default_value = DATA_DIR.as_str())]
    pub data_dir: DataDir,
    /// 资产数据版本
    #[arg(long, global = true, default_value = "2023_09_23")]
    pub release: String,
}

impl Opts {
    /// 当前版本的数据目录
    pub fn data(&self) -> DataDir {
        let mut dir = self.data_dir.clone();
        dir.set_release(self.release.clone());
        dir
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 检查数据文件并统计资产目录
    Check(CheckCommand),
    /// 检索资产
    Search(SearchCommand),
    /// 为场景中的每个类别批量选择资产文件
    Resolve(ResolveCommand),
    /// 启动 HTTP 检索服务
    Server(ServerCommand),
}

/// 资产数据目录
#[derive(Debug, Clone)]
pub struct DataDir {
    path: PathBuf,
    release: String,
}

impl DataDir {
    pub fn new(path: impl Into<PathBuf>, release: impl Into<String>) -> Self {
        Self { path: path.into(), release: release.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn set_release(&mut self, release: String) {
        self.release = release;
    }

    /// 开放目录数据所在目录
    pub fn objathor(&self) -> PathBuf {
        self.path.join(&self.release)
    }

    /// 开放目录标注文件
    pub fn objathor_annotations(&self) -> PathBuf {
        self.objathor().join("annotations.json.gz")
    }

    /// 开放目录特征目录
    pub fn objathor_features(&self) -> PathBuf {
        self.objathor().join("features")
    }

    /// 开放目录资产文件目录
    pub fn objathor_assets(&self) -> AssetsDir {
        AssetsDir::new(self.objathor().join("assets"), ASSET_EXTENSION)
    }

    /// 精选数据所在目录
    pub fn holodeck(&self) -> PathBuf {
        self.path.join("holodeck").join(&self.release)
    }

    /// 精选资产的特征目录
    pub fn thor_features(&self) -> PathBuf {
        self.holodeck().join("thor_object_data")
    }

    /// 精选资产的标注文件
    pub fn thor_annotations(&self) -> PathBuf {
        self.thor_features().join("annotations.json.gz")
    }

    /// 模型缓存目录
    pub fn models(&self) -> PathBuf {
        self.path.join("models")
    }

    /// 按加载顺序返回数据源，精选数据源在后，优先级更高
    pub fn sources(&self) -> Vec<CatalogSource> {
        vec![
            CatalogSource {
                name: "objathor".to_string(),
                origin: AssetOrigin::OpenCatalog,
                annotations: self.objathor_annotations(),
                features: self.objathor_features(),
            },
            CatalogSource {
                name: "thor".to_string(),
                origin: AssetOrigin::Curated,
                annotations: self.thor_annotations(),
                features: self.thor_features(),
            },
        ]
    }
}

impl FromStr for DataDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s), release: "2023_09_23".to_string() })
    }
}
