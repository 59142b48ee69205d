mod check;
mod resolve;
mod search;
pub mod server;

use std::sync::Arc;

use anyhow::Result;
use tokio::task::spawn_blocking;

pub use check::*;
pub use resolve::*;
pub use search::*;
pub use server::*;

use crate::catalog::{AssetCatalog, SharedCatalog};
use crate::config::{DataDir, EncoderOptions, Opts};
use crate::encoder::{CrossModalEncoder, TextEncoder};

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// 进程内共享的资产目录
static CATALOG: SharedCatalog = SharedCatalog::new();

/// 获取资产目录，首次调用时构建，文件检查时显示进度条
///
/// 同一进程内只会构建一次，之后的调用直接返回已有目录。
pub async fn open_catalog(data: &DataDir) -> Result<Arc<AssetCatalog>> {
    let data = data.clone();
    let catalog = spawn_blocking(move || {
        CATALOG.get_or_build(|| AssetCatalog::build(&data.sources(), &data.objathor_assets(), true))
    })
    .await??;
    Ok(catalog)
}

/// 加载查询编码器
#[cfg(feature = "fastembed")]
pub fn load_encoders(
    opts: &EncoderOptions,
    data: &DataDir,
) -> Result<(Arc<dyn CrossModalEncoder>, Arc<dyn TextEncoder>)> {
    use crate::encoder::FastEmbedEncoder;

    let cache = opts.model_cache.clone().unwrap_or_else(|| data.models());
    let clip = FastEmbedEncoder::new(&opts.clip_model, cache.clone())?;
    let text = FastEmbedEncoder::new(&opts.text_model, cache)?;
    Ok((Arc::new(clip), Arc::new(text)))
}

/// 加载查询编码器
#[cfg(not(feature = "fastembed"))]
pub fn load_encoders(
    _opts: &EncoderOptions,
    _data: &DataDir,
) -> Result<(Arc<dyn CrossModalEncoder>, Arc<dyn TextEncoder>)> {
    anyhow::bail!("没有可用的编码器，请使用 `--features fastembed` 重新编译")
}
