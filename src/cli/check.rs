use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::catalog::{IMAGE_FEATURES, IMAGE_UIDS, TEXT_FEATURES, TEXT_UIDS};
use crate::cli::{SubCommandExtend, open_catalog};
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct CheckCommand {
    /// 以 JSON 格式输出目录统计
    #[arg(long)]
    pub json: bool,
}

impl SubCommandExtend for CheckCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let data = opts.data();

        let mut required: Vec<(PathBuf, String)> = vec![
            (data.objathor(), "objathor 数据目录".to_string()),
            (data.objathor_assets().root().to_path_buf(), "objathor 资产目录".to_string()),
            (data.holodeck(), "holodeck 数据目录".to_string()),
        ];
        for source in data.sources() {
            required.push((source.annotations.clone(), format!("{} 标注", source.name)));
            for file in [IMAGE_FEATURES, IMAGE_UIDS, TEXT_FEATURES, TEXT_UIDS] {
                required.push((source.features.join(file), format!("{} {}", source.name, file)));
            }
        }

        let mut all_pass = true;
        for (path, name) in &required {
            if path.exists() {
                println!("[PASS] {}: {}", name, path.display());
            } else {
                println!("[FAIL] {} 缺失: {}", name, path.display());
                all_pass = false;
            }
        }
        if !all_pass {
            anyhow::bail!("数据文件不完整");
        }

        let catalog = open_catalog(&data).await?;
        let stats = catalog.stats();
        if self.json {
            println!("{}", serde_json::to_string_pretty(stats)?);
        } else {
            for (name, count) in &stats.sources {
                println!("{}\t{}", name, count);
            }
            println!("duplicates\t{}", stats.duplicates);
            println!("dropped\t{}", stats.dropped);
            println!("available\t{}/{}", stats.available, stats.total());
        }
        info!("检查完成");

        Ok(())
    }
}
