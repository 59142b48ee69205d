use anyhow::Result;
use clap::{Parser, ValueEnum};
use tokio::task::spawn_blocking;

use crate::catalog::AssetCatalog;
use crate::cli::{SubCommandExtend, load_encoders, open_catalog};
use crate::config::{EncoderOptions, Opts, RetrievalOptions};
use crate::rerank::SizeReranker;
use crate::retriever::{Candidate, Retriever};
use crate::utils::parse_size;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub retrieval: RetrievalOptions,
    #[command(flatten)]
    pub encoder: EncoderOptions,
    /// 查询文本，可以有多条
    #[arg(required = true)]
    pub queries: Vec<String>,
    /// 目标尺寸 X,Y,Z（米），指定后按尺寸差异重新排序
    #[arg(long, value_name = "X,Y,Z", value_parser = parse_size)]
    pub size: Option<[f32; 3]>,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let data = opts.data();
        let (cross_modal, text) = load_encoders(&self.encoder, &data)?;
        let catalog = open_catalog(&data).await?;
        let retriever = Retriever::new(catalog.clone(), cross_modal, text, self.retrieval.fusion)
            .threshold(self.retrieval.threshold);

        let queries = self.queries.clone();
        let size = self.size;
        let reranker = SizeReranker::new(self.retrieval.size_penalty);
        let mut result = spawn_blocking(move || -> Result<Vec<Candidate>> {
            let candidates = retriever.retrieve(&queries, None)?;
            match size {
                Some(size) => Ok(reranker.rerank(retriever.catalog(), size, candidates)?),
                None => Ok(candidates),
            }
        })
        .await??;

        result.truncate(self.retrieval.count);
        print_result(&result, &catalog, self.output_format)
    }
}

fn print_result(result: &[Candidate], catalog: &AssetCatalog, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for c in result {
                let category = catalog.category(&c.asset_id).unwrap_or("-");
                println!("{:.2}\t{}\t{}", c.score, c.asset_id, category);
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}
