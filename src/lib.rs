pub mod catalog;
pub mod cli;
pub mod config;
pub mod encoder;
mod error;
mod metrics;
pub mod rerank;
pub mod retriever;
pub mod server;
pub mod utils;

pub use catalog::{AssetCatalog, SharedCatalog};
pub use config::Opts;
pub use error::{Error, Result};
pub use rerank::SizeReranker;
pub use retriever::{Candidate, FusionMode, Retriever};
