//! Album collection catalog backed by SQLite, with vision-LLM cover
//! extraction, LLM metadata enrichment and a static HTML site.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod llm;
pub mod logging;
pub mod scanner;
pub mod site;

pub use error::{CatalogError, ProviderError, Result};
