pub mod cache;
pub mod candidates;
pub mod fuse;
pub mod hydrate;
pub mod pipeline;
pub mod rerank;
pub mod rewrite;

pub use pipeline::{QueryPipeline, QueryRequest, QueryResponse};
pub use rewrite::{Intent, RewriteFlags, SearchQuery, Strategy};
