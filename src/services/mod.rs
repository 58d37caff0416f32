//! The request-to-artifact pipeline, one module per stage.

pub mod diagnostics;
pub mod fetcher;
pub mod parser;
pub mod pipeline;
pub mod publisher;
pub mod scale_engine;
