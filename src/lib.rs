pub mod app;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod status;
pub mod storage;
pub mod types;
