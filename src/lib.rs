//! Maps listing deduplication library - shared modules for all binaries.

pub mod config;
pub mod filter;
pub mod merge;
pub mod models;
pub mod naming;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod queries;
pub mod reconcile;
pub mod safety;
pub mod scoring;
pub mod table;
