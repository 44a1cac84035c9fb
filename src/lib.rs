//! Sparkify ETL library - shared modules for both binaries.

pub mod config;
pub mod discover;
pub mod driver;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod queries;
pub mod safety;
pub mod stats;
pub mod store;
pub mod transform;
