//! # bitext-common
//!
//! Shared code for the bilingual paragraph aligner:
//! - Error type and `Result` alias
//! - TOML configuration model and file resolution
//! - Tracing subscriber initialisation
//! - SQLite pool initialisation and record schema

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
