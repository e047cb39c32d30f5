//! # SlowMovie Common Library
//!
//! Shared code for the SlowMovie player service:
//! - Database models and queries (catalog, now-playing, migrations)
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
