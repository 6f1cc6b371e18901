//! Shared types for the WordForge services
//!
//! Holds the pieces that do not belong to any single service: the common
//! error type and configuration loading.

pub mod config;
pub mod error;

pub use config::Settings;
pub use error::{Error, Result};
