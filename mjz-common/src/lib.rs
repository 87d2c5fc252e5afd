//! # Mondo Jazz Common Library
//!
//! Shared code for the playlist sync tooling:
//! - Record model rows and store initialization
//! - Bootstrap configuration loading and root folder resolution
//! - Error types
//! - Air-date formatting

pub mod config;
pub mod db;
pub mod error;
pub mod human_time;

pub use error::{Error, Result};
