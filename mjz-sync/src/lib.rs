//! mjz-sync library interface
//!
//! Scrapes the station's playlist archive, resolves every spin to a catalog
//! song, groups airings into episodes and publishes one catalog playlist per
//! episode.

pub mod archive;
pub mod catalog;
pub mod config;
pub mod context;
pub mod db;
mod rate_limit;
pub mod services;

pub use crate::context::AppContext;
