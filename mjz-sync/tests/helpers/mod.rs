//! Test Helper Utilities
//!
//! Shared fakes, fixtures and log capture for the mjz-sync integration tests.
//! Not every test binary uses every helper.
#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;
pub mod log_capture;

pub use fakes::{FakeArchive, FakeCatalog, SearchBehavior};
pub use fixtures::{
    catalog_track, count_rows, raw_playlist, raw_spin, seed_playlist, timeslot,
};
pub use log_capture::LogCapture;
