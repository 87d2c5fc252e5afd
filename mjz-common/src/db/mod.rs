//! Store initialization and record model rows

pub mod init;
pub mod models;

pub use init::*;
pub use models::*;
