//! Database models and queries

pub mod catalog;
pub mod init;
pub mod migrations;
pub mod models;
pub mod now_playing;

pub use catalog::*;
pub use init::*;
pub use migrations::*;
pub use models::*;
pub use now_playing::*;
