//! CLI command implementations.

pub mod curate;
pub mod init;
pub mod optimize;
pub mod strategy;
pub mod trajectory;
