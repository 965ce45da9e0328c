//! CLI commands

pub mod lock;
pub mod status;
pub mod unlock;
