//! Command handlers

pub mod auth;
pub mod config;
pub mod stats;
pub mod status;
pub mod sync;
pub mod task;
pub mod watch;
