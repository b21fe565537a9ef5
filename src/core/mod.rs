// src/core/mod.rs
//! Run setup shared by the binary: configuration and file system helpers

pub mod config_manager;
pub mod fs_ops;

pub use config_manager::ConfigManager;
pub use fs_ops::FsOps;
