//! Configuration module
//!
//! Layout defaults, loader paging and logging settings, stored as TOML.

pub mod config;

pub use config::{Config, LayoutConfig, LoaderConfig, LoggingConfig};
