pub mod app_paths;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod model;
pub mod services;

pub use error::{DataSourceError, GridError, LoadError};
