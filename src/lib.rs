pub mod api;
pub mod client;
pub mod config;
pub mod counter;
pub mod datasource;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod resolver;
pub mod selector;
pub mod series;
pub mod template;
pub mod tree;

pub use error::{DatasourceError, Result};
