pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command, LogFormat};

pub use adapters::{JsocClient, LocalStorage};
pub use app::pipelines::{HarpMergePipeline, ImageScrapePipeline, SharpFetchPipeline};
pub use config::TomlConfig;
pub use core::etl::EtlEngine;
pub use utils::error::{EtlError, Result};
