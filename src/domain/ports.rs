use crate::config::toml_config::{JsocSettings, PathSettings, ScrapeSettings, SharpSettings};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
    /// Filesystem location for libraries that only take paths (FITS I/O).
    fn local_path(&self, path: &str) -> PathBuf;
}

pub trait ConfigProvider: Send + Sync {
    fn paths(&self) -> &PathSettings;
    fn jsoc(&self) -> &JsocSettings;
    fn sharp(&self) -> &SharpSettings;
    fn scrape(&self) -> &ScrapeSettings;
}

/// One-line description of a phase's result, for progress logging.
pub trait Summary {
    fn summary(&self) -> String;
}

impl<T> Summary for Vec<T> {
    fn summary(&self) -> String {
        format!("{} items", self.len())
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Extracted: Summary + Send;
    type Transformed: Summary + Send;

    fn name(&self) -> &'static str;
    async fn extract(&self) -> Result<Self::Extracted>;
    async fn transform(&self, data: Self::Extracted) -> Result<Self::Transformed>;
    /// Returns the location the output was written to.
    async fn load(&self, result: Self::Transformed) -> Result<String>;
}
