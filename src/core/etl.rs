use crate::core::{Pipeline, Summary};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        let name = self.pipeline.name();
        tracing::info!("Starting {} pipeline", name);
        self.monitor.log_stats("start");

        tracing::info!("Extracting...");
        let extracted = self.pipeline.extract().await?;
        tracing::info!("Extracted {}", extracted.summary());
        self.monitor.log_stats("extract");

        tracing::info!("Transforming...");
        let transformed = self.pipeline.transform(extracted).await?;
        tracing::info!("Transformed {}", transformed.summary());
        self.monitor.log_stats("transform");

        tracing::info!("Loading...");
        let location = self.pipeline.load(transformed).await?;
        tracing::info!("{} output saved to: {}", name, location);
        self.monitor.log_stats("load");
        self.monitor.log_final_stats();

        Ok(location)
    }
}
