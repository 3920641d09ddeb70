use crate::adapters::solar_monitor::{day_page_urls, download_image, extract_image_links, fetch_page};
use crate::core::{ConfigProvider, Pipeline, RunSummary, Summary};
use crate::domain::model::ImageLink;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::parse_date;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub struct ScrapedLinks {
    pub links: Vec<ImageLink>,
    pub pages: usize,
    pub failed_pages: usize,
}

impl Summary for ScrapedLinks {
    fn summary(&self) -> String {
        format!(
            "{} image links from {} pages ({} failed)",
            self.links.len(),
            self.pages,
            self.failed_pages
        )
    }
}

/// Walks solarmonitor.org day pages and downloads the full-disk magnetograms.
pub struct ImageScrapePipeline<C: ConfigProvider> {
    config: C,
    client: Client,
}

impl<C: ConfigProvider> ImageScrapePipeline<C> {
    pub fn new(config: C) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.scrape().timeout_seconds))
            .build()?;
        Ok(Self { config, client })
    }

    fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.scrape().output_dir)
    }
}

#[async_trait::async_trait]
impl<C: ConfigProvider> Pipeline for ImageScrapePipeline<C> {
    type Extracted = Vec<String>;
    type Transformed = ScrapedLinks;

    fn name(&self) -> &'static str {
        "image-scrape"
    }

    async fn extract(&self) -> Result<Vec<String>> {
        let scrape = self.config.scrape();
        let start = parse_date("scrape.start_date", &scrape.start_date)?;
        let end = parse_date("scrape.end_date", &scrape.end_date)?;
        day_page_urls(&scrape.base_url, &scrape.image_type, start, end)
    }

    async fn transform(&self, data: Vec<String>) -> Result<ScrapedLinks> {
        let filter = &self.config.scrape().image_filter;

        let progress = ProgressBar::new(data.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("Extracting images [{bar:30}] {pos}/{len} pages")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        let mut failed_pages = 0;

        for page in &data {
            progress.inc(1);
            let page_url = Url::parse(page).map_err(|e| EtlError::ProcessingError {
                message: format!("bad page URL {}: {}", page, e),
            })?;

            let html = match fetch_page(&self.client, page).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!("Skipping page {}: {}", page, e);
                    failed_pages += 1;
                    continue;
                }
            };

            let found = extract_image_links(&html, &page_url, filter)?;
            tracing::debug!("{} matching images on {}", found.len(), page);
            for link in found {
                if seen.insert(link.url.clone()) {
                    links.push(link);
                }
            }
        }
        progress.finish_and_clear();

        Ok(ScrapedLinks {
            links,
            pages: data.len(),
            failed_pages,
        })
    }

    async fn load(&self, result: ScrapedLinks) -> Result<String> {
        let dir = self.output_dir();
        let mut summary = RunSummary::default();

        for link in &result.links {
            summary.attempted += 1;
            match download_image(&self.client, link, &dir).await {
                Ok(_) => summary.written += 1,
                Err(e) => {
                    tracing::warn!("Failed to download {}: {}", link.url, e);
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            "Downloaded {}/{} images ({} failed, {} pages unreachable)",
            summary.written,
            summary.attempted,
            summary.failed,
            result.failed_pages
        );
        Ok(dir.display().to_string())
    }
}
