use crate::adapters::jsoc::{build_query, JsocClient};
use crate::app::pipelines::harp_merge::load_active_regions;
use crate::core::fits::{read_magnetogram, write_magnetogram};
use crate::core::render::render_side_by_side;
use crate::core::resample::{crop_square, resample, rotate_north_up};
use crate::core::timestamps::parse_cme_time;
use crate::core::{ConfigProvider, Magnetogram, Pipeline, RunSummary, Storage, Summary, Table};
use crate::domain::model::{SharpTarget, CME_TIME_COLUMN, HARP_COLUMN, NOAA_COLUMN};
use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;

/// Rows with a HARP number and a parseable CME time, in table order.
/// Rows whose time cannot be parsed are logged and dropped.
pub fn targets_from_table(table: &Table) -> Result<Vec<SharpTarget>> {
    let column = |name: &str| {
        table.column_index(name).ok_or_else(|| EtlError::ValidationError {
            message: format!("merged table has no '{}' column", name),
        })
    };
    let noaa_idx = column(NOAA_COLUMN)?;
    let harp_idx = column(HARP_COLUMN)?;
    let time_idx = column(CME_TIME_COLUMN)?;

    let mut targets = Vec::new();
    for row in &table.rows {
        let cell = |idx: usize| row.get(idx).map(|s| s.trim()).unwrap_or_default();
        let (noaa, harp, time) = (cell(noaa_idx), cell(harp_idx), cell(time_idx));
        if harp.is_empty() {
            continue;
        }

        match parse_cme_time(time) {
            Ok(observed_at) => targets.push(SharpTarget {
                noaa: noaa.to_string(),
                harp: harp.to_string(),
                observed_at,
            }),
            Err(e) => tracing::warn!("Skipping NOAA {}: {}", noaa, e),
        }
    }

    Ok(targets)
}

pub struct ProcessedSharp {
    pub target: SharpTarget,
    pub resampled: Magnetogram,
    pub preview: Option<Vec<u8>>,
}

pub struct SharpBatch {
    pub processed: Vec<ProcessedSharp>,
    pub summary: RunSummary,
}

impl Summary for SharpBatch {
    fn summary(&self) -> String {
        format!(
            "{} magnetograms ({} skipped, {} failed)",
            self.processed.len(),
            self.summary.skipped,
            self.summary.failed
        )
    }
}

/// Exports SHARP magnetograms from JSOC and writes cropped, resampled copies.
pub struct SharpFetchPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    jsoc: JsocClient,
}

impl<S: Storage, C: ConfigProvider> SharpFetchPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Result<Self> {
        let jsoc = JsocClient::new(config.jsoc().clone())?;
        Ok(Self {
            storage,
            config,
            jsoc,
        })
    }

    async fn process_target(&self, target: &SharpTarget) -> Result<ProcessedSharp> {
        let jsoc = self.config.jsoc();
        let sharp = self.config.sharp();

        let query = build_query(&jsoc.series, &target.harp, &target.observed_at);
        let urls = self.jsoc.export(&query, &jsoc.segment).await?;
        let url = urls.first().ok_or_else(|| EtlError::ExportError {
            status: 0,
            message: "missing export URL".to_string(),
        })?;

        let raw = self.jsoc.download(url).await?;
        let raw_name = target.raw_fits_name(&jsoc.series, &jsoc.segment);
        self.storage.write_file(&raw_name, &raw).await?;

        let map = rotate_north_up(read_magnetogram(&self.storage.local_path(&raw_name))?);
        let cropped = crop_square(&map, sharp.crop_multiple)?;
        let resampled = resample(&cropped, sharp.target_size, sharp.target_size)?;
        tracing::debug!(
            "NOAA {}: {}x{} -> crop {}x{} -> {}x{}",
            target.noaa,
            map.width,
            map.height,
            cropped.width,
            cropped.height,
            resampled.width,
            resampled.height
        );

        let preview = if sharp.render_png {
            Some(render_side_by_side(&map, &resampled, sharp.field_saturation)?)
        } else {
            None
        };

        Ok(ProcessedSharp {
            target: target.clone(),
            resampled,
            preview,
        })
    }

    async fn write_outputs(&self, batch: SharpBatch) -> RunSummary {
        let mut summary = batch.summary;

        for sharp in &batch.processed {
            let fits_name = sharp.target.output_fits_name();
            if let Err(e) = write_magnetogram(&self.storage.local_path(&fits_name), &sharp.resampled) {
                tracing::warn!("Failed to write {}: {}", fits_name, e);
                summary.failed += 1;
                continue;
            }

            if let Some(png) = &sharp.preview {
                let png_name = sharp.target.preview_png_name();
                if let Err(e) = self.storage.write_file(&png_name, png).await {
                    tracing::warn!("Failed to write {}: {}", png_name, e);
                    summary.previews_failed += 1;
                }
            }

            tracing::info!("Saved {}", fits_name);
            summary.written += 1;
        }

        summary
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for SharpFetchPipeline<S, C> {
    type Extracted = Vec<SharpTarget>;
    type Transformed = SharpBatch;

    fn name(&self) -> &'static str {
        "sharp-fetch"
    }

    async fn extract(&self) -> Result<Vec<SharpTarget>> {
        let merged = &self.config.paths().merged;
        let bytes = self.storage.read_file(merged).await?;
        let table = load_active_regions(&bytes)?;

        let mut targets = targets_from_table(&table)?;
        tracing::info!(
            "Retrieved {} NOAA active regions with HARP numbers",
            targets.len()
        );
        if let Some(limit) = self.config.sharp().limit {
            targets.truncate(limit);
        }
        Ok(targets)
    }

    async fn transform(&self, data: Vec<SharpTarget>) -> Result<SharpBatch> {
        let mut summary = RunSummary::default();
        let mut processed = Vec::new();
        // Several HARPs can map to one NOAA output; the first that succeeds keeps it.
        let mut claimed = HashSet::new();

        for target in &data {
            summary.attempted += 1;
            let output = target.output_fits_name();
            if claimed.contains(&output) {
                tracing::info!(
                    "{} already produced this run, skipping HARP {}",
                    output,
                    target.harp
                );
                summary.skipped += 1;
                continue;
            }
            if self.config.sharp().skip_existing && self.storage.exists(&output).await {
                tracing::info!("{} exists, skipping", output);
                summary.skipped += 1;
                continue;
            }

            match self.process_target(target).await {
                Ok(sharp) => {
                    claimed.insert(output);
                    processed.push(sharp);
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed NOAA {} (HARP {}): {}",
                        target.noaa,
                        target.harp,
                        e
                    );
                    summary.failed += 1;
                }
            }
        }

        Ok(SharpBatch { processed, summary })
    }

    async fn load(&self, result: SharpBatch) -> Result<String> {
        let summary = self.write_outputs(result).await;
        tracing::info!(
            "SHARP run: {} written ({} without preview), {} skipped, {} failed of {}",
            summary.written,
            summary.previews_failed,
            summary.skipped,
            summary.failed,
            summary.attempted
        );
        Ok(self.config.paths().data_dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_skip_missing_harp_and_bad_times() {
        let csv = ",NOAA Active region number,CME date and time,HARP number\n\
                   0,11374,14/12/2011 20.58.00,1200\n\
                   1,11380,14/12/2011 20.58.00,\n\
                   2,11390,sometime in 2012,1300\n\
                   3,11284,needs to be after 06:12 on 03/01/2012,1028\n";
        let table = load_active_regions(csv.as_bytes()).unwrap();

        let targets = targets_from_table(&table).unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].noaa, "11374");
        assert_eq!(targets[0].harp, "1200");
        assert_eq!(targets[1].harp, "1028");
        assert_eq!(targets[1].observed_at.query_stamp(), "2012.01.03_06:12:00_TAI");
    }

    #[test]
    fn test_targets_require_time_column() {
        let table = Table {
            headers: vec![NOAA_COLUMN.to_string(), HARP_COLUMN.to_string()],
            rows: vec![],
        };
        assert!(targets_from_table(&table).is_err());
    }

    #[tokio::test]
    async fn test_failed_preview_is_counted() {
        use crate::adapters::storage::LocalStorage;
        use crate::config::TomlConfig;
        use crate::domain::model::{MapMeta, ObservationTime};
        use chrono::NaiveDate;
        use tempfile::TempDir;

        let temp_dir = TempDir::new().unwrap();
        let target = SharpTarget {
            noaa: "11374".to_string(),
            harp: "1200".to_string(),
            observed_at: ObservationTime(
                NaiveDate::from_ymd_opt(2011, 12, 14)
                    .unwrap()
                    .and_hms_opt(20, 58, 0)
                    .unwrap(),
            ),
        };
        // a directory where the PNG should go makes the write fail
        std::fs::create_dir(temp_dir.path().join(target.preview_png_name())).unwrap();

        let mut config = TomlConfig::default();
        config.paths.data_dir = temp_dir.path().display().to_string();
        let pipeline =
            SharpFetchPipeline::new(LocalStorage::new(temp_dir.path()), config).unwrap();

        let batch = SharpBatch {
            processed: vec![ProcessedSharp {
                target: target.clone(),
                resampled: Magnetogram::new(2, 2, vec![1.0, 2.0, 3.0, 4.0], MapMeta::default()),
                preview: Some(vec![0u8; 8]),
            }],
            summary: RunSummary {
                attempted: 1,
                ..RunSummary::default()
            },
        };

        let summary = pipeline.write_outputs(batch).await;

        assert_eq!(summary.written, 1);
        assert_eq!(summary.previews_failed, 1);
        assert!(temp_dir.path().join(target.output_fits_name()).exists());
    }
}
