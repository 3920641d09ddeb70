use crate::core::{ConfigProvider, Pipeline, Storage, Summary, Table};
use crate::domain::model::{HarpLink, HARP_COLUMN, NOAA_COLUMN};
use crate::utils::error::{EtlError, Result};

/// Parses the space-separated HARP lookup file. The first non-empty line is
/// a header.
pub fn load_harp_links(text: &str) -> Result<Vec<HarpLink>> {
    let mut links = Vec::new();

    for (line_no, line) in text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .skip(1)
    {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(harp), Some(noaa)) => links.push(HarpLink {
                harp_number: harp.to_string(),
                noaa_field: noaa.to_string(),
            }),
            _ => {
                return Err(EtlError::ValidationError {
                    message: format!(
                        "HARP lookup line {} has fewer than two fields: '{}'",
                        line_no + 1,
                        line
                    ),
                })
            }
        }
    }

    Ok(links)
}

pub fn load_active_regions(bytes: &[u8]) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }

    Ok(Table { headers, rows })
}

/// Left join of the table onto the lookup by NOAA number. Any existing
/// HARP column is replaced by the joined one, placed last.
pub fn merge(table: &Table, links: &[HarpLink]) -> Result<Table> {
    let noaa_idx = table
        .column_index(NOAA_COLUMN)
        .ok_or_else(|| EtlError::ValidationError {
            message: format!("active-region table has no '{}' column", NOAA_COLUMN),
        })?;
    let stale_harp_idx = table.column_index(HARP_COLUMN);

    let keep = |idx: &usize| Some(*idx) != stale_harp_idx;
    let mut headers: Vec<String> = (0..table.headers.len())
        .filter(keep)
        .map(|idx| table.headers[idx].clone())
        .collect();
    headers.push(HARP_COLUMN.to_string());

    let mut rows = Vec::with_capacity(table.rows.len());
    let mut unmatched = 0;
    for row in &table.rows {
        let base: Vec<String> = (0..row.len())
            .filter(keep)
            .map(|idx| row[idx].clone())
            .collect();
        let noaa = row.get(noaa_idx).map(|s| s.trim()).unwrap_or_default();

        let mut matched = false;
        if !noaa.is_empty() {
            for link in links.iter().filter(|link| link.covers(noaa)) {
                let mut merged = base.clone();
                merged.push(link.harp_number.clone());
                rows.push(merged);
                matched = true;
            }
        }
        if !matched {
            unmatched += 1;
            let mut merged = base;
            merged.push(String::new());
            rows.push(merged);
        }
    }

    if unmatched > 0 {
        tracing::warn!("{} active regions have no HARP number", unmatched);
    }

    Ok(Table { headers, rows })
}

/// CSV with a leading, unnamed 0-based row index column.
pub fn write_merged(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![String::new()];
    header.extend(table.headers.iter().cloned());
    writer.write_record(&header)?;

    for (index, row) in table.rows.iter().enumerate() {
        let mut record = vec![index.to_string()];
        record.extend(row.iter().cloned());
        writer.write_record(&record)?;
    }

    writer.into_inner().map_err(|e| EtlError::IoError(e.into_error()))
}

pub struct MergeSource {
    pub table: Table,
    pub links: Vec<HarpLink>,
}

impl Summary for MergeSource {
    fn summary(&self) -> String {
        format!(
            "{} active-region rows and {} HARP links",
            self.table.len(),
            self.links.len()
        )
    }
}

impl Summary for Table {
    fn summary(&self) -> String {
        format!("{} merged rows", self.len())
    }
}

pub struct HarpMergePipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> HarpMergePipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for HarpMergePipeline<S, C> {
    type Extracted = MergeSource;
    type Transformed = Table;

    fn name(&self) -> &'static str {
        "harp-merge"
    }

    async fn extract(&self) -> Result<MergeSource> {
        let paths = self.config.paths();

        tracing::debug!("Reading HARP lookup from {}", paths.harp_lookup);
        let lookup = self.storage.read_file(&paths.harp_lookup).await?;
        let links = load_harp_links(&String::from_utf8_lossy(&lookup))?;

        tracing::debug!("Reading active regions from {}", paths.ar_times);
        let csv_bytes = self.storage.read_file(&paths.ar_times).await?;
        let table = load_active_regions(&csv_bytes)?;

        Ok(MergeSource { table, links })
    }

    async fn transform(&self, data: MergeSource) -> Result<Table> {
        merge(&data.table, &data.links)
    }

    async fn load(&self, result: Table) -> Result<String> {
        let merged = &self.config.paths().merged;
        let bytes = write_merged(&result)?;
        self.storage.write_file(merged, &bytes).await?;
        Ok(self.storage.local_path(merged).display().to_string())
    }
}
