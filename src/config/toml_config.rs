use crate::core::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub paths: PathSettings,
    pub jsoc: JsocSettings,
    pub sharp: SharpSettings,
    pub scrape: ScrapeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub data_dir: String,
    pub harp_lookup: String,
    pub ar_times: String,
    pub merged: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data_dir: "./files".to_string(),
            harp_lookup: "all_harps_with_noaa_ars.txt".to_string(),
            ar_times: "ARs_and_times.csv".to_string(),
            merged: "ARs_and_times_w_HARP_NUM.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JsocSettings {
    pub base_url: String,
    pub email: String,
    pub series: String,
    pub segment: String,
    pub protocol: String,
    pub poll_interval_seconds: u64,
    pub max_poll_attempts: usize,
    pub timeout_seconds: u64,
}

impl Default for JsocSettings {
    fn default() -> Self {
        Self {
            base_url: "http://jsoc.stanford.edu".to_string(),
            email: String::new(),
            series: "hmi.sharp_cea_720s".to_string(),
            segment: "magnetogram".to_string(),
            protocol: "FITS,**NONE**".to_string(),
            poll_interval_seconds: 5,
            max_poll_attempts: 60,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharpSettings {
    /// Process at most this many rows of the merged table.
    pub limit: Option<usize>,
    pub target_size: usize,
    pub crop_multiple: usize,
    /// Plot saturation in Gauss, applied symmetrically.
    pub field_saturation: f64,
    pub render_png: bool,
    pub skip_existing: bool,
}

impl Default for SharpSettings {
    fn default() -> Self {
        Self {
            limit: None,
            target_size: 100,
            crop_multiple: 100,
            field_saturation: 500.0,
            render_png: true,
            skip_existing: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    pub base_url: String,
    pub image_type: String,
    pub image_filter: String,
    pub output_dir: String,
    pub start_date: String,
    pub end_date: String,
    pub timeout_seconds: u64,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            base_url: "https://solarmonitor.org".to_string(),
            image_type: "shmi_maglc".to_string(),
            image_filter: "shmi_maglc_fd".to_string(),
            output_dir: "solar_monitor_magnetosphere".to_string(),
            start_date: "2011-09-11".to_string(),
            end_date: "2011-11-11".to_string(),
            timeout_seconds: 60,
        }
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${JSOC_EMAIL})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Checks needed by every subcommand.
    pub fn validate_common(&self) -> Result<()> {
        validation::validate_path("paths.data_dir", &self.paths.data_dir)?;
        validation::validate_path("paths.harp_lookup", &self.paths.harp_lookup)?;
        validation::validate_path("paths.ar_times", &self.paths.ar_times)?;
        validation::validate_path("paths.merged", &self.paths.merged)?;
        Ok(())
    }

    pub fn validate_jsoc(&self) -> Result<()> {
        validation::validate_url("jsoc.base_url", &self.jsoc.base_url)?;
        validation::validate_email("jsoc.email", &self.jsoc.email)?;
        validation::validate_non_empty_string("jsoc.series", &self.jsoc.series)?;
        validation::validate_non_empty_string("jsoc.segment", &self.jsoc.segment)?;
        validation::validate_positive_number("jsoc.max_poll_attempts", self.jsoc.max_poll_attempts, 1)?;
        validation::validate_positive_number("sharp.target_size", self.sharp.target_size, 1)?;
        validation::validate_positive_number("sharp.crop_multiple", self.sharp.crop_multiple, 1)?;
        validation::validate_range("sharp.field_saturation", self.sharp.field_saturation, 1e-3, 1e6)?;
        if let Some(limit) = self.sharp.limit {
            validation::validate_positive_number("sharp.limit", limit, 1)?;
        }
        Ok(())
    }

    pub fn validate_scrape(&self) -> Result<()> {
        validation::validate_url("scrape.base_url", &self.scrape.base_url)?;
        validation::validate_non_empty_string("scrape.image_type", &self.scrape.image_type)?;
        validation::validate_path("scrape.output_dir", &self.scrape.output_dir)?;
        let start = validation::parse_date("scrape.start_date", &self.scrape.start_date)?;
        let end = validation::parse_date("scrape.end_date", &self.scrape.end_date)?;
        if start > end {
            return Err(EtlError::InvalidConfigValueError {
                field: "scrape.end_date".to_string(),
                value: self.scrape.end_date.clone(),
                reason: format!("End date is before start date {}", self.scrape.start_date),
            });
        }
        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn paths(&self) -> &PathSettings {
        &self.paths
    }

    fn jsoc(&self) -> &JsocSettings {
        &self.jsoc
    }

    fn sharp(&self) -> &SharpSettings {
        &self.sharp
    }

    fn scrape(&self) -> &ScrapeSettings {
        &self.scrape
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_common()
    }
}
