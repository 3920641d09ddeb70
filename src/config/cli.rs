use crate::config::toml_config::TomlConfig;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(name = "solar-etl")]
#[command(about = "Acquire and prepare solar active-region magnetogram data")]
pub struct CliConfig {
    /// Path to TOML configuration file (optional; defaults apply without it)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override paths.data_dir
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[arg(long, global = true, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Add HARP numbers to the active-region CSV
    MergeHarps,

    /// Download full-disk magnetogram images from solarmonitor.org
    Scrape {
        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: Option<String>,
        /// Last day (inclusive), YYYY-MM-DD
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        output_dir: Option<String>,
    },

    /// Export SHARP magnetograms from JSOC, crop, resample and save them
    FetchSharps {
        #[arg(long)]
        limit: Option<usize>,
        /// JSOC-registered email address
        #[arg(long, env = "JSOC_EMAIL")]
        email: Option<String>,
        /// Skip the PNG preview
        #[arg(long)]
        no_png: bool,
        /// Reprocess targets whose output already exists
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration without running anything
    ShowConfig,
}

impl CliConfig {
    /// Command-line flags win over the file.
    pub fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(dir) = &self.data_dir {
            config.paths.data_dir = dir.clone();
        }

        match &self.command {
            Command::Scrape {
                start,
                end,
                output_dir,
            } => {
                if let Some(start) = start {
                    config.scrape.start_date = start.clone();
                }
                if let Some(end) = end {
                    config.scrape.end_date = end.clone();
                }
                if let Some(dir) = output_dir {
                    config.scrape.output_dir = dir.clone();
                }
            }
            Command::FetchSharps {
                limit,
                email,
                no_png,
                force,
            } => {
                if limit.is_some() {
                    config.sharp.limit = *limit;
                }
                if let Some(email) = email {
                    config.jsoc.email = email.clone();
                }
                if *no_png {
                    config.sharp.render_png = false;
                }
                if *force {
                    config.sharp.skip_existing = false;
                }
            }
            Command::MergeHarps | Command::ShowConfig => {}
        }
    }
}
