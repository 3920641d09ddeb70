use clap::Parser;
use solar_etl::core::Pipeline;
use solar_etl::utils::error::ErrorSeverity;
use solar_etl::utils::logger;
use solar_etl::{
    CliConfig, Command, EtlEngine, EtlError, HarpMergePipeline, ImageScrapePipeline, LocalStorage,
    LogFormat, SharpFetchPipeline, TomlConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    match cli.log_format {
        LogFormat::Compact => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(cli.verbose),
    }

    tracing::info!("Starting solar-etl");
    tracing::debug!("CLI args: {:?}", cli);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            TomlConfig::from_file(path).unwrap_or_else(|e| exit_with(&e))
        }
        None => TomlConfig::default(),
    };
    cli.apply_overrides(&mut config);

    let validated = config.validate_common().and_then(|_| match &cli.command {
        Command::Scrape { .. } => config.validate_scrape(),
        Command::FetchSharps { .. } => config.validate_jsoc(),
        Command::MergeHarps | Command::ShowConfig => Ok(()),
    });
    if let Err(e) = validated {
        tracing::error!("❌ Configuration validation failed: {}", e);
        exit_with(&e);
    }

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.paths.data_dir.clone());
    let result = match cli.command {
        Command::ShowConfig => {
            display_config_summary(&config);
            return Ok(());
        }
        Command::MergeHarps => {
            run(HarpMergePipeline::new(storage, config), cli.monitor).await
        }
        Command::Scrape { .. } => match ImageScrapePipeline::new(config) {
            Ok(pipeline) => run(pipeline, cli.monitor).await,
            Err(e) => Err(e),
        },
        Command::FetchSharps { .. } => match SharpFetchPipeline::new(storage, config) {
            Ok(pipeline) => run(pipeline, cli.monitor).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(location) => {
            println!("✅ Completed successfully!");
            println!("📁 Output saved to: {}", location);
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            exit_with(&e)
        }
    }
}

async fn run<P: Pipeline>(pipeline: P, monitor: bool) -> solar_etl::Result<String> {
    EtlEngine::new_with_monitoring(pipeline, monitor).run().await
}

fn exit_with(e: &EtlError) -> ! {
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}

fn display_config_summary(config: &TomlConfig) {
    println!("📋 Configuration Summary:");
    println!("  Data dir: {}", config.paths.data_dir);
    println!("  HARP lookup: {}", config.paths.harp_lookup);
    println!("  Active regions: {}", config.paths.ar_times);
    println!("  Merged output: {}", config.paths.merged);
    println!();
    println!("📡 JSOC:");
    println!("  Endpoint: {}", config.jsoc.base_url);
    println!("  Series/segment: {}{{{}}}", config.jsoc.series, config.jsoc.segment);
    println!(
        "  Email: {}",
        if config.jsoc.email.is_empty() { "(not set)" } else { config.jsoc.email.as_str() }
    );
    println!(
        "  Polling: every {}s, up to {} times",
        config.jsoc.poll_interval_seconds, config.jsoc.max_poll_attempts
    );
    println!();
    println!("⚙️ SHARP processing:");
    match config.sharp.limit {
        Some(limit) => println!("  Limit: {} regions", limit),
        None => println!("  Limit: all regions"),
    }
    println!(
        "  Crop to multiple of {}, resample to {}x{}",
        config.sharp.crop_multiple, config.sharp.target_size, config.sharp.target_size
    );
    println!("  PNG preview: {} (±{} G)", config.sharp.render_png, config.sharp.field_saturation);
    println!("  Skip existing: {}", config.sharp.skip_existing);
    println!();
    println!("🖼️ Scrape:");
    println!("  Site: {}", config.scrape.base_url);
    println!("  Dates: {} .. {}", config.scrape.start_date, config.scrape.end_date);
    println!("  Filter: {}", config.scrape.image_filter);
    println!("  Output: {}", config.scrape.output_dir);
}
