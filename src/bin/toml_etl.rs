use clap::Parser;
use contrib_etl::config::toml_config::TomlConfig;
use contrib_etl::core::merger::ContributionMerger;
use contrib_etl::core::ConfigProvider;
use contrib_etl::utils::{logger, validation::Validate};
use contrib_etl::{CalamineReader, ContributionsPipeline, EtlEngine, LocalStorage};
use std::path::Path;

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "Contribution merger driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "contrib-etl.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// List the sources and how each would be handled, without writing anything
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    let args = Args::parse();

    let config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if config.json_logs() {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        if let Err(e) = perform_dry_run(&config) {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(e.exit_code().max(1));
        }
        return;
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = ContributionsPipeline::new(storage, config, CalamineReader::new());
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run() {
        Ok(output_path) => {
            tracing::info!("✅ ETL process completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = e.exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }
}

fn display_config_summary(config: &TomlConfig) {
    tracing::info!("📋 Pipeline: {}", config.pipeline.name);
    if let Some(description) = &config.pipeline.description {
        tracing::info!("   {}", description);
    }
    tracing::info!(
        "📥 Input: {} ({})",
        config.input_dir(),
        config.source_extensions().join(", ")
    );
    tracing::info!(
        "📤 Output: {}/{} [{}]",
        config.output_path(),
        config.output_file(),
        config.output_formats().join(", ")
    );
    if let Some(bundle) = config.bundle_name() {
        tracing::info!("🗜  Bundled into {}", bundle);
    }
}

fn perform_dry_run(config: &TomlConfig) -> contrib_etl::Result<()> {
    let merger =
        ContributionMerger::new(CalamineReader::new()).with_extensions(config.source_extensions());
    let plan = merger.plan(Path::new(config.input_dir()))?;

    if plan.is_empty() {
        println!("No files in {}", config.input_dir());
    }
    for (name, decision) in plan {
        match decision {
            Ok(year) => println!("  {} -> year {}", name, year),
            Err(reason) => println!("  {} -> skipped ({})", name, reason),
        }
    }
    Ok(())
}
