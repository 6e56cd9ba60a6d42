//! herakles-apps-aggregator - version 0.1.0
//!
//! Per-application process metrics aggregation with tracing logging.
//! This is the main entry point that resolves configuration and dispatches
//! subcommands; without one it runs the collection loop.

mod cli;
mod commands;

use clap::Parser;
use tracing::{error, info, Level};

use cli::{resolve_config, Args, Commands, LogLevel};
use commands::{command_check, command_generate_snapshot, command_groups, command_run, command_test};
use herakles_apps_aggregator::config::{show_config, validate_effective_config, Config};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) {
    let level = config
        .log_level
        .as_deref()
        .and_then(LogLevel::from_name)
        .unwrap_or(LogLevel::Info);

    let log_level = match level {
        LogLevel::Off => Level::ERROR,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    info!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Check reports problems itself instead of refusing to start
    if let Some(Commands::Check { proc }) = &args.command {
        let config = resolve_config(&args)?;
        setup_logging(&config);
        return command_check(*proc, &config);
    }

    let config = load_validated_config(&args)?;
    setup_logging(&config);

    let result = match &args.command {
        Some(Commands::Test {
            iterations,
            verbose,
            all,
        }) => command_test(*iterations, *verbose, *all, &config),

        Some(Commands::Groups { verbose, filter }) => {
            command_groups(*verbose, filter.clone(), &config)
        }

        Some(Commands::GenerateSnapshot {
            output,
            per_group,
            others,
            children,
        }) => command_generate_snapshot(output.clone(), *per_group, *others, *children, &config),

        Some(Commands::Run { cycles, stats }) => command_run(&config, *cycles, *stats).await,

        Some(Commands::Check { .. }) => unreachable!("Check handled above"),

        None => {
            info!("Starting herakles-apps-aggregator");
            command_run(&config, None, false).await
        }
    };

    if let Err(e) = &result {
        error!("❌ {}", e);
    }
    result
}
