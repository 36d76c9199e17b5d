//! herakles-process-explorer - version 0.1.0
//!
//! Live process tree explorer with tracing logging.
//! This is the main entry point that resolves configuration and dispatches subcommands.

mod cli;
mod commands;
mod config;

use clap::Parser;
use tracing::{debug, error, info, Level};

use cli::{Args, Commands};
use commands::{
    build_explorer, command_check, command_fds, command_find, command_maps, command_threads,
    command_tree, command_watch,
};
use config::{resolve_config, show_config, validate_effective_config, Config};

/// Maps a lowercase level name to a tracing level.
fn parse_level(level: &str) -> Level {
    match level {
        "off" | "error" => Level::ERROR,
        "warn" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Initializes tracing logging subsystem with configured log level.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
fn setup_logging(config: &Config) {
    let level = config
        .log_level
        .as_deref()
        .unwrap_or("info")
        .to_ascii_lowercase();
    let log_level = parse_level(&level);

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if level == "off" {
        return;
    }
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    debug!("Logging initialized with level: {}", level);
}

/// Configures the global rayon pool used for per-process reads.
fn setup_parallelism(config: &Config) {
    if let Some(threads) = config.parallelism {
        if threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .unwrap_or_else(|e| error!("Failed to set rayon thread pool: {}", e));
            debug!("Rayon thread pool configured with {} threads", threads);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Handle config-only flags before anything else
    if args.check_config || args.show_config {
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

    let config = resolve_config(&args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }

    setup_logging(&config);
    setup_parallelism(&config);

    match &config.loaded_from {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => debug!("No configuration file found, using defaults"),
    }

    info!(
        "Starting herakles-process-explorer (proc root {})",
        config.proc_root().display()
    );

    let explorer = build_explorer(&config)?;

    match args.command.unwrap_or(Commands::Tree { json: false }) {
        Commands::Tree { json } => command_tree(&explorer, json),
        Commands::Watch { passes, json } => command_watch(&explorer, passes, json).await,
        Commands::Find { text, json } => command_find(&explorer, &text, json),
        Commands::Fds { pid } => command_fds(&explorer, pid),
        Commands::Maps { pid, raw } => command_maps(&explorer, pid, raw),
        Commands::Threads { pid } => command_threads(&explorer, pid),
        Commands::Check => command_check(&explorer, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_names_ignore_case() {
        let config = Config {
            log_level: Some("DEBUG".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_ok());

        let level = config.log_level.as_deref().unwrap().to_ascii_lowercase();
        assert_eq!(parse_level(&level), Level::DEBUG);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("bogus"), Level::INFO);
    }
}
