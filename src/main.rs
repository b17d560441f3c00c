use anyhow::Result;
use clap::Parser;
use skycam::{SkycamConfig, SkycamOrchestrator};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "skycam")]
#[command(about = "Flying robot control loop with raw video recording and frame relay")]
#[command(version)]
#[command(long_about = "Connects to a drone, starts its video stream, records every \
video packet to a raw H.264 file, relays decoded frames to a consumer, reports telemetry \
and applies flight commands as they arrive.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "skycam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level, also the default)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting a session")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, value_name = "DIR", help = "Directory for daily rolling log files")]
    log_dir: Option<PathBuf>,

    /// Fly with the keyboard
    #[arg(short, long, help = "Read flight commands from the keyboard")]
    keyboard: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Keep the guard alive so buffered file logs are flushed on exit
    let log_guard = init_logging(&args)?;

    info!("Starting skycam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match SkycamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("✗ Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let mut orchestrator = SkycamOrchestrator::new(config);
    orchestrator.set_keyboard_enabled(args.keyboard);

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("Skycam exited with code: {}", exit_code);

    drop(log_guard);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(args)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "skycam.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Filter directives used when `RUST_LOG` is not set
///
/// Status lines (connection, commands, telemetry) are logged at info and
/// stay visible unless `--quiet` is given.
fn default_filter(args: &Args) -> String {
    if args.debug {
        "skycam=debug".to_string()
    } else if args.quiet {
        "skycam=error".to_string()
    } else {
        "skycam=info".to_string()
    }
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Skycam Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Every key can be overridden with SKYCAM_<SECTION>__<KEY> environment variables");
    println!();
    println!("{}", toml::to_string_pretty(&SkycamConfig::default())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::EnvFilter;

    fn filter_for(flags: &[&str]) -> String {
        let args = Args::parse_from(std::iter::once("skycam").chain(flags.iter().copied()));
        default_filter(&args)
    }

    #[test]
    fn test_status_lines_visible_by_default() {
        assert_eq!(filter_for(&[]), "skycam=info");
        assert_eq!(filter_for(&["--verbose"]), "skycam=info");
        assert!(EnvFilter::try_new(filter_for(&[])).is_ok());
    }

    #[test]
    fn test_log_level_flags() {
        assert_eq!(filter_for(&["--debug"]), "skycam=debug");
        assert_eq!(filter_for(&["--quiet"]), "skycam=error");
        assert_eq!(filter_for(&["--debug", "--quiet"]), "skycam=debug");
    }
}
