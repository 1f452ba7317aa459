use anyhow::Result;
use clap::Parser;
use robowatch::config::{load_env_file, PresenterFormat, DEFAULT_ENV_FILE};
use robowatch::{stdout_presenter, RobowatchConfig, StartupOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "robowatch")]
#[command(about = "Camera scene analysis loop backed by a remote MCP vision tool")]
#[command(version)]
#[command(long_about = "Captures frames from a camera, sends each one to a remote scene-analysis \
tool over MCP and prints the structured result. Runs until interrupted.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "robowatch.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Dotenv file loaded before the configuration
    #[arg(long, value_name = "PATH", default_value = DEFAULT_ENV_FILE, help = "Read environment variables from this file if it exists")]
    env_file: PathBuf,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit without starting the loop")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", help = "Append logs to a file in addition to stderr")]
    log_file: Option<PathBuf>,

    /// Use the generated test pattern instead of the camera
    #[arg(long, help = "Use a synthetic frame source instead of the camera device")]
    synthetic_camera: bool,

    /// Stop after N iterations
    #[arg(long, value_name = "N", help = "Stop after N loop iterations")]
    max_iterations: Option<u64>,

    /// Emit results as JSON lines
    #[arg(long, help = "Print results as JSON lines instead of a table")]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = init_logging(&args)?;

    info!("Starting robowatch v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    if let Err(e) = load_env_file(&args.env_file) {
        error!("{}", e);
        return Err(e.into());
    }

    let mut config = match RobowatchConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    if args.json {
        config.presenter.format = PresenterFormat::Json;
    }

    let presenter = stdout_presenter(&config.presenter);
    let options = StartupOptions {
        synthetic_camera: args.synthetic_camera,
        max_iterations: args.max_iterations,
    };

    match robowatch::run(Arc::new(config), options, presenter).await {
        Ok(stats) => {
            info!(
                "robowatch exited normally ({} results presented)",
                stats.analyses_succeeded
            );
            Ok(())
        }
        Err(e) => {
            error!("Startup failed: {}", e);
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("robowatch={}", log_level)));

    // Logs go to stderr so stdout carries only results
    let console_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let mut layers = vec![console_layer];
    let mut guard = None;

    if let Some(path) = &args.log_file {
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Log file path has no file name: {}", path.display()))?;

        let appender = tracing_appender::rolling::never(directory, file_name);
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_target(true)
                .boxed(),
        );
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Robowatch Configuration File");
    println!("# Default configuration with all available options.");
    println!("# The credential is read from analysis.credential, ROBOWATCH_ANALYSIS__CREDENTIAL");
    println!("# or HF_CV_ROBOT_TOKEN.");
    println!();

    let rendered = RobowatchConfig::default().to_toml()?;
    println!("{}", rendered);
    Ok(())
}
