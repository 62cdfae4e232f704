use anyhow::{Context, Result};
use clap::Parser;
use gesture_remote::serial::SerialBackend;
use gesture_remote::{
    CommandMode, EventBus, GestureRemoteOrchestrator, JsonLinesSource, LandmarkSource,
    RemoteConfig, SerialSessionManager, SystemSerialBackend,
};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "gesture-remote")]
#[command(about = "Turns hand gestures into IR remote commands sent to a serial IR blaster")]
#[command(version)]
#[command(long_about = "Reads per-frame hand landmarks from a detector as JSON lines, \
classifies each frame into a remote-control gesture, debounces the result and sends the \
matching IR command to a microcontroller-driven IR blaster over a serial link. \
Runs without a device attached and reconnects when one appears.")]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "gesture-remote.toml",
        help = "Path to TOML configuration file"
    )]
    config: String,

    /// Serial port to fall back to when discovery finds nothing usable
    #[arg(long, value_name = "PORT")]
    port: Option<String>,

    /// Flipper-style .ir command file for the target device
    #[arg(long, value_name = "PATH")]
    ir_file: Option<PathBuf>,

    /// Send single-letter commands for the simple firmware
    #[arg(long)]
    legacy: bool,

    /// Landmark JSON lines; `-` reads standard input
    #[arg(long, value_name = "PATH", default_value = "-")]
    input: String,

    /// List serial ports and connection candidates, then exit
    #[arg(long)]
    list_ports: bool,

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
    #[arg(long, help = "Validate configuration file and exit without starting the system")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting gesture remote v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match RemoteConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    apply_overrides(&mut config, &args);

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

    if args.list_ports {
        return list_ports(&config);
    }

    let source = open_source(&args.input)?;
    let mut orchestrator = GestureRemoteOrchestrator::new(
        config,
        Box::new(SystemSerialBackend),
        source,
    )
    .map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize system: {}", e);
        e
    })?;

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start system: {}", e);
        e
    })?;

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("Gesture remote exited with code: {}", exit_code);

    // A worker still blocked on stdin would otherwise hold the runtime open
    std::process::exit(exit_code);
}

fn apply_overrides(config: &mut RemoteConfig, args: &Args) {
    if let Some(port) = &args.port {
        config.serial.port = Some(port.clone());
    }
    if let Some(ir_file) = &args.ir_file {
        config.commands.ir_file = Some(ir_file.clone());
    }
    if args.legacy {
        config.commands.mode = CommandMode::Legacy;
    }
}

fn open_source(input: &str) -> Result<Box<dyn LandmarkSource>> {
    if input == "-" {
        info!("Reading landmarks from standard input");
        return Ok(Box::new(JsonLinesSource::new(BufReader::new(std::io::stdin()))));
    }

    let file =
        File::open(input).with_context(|| format!("Failed to open landmark input {}", input))?;
    info!("Reading landmarks from {}", input);
    Ok(Box::new(JsonLinesSource::new(BufReader::new(file))))
}

fn list_ports(config: &RemoteConfig) -> Result<()> {
    let backend = SystemSerialBackend;
    let ports = backend.list_ports()?;

    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in &ports {
        println!("{:<24} {}", port.name, port.description.as_deref().unwrap_or("-"));
    }

    let session =
        SerialSessionManager::new(Box::new(backend), config.serial.clone(), EventBus::new(1));
    let candidates = session.discover_candidates();
    println!();
    println!("Connection order: {}", candidates.join(", "));
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{
        fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    };

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
        .unwrap_or_else(|_| EnvFilter::new(format!("gesture_remote={}", log_level)));

    // Logs go to stderr; stdout may be part of a pipeline
    let base = fmt::layer().with_writer(std::io::stderr);
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => base
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => base
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => base
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            base.with_target(true).with_thread_ids(args.debug).boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Gesture remote configuration");
    println!("# Every key is optional; GESTURE_REMOTE_<SECTION>__<KEY> overrides the file");
    println!();
    println!("{}", toml::to_string_pretty(&RemoteConfig::default())?);
    Ok(())
}
