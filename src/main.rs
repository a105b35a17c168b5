use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use sentrycam::{
    MemoryPublisher, PerimeterSentinel, SentrycamConfig, StaticClassifier, SyntheticFrameSource,
};

#[derive(Parser, Debug)]
#[command(name = "sentrycam")]
#[command(about = "Camera perimeter-sensing core with change detection and alert escalation")]
#[command(version)]
#[command(long_about = "Perimeter-sensing core for a small networked camera device: \
byte-stride change detection over compressed frames, consecutive-frame escalation into \
an intruder-alert sequence, ambient-light night-mode switching, periodic patrol captures, \
and fusion of remote classification results. This binary runs the core against in-process \
synthetic collaborators.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "sentrycam.toml", help = "Path to TOML configuration file")]
    config: String,

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

    /// Run a fixed number of sensing cycles instead of looping until interrupted
    #[arg(long, value_name = "N", help = "Run N sensing cycles, print published messages, and exit")]
    cycles: Option<u64>,

    /// Feed alternating synthetic frames so change detection fires
    #[arg(long, help = "Alternate synthetic frame contents each second to provoke change events")]
    synthetic_noise: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting sentrycam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match SentrycamConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
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

    let source = Arc::new(SyntheticFrameSource::new(10_000, 640, 480));
    let classifier = Arc::new(StaticClassifier::new());
    let publisher = Arc::new(MemoryPublisher::new());

    if args.synthetic_noise {
        let noise_source = source.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            let mut dark = false;
            loop {
                interval.tick().await;
                noise_source.set_fill(if dark { 40 } else { 200 });
                dark = !dark;
            }
        });
    }

    let mut sentinel = PerimeterSentinel::new(
        config,
        source,
        classifier,
        publisher.clone(),
    );

    match args.cycles {
        Some(cycles) => {
            info!(cycles, "Running fixed cycle count");
            sentinel.run_cycles(cycles).await;
            for message in publisher.messages() {
                println!(
                    "{}{} {}",
                    message.topic,
                    if message.retain { " (retained)" } else { "" },
                    message.payload
                );
            }
        }
        None => {
            sentinel.run().await?;
        }
    }

    info!("sentrycam exited");
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt, Layer};

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
        .unwrap_or_else(|_| EnvFilter::new(format!("sentrycam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed()
        }
        Some("compact") => {
            fmt::layer()
                .compact()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .boxed()
        }
        Some("pretty") | None => {
            fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
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

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Sentrycam Configuration File");
    println!("# Default configuration with all available options");
    println!();
    println!("{}", toml::to_string_pretty(&SentrycamConfig::default())?);
    Ok(())
}
