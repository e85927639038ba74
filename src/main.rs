//! ytdlp-queue CLI application
//!
//! Command-line front-end for the persistent yt-dlp download queue.

use std::fs::OpenOptions;
use std::process;
use std::sync::Mutex;

use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, EnvFilter};

use ytdlp_queue::cli::{execute, load_settings, Cli, CommandContext};
use ytdlp_queue::config::LoggingConfig;
use ytdlp_queue::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    // Settings come first: they carry the log level and log file
    let loaded = load_settings(&cli.global).await?;
    init_logging(&cli, &loaded.settings.logging);

    info!("ytdlp-queue v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(problem) = &loaded.problem {
        warn!(
            "Ignoring settings file {}: {}; using defaults",
            loaded.path.display(),
            problem
        );
    }
    if loaded.created && !cli.global.quiet {
        println!("Created default configuration file:");
        println!("   {}", loaded.path.display());
        println!("   You can customize settings with `ytdlp-queue config set` or by editing this file.");
        println!();
    }

    let context = CommandContext {
        settings: loaded.settings,
        config_path: loaded.path,
        quiet: cli.global.quiet,
    };
    execute(cli.command, &context).await
}

/// Initialize logging from CLI verbosity, falling back to the settings level
fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    let level = if cli.verbosity_overridden() {
        cli.log_level().to_string().to_lowercase()
    } else {
        logging.level.clone()
    };

    let mut filter = EnvFilter::from_default_env();
    match format!("ytdlp_queue={}", level).parse::<Directive>() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Invalid log level '{}': {}", level, e),
    }

    let file_layer = logging.log_file.as_ref().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
            Err(e) => {
                eprintln!("Cannot open log file {}: {}", path.display(), e);
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(cli.global.very_verbose)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
