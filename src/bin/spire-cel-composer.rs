use clap::{command, Parser};
use spire_cel_composer::{
    ComposeWorkloadJwtSvidRequest, ComposerConfig, ComposerError, CredentialComposer,
    CredentialComposerService,
};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Composes a workload JWT-SVID offline with the configured expression.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Trust domain the composer runs in
    #[arg(short, long)]
    trust_domain: String,

    /// Path to a ComposeWorkloadJWTSVIDRequest JSON document
    #[arg(short, long)]
    request: PathBuf,

    /// Enable debug mode
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: &Cli) -> Result<(), ComposerError> {
    let config = ComposerConfig::from_file(&cli.config)?;
    info!("config loaded.");
    debug!("config: {:?}", config);

    let composer = CredentialComposer::new();
    composer.configure(&cli.trust_domain, &config)?;

    let content = std::fs::read_to_string(&cli.request)
        .map_err(|e| ComposerError::internal(format!("Failed to read request file: {}", e)))?;
    let request: ComposeWorkloadJwtSvidRequest = serde_json::from_str(&content)
        .map_err(|e| ComposerError::internal(format!("Failed to parse request file: {}", e)))?;

    let response = composer.compose_workload_jwt_svid(&request)?;
    let output = serde_json::to_string_pretty(&response)
        .map_err(|e| ComposerError::internal(format!("Failed to encode response: {}", e)))?;
    println!("{}", output);
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error ({}, {}): {}", e.code(), e.stage(), e);
        std::process::exit(1);
    }
}
