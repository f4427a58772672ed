//! Parley CLI, the main entry point.
//!
//! - `parley`           interactive session
//! - `parley "QUERY"`   one turn, then exit

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley: chat with language models from your terminal",
    version
)]
pub struct Cli {
    /// Send one message and exit instead of starting an interactive session
    pub query: Option<String>,

    /// Provider to use (anthropic, openai, openrouter, ollama, ...)
    #[arg(long)]
    pub provider: Option<String>,

    /// Model to request
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature (0.0 to 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum tokens per reply
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Replace the configured system prompt
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Append to the system prompt
    #[arg(long)]
    pub append_system_prompt: Option<String>,

    /// Wait for complete replies instead of streaming
    #[arg(long)]
    pub no_stream: bool,

    /// Output format for one-shot queries
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file to use instead of ~/.parley/config.toml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr and stay quiet by default so they do not
    // interleave with the session display.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let setup = commands::Setup::from_cli(&cli)?;

    match cli.query.as_deref() {
        Some(query) => commands::ask::run(setup, query, cli.output_format).await?,
        None => commands::chat::run(setup).await?,
    }

    Ok(())
}
