//! Startup wiring shared by the interactive and one-shot modes.

pub mod ask;
pub mod chat;

use std::sync::Arc;

use parley_config::AppConfig;
use parley_engine::{Collaborators, SessionSettings};
use parley_security::CommandPolicy;
use parley_store::FileSessionStore;
use parley_tools::{LocalFiles, ShellRunner};
use tracing::debug;

use crate::Cli;

/// Everything a session needs, built once at startup.
pub struct Setup {
    pub parts: Collaborators,
    pub settings: SessionSettings,
    pub files: Arc<LocalFiles>,
}

impl Setup {
    /// Load configuration, apply flags, and build the collaborators.
    ///
    /// Fails on an invalid config, an unknown provider, missing credentials
    /// for a hosted provider, or a safety pattern that does not compile.
    pub fn from_cli(cli: &Cli) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = match &cli.config {
            Some(path) => AppConfig::load_with_overrides(path),
            None => AppConfig::load(),
        }
        .map_err(|e| format!("Failed to load config: {e}"))?;

        apply_flags(&mut config, cli);
        config.validate()?;

        let provider = parley_providers::build_from_config(&config)?;
        let policy = CommandPolicy::from_config(&config.shell)?;

        let files = Arc::new(LocalFiles::current_dir());
        let runner = Arc::new(ShellRunner::from_config(&config.shell));
        let store = Arc::new(FileSessionStore::new(config.sessions_dir()));

        let mut settings = SessionSettings::from_config(&config, provider.name());
        if let Some(model) = &cli.model {
            settings.model = model.clone();
        }

        debug!(
            provider = %provider.name(),
            model = %settings.model,
            sessions = %config.sessions_dir().display(),
            "Startup complete"
        );

        Ok(Self {
            parts: Collaborators {
                provider,
                files: files.clone(),
                runner,
                store,
                policy,
            },
            settings,
            files,
        })
    }
}

/// Command-line flags win over the config file and the environment.
pub fn apply_flags(config: &mut AppConfig, cli: &Cli) {
    if let Some(provider) = &cli.provider {
        config.default_provider = provider.clone();
    }
    if let Some(model) = &cli.model {
        config.default_model = model.clone();
    }
    if let Some(temperature) = cli.temperature {
        config.default_temperature = temperature;
    }
    if let Some(max_tokens) = cli.max_tokens {
        config.default_max_tokens = max_tokens;
    }
    if let Some(prompt) = &cli.system_prompt {
        config.system_prompt = prompt.clone();
    }
    if let Some(extra) = &cli.append_system_prompt {
        if !config.system_prompt.is_empty() {
            config.system_prompt.push_str("\n\n");
        }
        config.system_prompt.push_str(extra);
    }
    if cli.no_stream {
        config.stream = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("parley").chain(args.iter().copied()))
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "--provider",
            "ollama",
            "--model",
            "llama3.2",
            "--temperature",
            "0.2",
            "--max-tokens",
            "512",
            "--no-stream",
        ]);
        let mut config = AppConfig::default();
        apply_flags(&mut config, &cli);

        assert_eq!(config.default_provider, "ollama");
        assert_eq!(config.default_model, "llama3.2");
        assert!((config.default_temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.default_max_tokens, 512);
        assert!(!config.stream);
    }

    #[test]
    fn system_prompt_replace_then_append() {
        let cli = parse(&["--system-prompt", "Be terse.", "--append-system-prompt", "Use Rust."]);
        let mut config = AppConfig::default();
        apply_flags(&mut config, &cli);
        assert_eq!(config.system_prompt, "Be terse.\n\nUse Rust.");
    }

    #[test]
    fn out_of_range_temperature_fails_validation() {
        let cli = parse(&["--temperature", "3.5"]);
        let mut config = AppConfig::default();
        apply_flags(&mut config, &cli);
        assert!(config.validate().is_err());
    }

    #[test]
    fn positional_query_and_output_format() {
        let cli = parse(&["--output-format", "json", "what is rust?"]);
        assert_eq!(cli.query.as_deref(), Some("what is rust?"));
        assert_eq!(cli.output_format, crate::OutputFormat::Json);
        assert!(!cli.verbose);
    }
}
