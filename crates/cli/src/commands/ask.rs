//! `parley "QUERY"`: one turn, printed as text or JSON.

use async_trait::async_trait;
use parley_engine::{classify, Console, Orchestrator, ParsedInput, Reply};
use parley_terminal::PlainConsole;

use super::Setup;
use crate::OutputFormat;

pub async fn run(
    setup: Setup,
    query: &str,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let provider = setup.parts.provider.name().to_string();
    let model = setup.settings.model.clone();

    let console: Box<dyn Console> = match format {
        OutputFormat::Text => Box::new(PlainConsole),
        OutputFormat::Json => Box::new(QuietConsole),
    };
    let mut orchestrator = Orchestrator::new(setup.parts, setup.settings, console);

    let reply = one_turn(&mut orchestrator, query)
        .await
        .map_err(|e| format!("{provider}: {e}"))?;

    if format == OutputFormat::Json {
        let context: Vec<&str> = orchestrator
            .context()
            .items()
            .map(|item| item.key.as_str())
            .collect();
        let output = serde_json::json!({
            "provider": provider,
            "model": model,
            "response": reply.as_ref().map(|r| r.text.as_str()),
            "cancelled": reply.as_ref().is_some_and(|r| r.cancelled),
            "context": context,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    Ok(())
}

/// Run a single query. Messages and file references go to the model and
/// return its reply; shell and slash input is handled as in a session.
async fn one_turn(
    orchestrator: &mut Orchestrator,
    query: &str,
) -> Result<Option<Reply>, parley_core::ProviderError> {
    let text = match classify(query) {
        ParsedInput::Message { payload } => payload,
        ParsedInput::FileReference { files, payload } => {
            orchestrator.add_files(&files).await;
            payload
        }
        ParsedInput::Shell { .. } | ParsedInput::Slash { .. } => {
            orchestrator.handle_line(query).await;
            return Ok(None);
        }
    };

    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    orchestrator.send(text).await.map(Some)
}

/// Keeps stdout clean for JSON: the reply is printed once at the end,
/// notices go to stderr.
struct QuietConsole;

#[async_trait]
impl Console for QuietConsole {
    fn print_chunk(&mut self, _text: &str) {}

    fn finish_stream(&mut self) {}

    fn info(&mut self, message: &str) {
        eprintln!("{message}");
    }

    fn error(&mut self, message: &str) {
        eprintln!("{message}");
    }

    async fn confirm(&mut self, _prompt: &str) -> bool {
        false
    }
}
