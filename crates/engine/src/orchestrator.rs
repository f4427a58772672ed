//! Session orchestrator: routes each submitted line to its handler and owns
//! the conversation state.
//!
//! One `Orchestrator` per interactive session. `handle_line` takes
//! `&mut self`, so there is never more than one model request in flight.

use std::sync::Arc;

use parley_config::AppConfig;
use parley_core::error::ProviderError;
use parley_core::provider::{ChatRequest, Provider};
use parley_core::session::{Session, SessionId, SessionStore};
use parley_core::stream::stream;
use parley_core::turn::Turn;
use parley_core::workspace::{CommandRunner, FileSource};
use parley_core::CancellationToken;
use parley_security::CommandPolicy;
use tracing::{debug, info, warn};

use crate::commands::{help_text, SlashCommand};
use crate::console::Console;
use crate::context::ContextAggregator;
use crate::history::{optimize, HistoryLimits};
use crate::input::{classify, ParsedInput};

/// Command output kept in context is cut to this many characters.
pub const OUTPUT_SUMMARY_CHARS: usize = 8_000;

/// Whether the session loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Per-session model and limit settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Stream replies; otherwise wait for the complete reply
    pub stream: bool,
    pub history: HistoryLimits,
    pub context_max_chars: usize,
    /// Persist after every assistant turn
    pub auto_save: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            system_prompt: String::new(),
            temperature: 0.7,
            max_tokens: None,
            stream: true,
            history: HistoryLimits::default(),
            context_max_chars: crate::context::DEFAULT_MAX_CHARS,
            auto_save: false,
        }
    }
}

impl SessionSettings {
    /// Settings for `provider` from the loaded configuration.
    pub fn from_config(config: &AppConfig, provider: &str) -> Self {
        Self {
            model: config.model_for(provider),
            system_prompt: config.system_prompt.clone(),
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            stream: config.stream,
            history: HistoryLimits::from(&config.history),
            context_max_chars: config.context.max_chars,
            auto_save: config.sessions.auto_save,
        }
    }
}

/// The collaborators a session talks to.
pub struct Collaborators {
    pub provider: Arc<dyn Provider>,
    pub files: Arc<dyn FileSource>,
    pub runner: Arc<dyn CommandRunner>,
    pub store: Arc<dyn SessionStore>,
    pub policy: CommandPolicy,
}

/// The assistant's reply to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// The user interrupted the reply; `text` is what arrived before that
    pub cancelled: bool,
}

pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    files: Arc<dyn FileSource>,
    runner: Arc<dyn CommandRunner>,
    store: Arc<dyn SessionStore>,
    policy: CommandPolicy,
    settings: SessionSettings,
    session: Session,
    context: ContextAggregator,
    console: Box<dyn Console>,
}

impl Orchestrator {
    pub fn new(parts: Collaborators, settings: SessionSettings, console: Box<dyn Console>) -> Self {
        let session = Session::new(parts.provider.name());
        let context = ContextAggregator::new(settings.context_max_chars);
        Self {
            provider: parts.provider,
            files: parts.files,
            runner: parts.runner,
            store: parts.store,
            policy: parts.policy,
            settings,
            session,
            context,
            console,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn context(&self) -> &ContextAggregator {
        &self.context
    }

    /// Route one submitted line. Every failure is reported through the
    /// console; the session ends on `/exit` or when the console reports a
    /// quit request.
    pub async fn handle_line(&mut self, line: &str) -> Flow {
        if line.trim().is_empty() {
            return Flow::Continue;
        }

        let flow = match classify(line) {
            ParsedInput::Slash { line } => self.handle_slash(&line).await,
            ParsedInput::Shell { command } => {
                self.run_shell(&command).await;
                Flow::Continue
            }
            ParsedInput::FileReference { files, payload } => {
                self.add_files(&files).await;
                if !payload.is_empty() {
                    self.message(&payload).await;
                }
                Flow::Continue
            }
            ParsedInput::Message { payload } => {
                self.message(payload.trim()).await;
                Flow::Continue
            }
        };

        if self.console.quit_requested() {
            debug!("Quit requested");
            return Flow::Exit;
        }
        flow
    }

    async fn message(&mut self, text: &str) {
        match self.send(text).await {
            Ok(reply) if reply.cancelled => self.console.info("[interrupted]"),
            Ok(_) => {}
            Err(e) => self.console.error(&format!("{}: {e}", self.provider.name())),
        }
    }

    // --- File references ---

    /// Read each file into the context. Failures are reported per file and
    /// do not stop the rest.
    pub async fn add_files(&mut self, paths: &[String]) {
        for path in paths {
            match self.files.read(path).await {
                Ok(file) => {
                    self.context.add(path.clone(), file.content);
                    self.console
                        .info(&format!("Added {path} to context ({} bytes)", file.size));
                }
                Err(e) => {
                    debug!(path = %path, error = %e, "File reference failed");
                    self.console.error(&format!("Could not read {path}: {e}"));
                }
            }
        }
    }

    // --- Shell ---

    /// Gate, confirm, run, and capture a shell command.
    pub async fn run_shell(&mut self, command: &str) {
        if command.is_empty() {
            self.console.error("Usage: !<command>");
            return;
        }

        let verdict = self.policy.classify(command);
        let reason = verdict.reason.as_deref().unwrap_or("flagged as unsafe");
        if verdict.dangerous {
            warn!(command = %command, reason = %reason, "Refused dangerous command");
            self.console
                .error(&format!("Refused to run `{command}`: {reason}"));
            return;
        }
        if verdict.needs_confirmation {
            let prompt = format!("{reason}: run `{command}`?");
            if !self.console.confirm(&prompt).await {
                self.console.info("Command not run.");
                return;
            }
        }

        match self.runner.run(command).await {
            Ok(output) => {
                let text = output.combined();
                if !text.is_empty() {
                    self.console.info(&text);
                }
                self.context
                    .add(format!("$ {command}"), summarize_output(&text));
                self.console
                    .info(&format!("Added output of `{command}` to context"));
            }
            Err(e) => self.console.error(&format!("Command failed: {e}")),
        }
    }

    // --- Messages ---

    /// Send a user message and record the reply.
    ///
    /// On provider failure, or when no text arrived at all, the user turn is
    /// retracted, so the history never holds a question without an answer.
    pub async fn send(&mut self, text: &str) -> Result<Reply, ProviderError> {
        self.session.push(Turn::user(text));
        let request = self.build_request();

        let cancel = CancellationToken::new();
        let watch = self.console.watch_interrupt(cancel.clone());
        let result = if self.settings.stream {
            self.stream_reply(request, &cancel).await
        } else {
            self.chat_reply(request, &cancel).await
        };
        watch.stop().await;

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                warn!(provider = %self.provider.name(), error = %e, "Model request failed");
                self.session.pop();
                return Err(e);
            }
        };

        if reply.text.is_empty() {
            // Nothing arrived: drop the question too.
            self.session.pop();
            if reply.cancelled {
                return Ok(reply);
            }
            warn!(provider = %self.provider.name(), "Reply finished without text");
            return Err(ProviderError::StreamInterrupted(
                "reply finished without any text".into(),
            ));
        }

        self.session.push(Turn::assistant(reply.text.clone()));
        if self.settings.auto_save
            && let Err(e) = self.store.save(&self.session).await
        {
            self.console.error(&format!("Auto-save failed: {e}"));
        }
        Ok(reply)
    }

    /// System prompt with the context block, plus the bounded history.
    fn build_request(&self) -> ChatRequest {
        let block = self.context.render();
        let system_prompt = match (self.settings.system_prompt.is_empty(), block.is_empty()) {
            (_, true) => self.settings.system_prompt.clone(),
            (true, false) => block,
            (false, false) => format!("{}\n\n{block}", self.settings.system_prompt),
        };
        let turns = optimize(&self.session.turns, self.settings.history);
        debug!(
            turns = turns.len(),
            system_chars = system_prompt.len(),
            "Built request"
        );
        ChatRequest::new(&self.settings.model, system_prompt, turns)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
    }

    async fn stream_reply(
        &mut self,
        request: ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<Reply, ProviderError> {
        let console = &mut self.console;
        let outcome = stream(self.provider.as_ref(), request, cancel, |chunk| {
            if !chunk.text.is_empty() {
                console.print_chunk(&chunk.text);
            }
        })
        .await;
        if outcome.as_ref().is_ok_and(|o| !o.text.is_empty()) {
            self.console.finish_stream();
        }
        let outcome = outcome?;
        Ok(Reply {
            cancelled: outcome.was_cancelled(),
            text: outcome.text,
        })
    }

    async fn chat_reply(
        &mut self,
        request: ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<Reply, ProviderError> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(Reply { text: String::new(), cancelled: true });
            }
            response = self.provider.chat(request) => response?,
        };
        if !response.text.is_empty() {
            self.console.print_chunk(&response.text);
            self.console.finish_stream();
        }
        Ok(Reply {
            text: response.text,
            cancelled: false,
        })
    }

    // --- Slash commands ---

    async fn handle_slash(&mut self, line: &str) -> Flow {
        let command = match SlashCommand::parse(line) {
            Ok(command) => command,
            Err(e) => {
                self.console.error(&e.to_string());
                return Flow::Continue;
            }
        };

        match command {
            SlashCommand::Help => self.console.info(&help_text()),
            SlashCommand::Clear => {
                self.session = Session::new(self.provider.name());
                self.context.clear();
                self.console.info("Conversation and context cleared.");
            }
            SlashCommand::Save { name } => self.save(name).await,
            SlashCommand::Load { target } => self.load(&target).await,
            SlashCommand::Sessions => self.list_sessions().await,
            SlashCommand::Context => self.show_context(),
            SlashCommand::ContextClear => {
                self.context.clear();
                self.console.info("Context cleared.");
            }
            SlashCommand::Delete { id } => {
                match self.store.delete(&SessionId::from(id.as_str())).await {
                    Ok(true) => self.console.info(&format!("Deleted session {id}")),
                    Ok(false) => self.console.error(&format!("No session with id {id}")),
                    Err(e) => self.console.error(&format!("Delete failed: {e}")),
                }
            }
            SlashCommand::Health => {
                let name = self.provider.name().to_string();
                if self.provider.check_health().await {
                    self.console.info(&format!("{name}: reachable"));
                } else {
                    self.console.error(&format!("{name}: unreachable"));
                }
            }
            SlashCommand::Exit => return Flow::Exit,
        }
        Flow::Continue
    }

    async fn save(&mut self, name: Option<String>) {
        if name.is_some() {
            self.session.name = name;
        }
        match self.store.save(&self.session).await {
            Ok(()) => {
                info!(id = %self.session.id, "Saved session");
                self.console.info(&format!(
                    "Saved session {} ({} turns)",
                    self.session.label(),
                    self.session.turns.len()
                ));
            }
            Err(e) => self.console.error(&format!("Save failed: {e}")),
        }
    }

    async fn load(&mut self, target: &str) {
        let found = match self.store.load(&SessionId::from(target)).await {
            Ok(Some(session)) => Ok(Some(session)),
            Ok(None) => self.store.find_by_name(target).await,
            Err(e) => Err(e),
        };

        match found {
            Ok(Some(session)) => {
                self.console.info(&format!(
                    "Loaded session {} ({} turns)",
                    session.label(),
                    session.turns.len()
                ));
                self.session = session;
                self.context.clear();
            }
            Ok(None) => self
                .console
                .error(&format!("No saved session matches '{target}'")),
            Err(e) => self.console.error(&format!("Load failed: {e}")),
        }
    }

    async fn list_sessions(&mut self) {
        let sessions = match self.store.list().await {
            Ok(sessions) => sessions,
            Err(e) => {
                self.console.error(&format!("Could not list sessions: {e}"));
                return;
            }
        };
        if sessions.is_empty() {
            self.console.info("No saved sessions.");
            return;
        }

        let mut out = String::from("Saved sessions:");
        for s in &sessions {
            let marker = if s.id == self.session.id { "*" } else { " " };
            out.push_str(&format!(
                "\n{marker} {}  {:<20}  {:>3} turns  {}",
                s.id,
                s.name.as_deref().unwrap_or("-"),
                s.turns.len(),
                s.updated_at.format("%Y-%m-%d %H:%M")
            ));
        }
        self.console.info(&out);
    }

    fn show_context(&mut self) {
        if self.context.is_empty() {
            self.console.info("Context is empty.");
            return;
        }
        let mut out = String::from("Context:");
        for item in self.context.items() {
            out.push_str(&format!("\n  {}  ({} bytes)", item.key, item.size));
        }
        out.push_str(&format!(
            "\n{} items, {} bytes",
            self.context.count(),
            self.context.total_size()
        ));
        self.console.info(&out);
    }
}

/// Cap command output for the context.
pub fn summarize_output(text: &str) -> String {
    match text.char_indices().nth(OUTPUT_SUMMARY_CHARS) {
        Some((cut, _)) => format!("{}\n... (output truncated)", &text[..cut]),
        None => text.to_string(),
    }
}
