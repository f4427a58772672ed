//! End-to-end session tests.
//!
//! These drive the orchestrator with the real file reader, shell runner and
//! file-backed session store, and a scripted model provider.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use parley_core::error::{ProviderError, ToolError};
use parley_core::provider::{ChatRequest, ChatResponse, ChunkReceiver, Provider, StreamChunk};
use parley_core::workspace::{CommandOutput, CommandRunner};
use parley_engine::{Collaborators, Console, Flow, Orchestrator, SessionSettings};
use parley_security::CommandPolicy;
use parley_store::FileSessionStore;
use parley_tools::{LocalFiles, ShellRunner};
use tokio::sync::mpsc;

// ── Test doubles ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    output: Mutex<Vec<String>>,
    requests: Mutex<Vec<ChatRequest>>,
    spawned: Mutex<Vec<String>>,
}

impl Recorder {
    fn saw(&self, needle: &str) -> bool {
        self.output.lock().unwrap().iter().any(|l| l.contains(needle))
    }
}

struct RecordingConsole(Arc<Recorder>);

#[async_trait]
impl Console for RecordingConsole {
    fn print_chunk(&mut self, text: &str) {
        self.0.output.lock().unwrap().push(text.to_string());
    }
    fn finish_stream(&mut self) {}
    fn info(&mut self, message: &str) {
        self.0.output.lock().unwrap().push(message.to_string());
    }
    fn error(&mut self, message: &str) {
        self.0.output.lock().unwrap().push(format!("ERROR {message}"));
    }
    async fn confirm(&mut self, _prompt: &str) -> bool {
        true
    }
}

/// Streams "Sure." in two chunks, or fails every call.
struct ScriptedProvider {
    recorder: Arc<Recorder>,
    fail: bool,
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.recorder.requests.lock().unwrap().push(request.clone());
        Ok(ChatResponse {
            text: "Sure.".into(),
            tokens_used: None,
            model: request.model,
        })
    }

    async fn open_stream(&self, request: ChatRequest) -> Result<ChunkReceiver, ProviderError> {
        self.recorder.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: "upstream exploded".into(),
            });
        }
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let _ = tx.send(Ok(StreamChunk::text("Sure"))).await;
            let _ = tx.send(Ok(StreamChunk::text("."))).await;
            let _ = tx.send(Ok(StreamChunk::done())).await;
        });
        Ok(rx)
    }
}

/// Records commands instead of running them.
struct CountingRunner(Arc<Recorder>);

#[async_trait]
impl CommandRunner for CountingRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput, ToolError> {
        self.0.spawned.lock().unwrap().push(command.to_string());
        Ok(CommandOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

struct Fixture {
    orchestrator: Orchestrator,
    recorder: Arc<Recorder>,
    _dir: tempfile::TempDir,
}

fn fixture(fail: bool, runner: Option<Arc<dyn CommandRunner>>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("README.md"), "Hello world").unwrap();
    fixture_in(dir, fail, runner)
}

fn fixture_in(
    dir: tempfile::TempDir,
    fail: bool,
    runner: Option<Arc<dyn CommandRunner>>,
) -> Fixture {
    let recorder = Arc::new(Recorder::default());
    let runner = runner.unwrap_or_else(|| Arc::new(CountingRunner(recorder.clone())));
    let parts = Collaborators {
        provider: Arc::new(ScriptedProvider {
            recorder: recorder.clone(),
            fail,
        }),
        files: Arc::new(LocalFiles::new(dir.path())),
        runner,
        store: Arc::new(FileSessionStore::new(dir.path().join("sessions"))),
        policy: CommandPolicy::builtin().clone(),
    };
    let settings = SessionSettings {
        model: "mock-model".into(),
        system_prompt: "You are helpful.".into(),
        ..SessionSettings::default()
    };
    Fixture {
        orchestrator: Orchestrator::new(
            parts,
            settings,
            Box::new(RecordingConsole(recorder.clone())),
        ),
        recorder,
        _dir: dir,
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn file_reference_feeds_context_and_payload() {
    let mut f = fixture(false, None);

    let flow = f.orchestrator.handle_line("@README.md summarize this").await;
    assert_eq!(flow, Flow::Continue);

    assert!(f.orchestrator.context().render().contains("Hello world"));
    let requests = f.recorder.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].system_prompt.starts_with("You are helpful."));
    assert!(requests[0].system_prompt.contains("Hello world"));
    assert_eq!(requests[0].turns.len(), 1);
    assert_eq!(requests[0].turns[0].content, "summarize this");

    let turns = &f.orchestrator.session().turns;
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].content, "Sure.");
}

#[tokio::test]
async fn dangerous_command_never_spawns() {
    let mut f = fixture(false, None);
    f.orchestrator.handle_line("!rm -rf /").await;

    assert!(f.recorder.spawned.lock().unwrap().is_empty());
    assert!(f.recorder.saw("Refused to run `rm -rf /`"));
    assert!(f.orchestrator.context().is_empty());
}

#[tokio::test]
async fn provider_failure_retracts_user_turn() {
    let mut f = fixture(true, None);
    f.orchestrator.handle_line("hello?").await;

    assert!(f.orchestrator.session().turns.is_empty());
    assert!(f.recorder.saw("ERROR e2e_mock: API request failed: upstream exploded"));
}

#[tokio::test]
async fn missing_file_does_not_block_others() {
    let mut f = fixture(false, None);
    f.orchestrator.handle_line("@nope.txt @README.md").await;

    assert!(f.recorder.saw("ERROR Could not read nope.txt"));
    assert_eq!(f.orchestrator.context().count(), 1);
    assert!(f.recorder.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn saved_session_survives_a_new_orchestrator() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let mut first = fixture_in(dir, false, None);
    first.orchestrator.handle_line("remember me").await;
    first.orchestrator.handle_line("/save keeper").await;
    let id = first.orchestrator.session().id.clone();
    assert!(root.join("sessions").join(format!("{id}.json")).exists());

    let second_dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let parts = Collaborators {
        provider: Arc::new(ScriptedProvider {
            recorder: recorder.clone(),
            fail: false,
        }),
        files: Arc::new(LocalFiles::new(second_dir.path())),
        runner: Arc::new(CountingRunner(recorder.clone())),
        store: Arc::new(FileSessionStore::new(root.join("sessions"))),
        policy: CommandPolicy::builtin().clone(),
    };
    let mut second = Orchestrator::new(
        parts,
        SessionSettings::default(),
        Box::new(RecordingConsole(recorder.clone())),
    );

    second.handle_line("/load keeper").await;
    assert_eq!(second.session().id, id);
    assert_eq!(second.session().turns.len(), 2);
    assert_eq!(second.session().turns[0].content, "remember me");

    assert_eq!(second.handle_line("/exit").await, Flow::Exit);
}

#[cfg(unix)]
#[tokio::test]
async fn shell_output_lands_in_context() {
    let runner = ShellRunner::new(std::time::Duration::from_secs(10), 1024 * 1024);
    let mut f = fixture(false, Some(Arc::new(runner)));
    f.orchestrator.handle_line("!echo parley-e2e").await;

    let item = f.orchestrator.context().items().next().unwrap();
    assert_eq!(item.key, "$ echo parley-e2e");
    assert_eq!(item.content, "parley-e2e");
}
