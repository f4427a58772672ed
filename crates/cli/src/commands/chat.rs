//! `parley` with no query: the interactive session.

use std::io::IsTerminal;

use parley_engine::{Flow, Orchestrator};
use parley_terminal::{
    LineEditor, LineSource, PlainConsole, PlainInput, TerminalConsole, TerminalInput,
    TerminalSession, WorkspaceCandidates,
};
use tracing::info;

use super::Setup;

const PROMPT: &str = "> ";

pub async fn run(setup: Setup) -> Result<(), Box<dyn std::error::Error>> {
    let interactive = std::io::stdin().is_terminal() && std::io::stdout().is_terminal();
    let provider = setup.parts.provider.name().to_string();
    let model = setup.settings.model.clone();

    if !interactive {
        let mut orchestrator =
            Orchestrator::new(setup.parts, setup.settings, Box::new(PlainConsole));
        let mut input = PlainInput::new();
        drive(&mut orchestrator, &mut input).await?;
        return Ok(());
    }

    println!();
    println!("  Parley v{}", env!("CARGO_PKG_VERSION"));
    println!("  Provider:  {provider}");
    println!("  Model:     {model}");
    println!();
    println!("  /help for commands, @file to add context, !cmd to run a command.");
    println!("  Esc stops a reply. Ctrl+C quits.");
    println!();

    let candidates = WorkspaceCandidates::new(setup.files.clone());
    let mut input = TerminalInput::new(LineEditor::new(Box::new(candidates)), PROMPT);
    let mut orchestrator =
        Orchestrator::new(setup.parts, setup.settings, Box::new(TerminalConsole::new()));

    {
        let _terminal = TerminalSession::enter()?;
        drive(&mut orchestrator, &mut input).await?;
    }

    info!(session = %orchestrator.session().id, "Session ended");
    println!("  Goodbye!");
    Ok(())
}

/// Feed lines to the orchestrator until the input ends or `/exit`.
async fn drive(
    orchestrator: &mut Orchestrator,
    input: &mut dyn LineSource,
) -> std::io::Result<()> {
    while let Some(line) = input.read_line().await? {
        if orchestrator.handle_line(&line).await == Flow::Exit {
            break;
        }
    }
    Ok(())
}
