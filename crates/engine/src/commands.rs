//! Slash commands: the fixed set of `/name [args]` session controls.

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    /// Start over: empty history and context
    Clear,
    /// Persist the session, optionally naming it
    Save { name: Option<String> },
    /// Replace the session with a saved one, by id or name
    Load { target: String },
    Sessions,
    /// Show the context items
    Context,
    ContextClear,
    Delete { id: String },
    Health,
    Exit,
}

/// Catalog entry, used by `/help` and by command completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
}

pub const COMMANDS: &[CommandInfo] = &[
    CommandInfo { name: "help", usage: "/help", description: "Show available commands" },
    CommandInfo { name: "clear", usage: "/clear", description: "Clear conversation and context" },
    CommandInfo { name: "save", usage: "/save [name]", description: "Save the current session" },
    CommandInfo { name: "load", usage: "/load <id|name>", description: "Load a saved session" },
    CommandInfo { name: "sessions", usage: "/sessions", description: "List saved sessions" },
    CommandInfo { name: "context", usage: "/context [clear]", description: "Show or clear the context" },
    CommandInfo { name: "delete", usage: "/delete <id>", description: "Delete a saved session" },
    CommandInfo { name: "health", usage: "/health", description: "Check the provider connection" },
    CommandInfo { name: "exit", usage: "/exit", description: "Quit (also /quit)" },
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: /{0}. Type /help for a list.")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

impl SlashCommand {
    /// Parse a line starting with `/`.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let body = line.trim().trim_start_matches('/');
        let (name, args) = match body.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (body, ""),
        };
        let arg = (!args.is_empty()).then(|| args.to_string());

        match name.to_ascii_lowercase().as_str() {
            "help" | "?" => Ok(Self::Help),
            "clear" => Ok(Self::Clear),
            "save" => Ok(Self::Save { name: arg }),
            "load" => arg
                .map(|target| Self::Load { target })
                .ok_or(CommandError::Usage("/load <id|name>")),
            "sessions" => Ok(Self::Sessions),
            "context" => match args {
                "" => Ok(Self::Context),
                "clear" => Ok(Self::ContextClear),
                _ => Err(CommandError::Usage("/context [clear]")),
            },
            "delete" => arg
                .map(|id| Self::Delete { id })
                .ok_or(CommandError::Usage("/delete <id>")),
            "health" => Ok(Self::Health),
            "exit" | "quit" => Ok(Self::Exit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Text shown by `/help`.
pub fn help_text() -> String {
    let width = COMMANDS.iter().map(|c| c.usage.len()).max().unwrap_or(0);
    let mut out = String::from("Commands:\n");
    for cmd in COMMANDS {
        out.push_str(&format!("  {:<width$}  {}\n", cmd.usage, cmd.description));
    }
    out.push_str("\nInput:\n");
    out.push_str(&format!("  {:<width$}  {}\n", "@path", "Add a file to the context"));
    out.push_str(&format!("  {:<width$}  {}\n", "!command", "Run a shell command, add its output"));
    out.push_str(&format!("  {:<width$}  {}", "Esc / Ctrl+C", "Interrupt a streaming reply"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_commands() {
        assert_eq!(SlashCommand::parse("/help"), Ok(SlashCommand::Help));
        assert_eq!(SlashCommand::parse("/clear"), Ok(SlashCommand::Clear));
        assert_eq!(SlashCommand::parse("/sessions"), Ok(SlashCommand::Sessions));
        assert_eq!(SlashCommand::parse("/health"), Ok(SlashCommand::Health));
        assert_eq!(SlashCommand::parse("/exit"), Ok(SlashCommand::Exit));
        assert_eq!(SlashCommand::parse("/quit"), Ok(SlashCommand::Exit));
        assert_eq!(SlashCommand::parse("/EXIT"), Ok(SlashCommand::Exit));
    }

    #[test]
    fn parse_save_with_and_without_name() {
        assert_eq!(SlashCommand::parse("/save"), Ok(SlashCommand::Save { name: None }));
        assert_eq!(
            SlashCommand::parse("/save  release notes "),
            Ok(SlashCommand::Save {
                name: Some("release notes".into())
            })
        );
    }

    #[test]
    fn load_and_delete_need_arguments() {
        assert_eq!(
            SlashCommand::parse("/load 20250101-000000-abcdef"),
            Ok(SlashCommand::Load {
                target: "20250101-000000-abcdef".into()
            })
        );
        assert_eq!(
            SlashCommand::parse("/load"),
            Err(CommandError::Usage("/load <id|name>"))
        );
        assert_eq!(
            SlashCommand::parse("/delete"),
            Err(CommandError::Usage("/delete <id>"))
        );
    }

    #[test]
    fn context_subcommands() {
        assert_eq!(SlashCommand::parse("/context"), Ok(SlashCommand::Context));
        assert_eq!(SlashCommand::parse("/context clear"), Ok(SlashCommand::ContextClear));
        assert!(SlashCommand::parse("/context drop").is_err());
    }

    #[test]
    fn unknown_command() {
        let err = SlashCommand::parse("/frobnicate now").unwrap_err();
        assert_eq!(err, CommandError::Unknown("frobnicate".into()));
        assert!(err.to_string().contains("/help"));
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        for cmd in COMMANDS {
            assert!(help.contains(cmd.usage), "missing {}", cmd.usage);
        }
    }
}
