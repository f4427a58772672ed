//! Command safety gate. Decides whether a shell command may run.
//!
//! Rules are data: two ordered tables of `(pattern, reason)` pairs compiled
//! into [`CommandRule`]s. The blocking table is always consulted before the
//! warning table, so a catastrophic command can never be merely "warned".
//!
//! Matching is substring/regex based. It can flag harmless commands
//! (`rm -rf ./build-report/`) and miss destructive ones phrased differently;
//! it is a heuristic gate, not a sandbox.

use std::sync::LazyLock;

use parley_config::ShellConfig;
use regex_lite::Regex;
use serde::Serialize;
use tracing::debug;

/// Outcome of classifying a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandVerdict {
    /// Must never run
    pub dangerous: bool,
    /// Must be confirmed by the user before running
    pub needs_confirmation: bool,
    /// Why the command was flagged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CommandVerdict {
    fn allow() -> Self {
        Self {
            dangerous: false,
            needs_confirmation: false,
            reason: None,
        }
    }

    fn block(reason: &str) -> Self {
        Self {
            dangerous: true,
            needs_confirmation: true,
            reason: Some(reason.to_string()),
        }
    }

    fn warn(reason: &str) -> Self {
        Self {
            dangerous: false,
            needs_confirmation: true,
            reason: Some(reason.to_string()),
        }
    }

    /// Neither dangerous nor in need of confirmation.
    pub fn is_safe(&self) -> bool {
        !self.dangerous && !self.needs_confirmation
    }
}

/// Error building a policy from user-supplied patterns.
#[derive(Debug, thiserror::Error)]
#[error("Invalid safety pattern '{pattern}': {reason}")]
pub struct PolicyError {
    pub pattern: String,
    pub reason: String,
}

const BLOCKING_RULES: &[(&str, &str)] = &[
    (
        r"\brm\s+(?:-[a-zA-Z-]+\s+)*/\*?(?:\s|;|&|\||$)",
        "Recursive delete of the root filesystem",
    ),
    (
        r"\brm\s+(?:-[a-zA-Z-]+\s+)*(?:~|\$HOME)/?\*?(?:\s|;|&|\||$)",
        "Recursive delete of the home directory",
    ),
    (r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:", "Fork bomb"),
    (
        r">\s*/dev/(?:sd[a-z]|hd[a-z]|vd[a-z]|xvd[a-z]|nvme\d|mmcblk\d|disk\d)",
        "Write to a raw block device",
    ),
    (r"\bmkfs(?:\.[a-z0-9]+)?\b", "Filesystem formatting"),
    (r"\bdd\b[^;&|]*\bof=/dev/", "dd writing to a device file"),
    (r"(?i)(?:^\s*|[;&|]\s*)format\s+[a-z]:", "Windows drive format"),
];

const WARNING_RULES: &[(&str, &str)] = &[
    (
        r"\brm(?:\s+\S+)*?\s+(?:-[a-zA-Z]*[rR][a-zA-Z]*|--recursive)\b",
        "Recursive delete",
    ),
    (r"\brm(?:\s+\S+)*?\s+\S*\*", "Wildcard delete"),
    (r"\b(?:sudo|doas)\b|\bsu\s+-", "Privilege escalation"),
    (
        r"\bnpm\s+(?:install|i|add)\b.*(?:\s-g\b|--global\b)",
        "Global package install",
    ),
    (r"\byarn\s+global\s+add\b", "Global package install"),
    (
        r"\bpnpm\s+(?:add|install|i)\b.*(?:\s-g\b|--global\b)",
        "Global package install",
    ),
    (r"(?i)\b(?:del|erase)\b.*\s/[sq]\b", "Windows recursive or quiet delete"),
    (r"(?i)\b(?:rmdir|rd)\b.*\s/s\b", "Windows recursive directory delete"),
    (r"(?i)\bremove-item\b.*-recurse\b", "Recursive delete"),
];

/// A compiled pattern with the reason reported when it matches.
#[derive(Debug, Clone)]
pub struct CommandRule {
    regex: Regex,
    reason: String,
}

impl CommandRule {
    pub fn new(pattern: &str, reason: impl Into<String>) -> Result<Self, PolicyError> {
        let regex = Regex::new(pattern).map_err(|e| PolicyError {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            regex,
            reason: reason.into(),
        })
    }

    pub fn matches(&self, command: &str) -> bool {
        self.regex.is_match(command)
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

fn compile(table: &[(&str, &str)]) -> Result<Vec<CommandRule>, PolicyError> {
    table
        .iter()
        .map(|(pattern, reason)| CommandRule::new(pattern, *reason))
        .collect()
}

static BUILTIN: LazyLock<CommandPolicy> = LazyLock::new(|| CommandPolicy {
    blocking: compile(BLOCKING_RULES).expect("built-in blocking rules compile"),
    warning: compile(WARNING_RULES).expect("built-in warning rules compile"),
});

/// Ordered blocking and warning rule sets.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    blocking: Vec<CommandRule>,
    warning: Vec<CommandRule>,
}

impl CommandPolicy {
    /// The built-in rule set.
    pub fn builtin() -> &'static CommandPolicy {
        &BUILTIN
    }

    /// Built-in rules followed by the extra rules from `[shell]` config.
    pub fn from_config(shell: &ShellConfig) -> Result<Self, PolicyError> {
        let mut policy = Self::builtin().clone();
        for rule in &shell.extra_blocked {
            policy.blocking.push(CommandRule::new(&rule.pattern, &rule.reason)?);
        }
        for rule in &shell.extra_warned {
            policy.warning.push(CommandRule::new(&rule.pattern, &rule.reason)?);
        }
        Ok(policy)
    }

    /// Classify a raw command string.
    pub fn classify(&self, command: &str) -> CommandVerdict {
        if let Some(rule) = self.blocking.iter().find(|r| r.matches(command)) {
            debug!(command = %command, reason = %rule.reason, "Command blocked");
            return CommandVerdict::block(&rule.reason);
        }
        if let Some(rule) = self.warning.iter().find(|r| r.matches(command)) {
            debug!(command = %command, reason = %rule.reason, "Command needs confirmation");
            return CommandVerdict::warn(&rule.reason);
        }
        CommandVerdict::allow()
    }

    pub fn blocking_rules(&self) -> &[CommandRule] {
        &self.blocking
    }

    pub fn warning_rules(&self) -> &[CommandRule] {
        &self.warning
    }
}

/// Classify a command against the built-in rules.
pub fn classify(command: &str) -> CommandVerdict {
    CommandPolicy::builtin().classify(command)
}
