//! Input classification: decide what a submitted line asks for.
//!
//! Precedence is slash command, then shell command, then file reference,
//! then plain message. Classification never fails.

use serde::Serialize;

/// What a submitted line is asking for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedInput {
    /// `/name args`; resolved later by [`crate::commands::SlashCommand::parse`]
    Slash { line: String },
    /// `!command`; the command with `!` and outer whitespace stripped
    Shell { command: String },
    /// One or more `@path` tokens plus whatever text remains
    FileReference { files: Vec<String>, payload: String },
    /// Anything else, passed through unchanged
    Message { payload: String },
}

/// Classify a line of user input.
pub fn classify(line: &str) -> ParsedInput {
    let trimmed = line.trim();

    if trimmed.starts_with('/') {
        return ParsedInput::Slash {
            line: trimmed.to_string(),
        };
    }

    if let Some(rest) = trimmed.strip_prefix('!') {
        return ParsedInput::Shell {
            command: rest.trim().to_string(),
        };
    }

    let (files, payload) = extract_file_refs(line);
    if !files.is_empty() {
        return ParsedInput::FileReference { files, payload };
    }

    ParsedInput::Message {
        payload: line.to_string(),
    }
}

/// Pull every `@token` out of `line`.
///
/// A token is `@"quoted path"` or `@` followed by a run of non-whitespace.
/// Returns the paths in order of appearance (duplicates kept) and the line
/// with the tokens removed, trimmed.
pub fn extract_file_refs(line: &str) -> (Vec<String>, String) {
    let mut files = Vec::new();
    let mut payload = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(at) = rest.find('@') {
        payload.push_str(&rest[..at]);
        let after = &rest[at + 1..];

        match scan_token(after) {
            Some((path, consumed)) => {
                files.push(path);
                rest = &after[consumed..];
            }
            None => {
                // Bare `@`: keep it as text.
                payload.push('@');
                rest = after;
            }
        }
    }
    payload.push_str(rest);

    (files, payload.trim().to_string())
}

/// Scan the token following an `@`. Returns the path and the bytes consumed.
fn scan_token(after: &str) -> Option<(String, usize)> {
    if let Some(quoted) = after.strip_prefix('"')
        && let Some(end) = quoted.find('"')
        && end > 0
    {
        return Some((quoted[..end].to_string(), end + 2));
    }

    let end = after.find(char::is_whitespace).unwrap_or(after.len());
    if end == 0 {
        return None;
    }
    Some((after[..end].to_string(), end))
}
