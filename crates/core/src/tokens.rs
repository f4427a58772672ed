//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. The numbers are
//! advisory and never reported as exact counts.

use crate::turn::Turn;

/// Characters per token assumed by the heuristic.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Estimate tokens for a single turn including per-turn overhead.
///
/// Each turn costs ~4 tokens of overhead for the role name and delimiters in
/// the wire format.
pub fn estimate_turn_tokens(turn: &Turn) -> usize {
    let overhead = 4;
    overhead + turn.char_len().div_ceil(CHARS_PER_TOKEN)
}

/// Estimate tokens for a slice of turns.
pub fn estimate_turns_tokens(turns: &[Turn]) -> usize {
    turns.iter().map(estimate_turn_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn turn_includes_overhead() {
        let turn = Turn::user("test"); // 1 token + 4 overhead
        assert_eq!(estimate_turn_tokens(&turn), 5);
    }

    #[test]
    fn multiple_turns() {
        let turns = vec![Turn::user("hello"), Turn::assistant("world")];
        assert_eq!(estimate_turns_tokens(&turns), 12);
    }
}
