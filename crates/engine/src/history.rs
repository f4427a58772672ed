//! History optimizer: the bounded view of the conversation sent to a model.
//!
//! The stored history is never modified; [`optimize`] returns a copy.

use parley_config::HistoryConfig;
use parley_core::turn::Turn;
use tracing::debug;

/// Bounds on the history view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    pub max_turns: usize,
    pub max_chars: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_turns: 20,
            max_chars: 30_000,
        }
    }
}

impl From<&HistoryConfig> for HistoryLimits {
    fn from(config: &HistoryConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            max_chars: config.max_chars,
        }
    }
}

/// Select the most recent turns that fit within `limits`.
///
/// Takes the last `max_turns` turns, then walks newest to oldest and stops
/// at the first turn that would push the character total over `max_chars`.
/// The newest turn is always kept, even when it alone is over budget.
/// Tool-call turns may be separated from their context at the cut.
pub fn optimize(turns: &[Turn], limits: HistoryLimits) -> Vec<Turn> {
    let window_start = turns.len().saturating_sub(limits.max_turns);
    let window = &turns[window_start..];

    let mut used = 0usize;
    let mut admitted = 0usize;
    for turn in window.iter().rev() {
        let len = turn.char_len();
        if admitted > 0 && used + len > limits.max_chars {
            break;
        }
        used += len;
        admitted += 1;
        if used > limits.max_chars {
            // Oversized newest turn: send it alone.
            break;
        }
    }

    let kept = &window[window.len() - admitted..];
    if kept.len() < turns.len() {
        debug!(
            total = turns.len(),
            kept = kept.len(),
            chars = used,
            "History trimmed"
        );
    }
    kept.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::turn::Segment;

    fn limits(max_turns: usize, max_chars: usize) -> HistoryLimits {
        HistoryLimits {
            max_turns,
            max_chars,
        }
    }

    fn conversation(n: usize, chars: usize) -> Vec<Turn> {
        (0..n)
            .map(|i| {
                let text = format!("{i:0>width$}", width = chars);
                if i % 2 == 0 {
                    Turn::user(text)
                } else {
                    Turn::assistant(text)
                }
            })
            .collect()
    }

    #[test]
    fn short_history_is_unchanged() {
        let turns = conversation(4, 10);
        assert_eq!(optimize(&turns, HistoryLimits::default()), turns);
    }

    #[test]
    fn empty_history() {
        assert!(optimize(&[], HistoryLimits::default()).is_empty());
    }

    #[test]
    fn window_limits_turn_count() {
        let turns = conversation(30, 5);
        let out = optimize(&turns, limits(20, 30_000));
        assert_eq!(out.len(), 20);
        assert_eq!(out, turns[10..].to_vec());
    }

    #[test]
    fn char_budget_drops_oldest() {
        let turns = conversation(10, 100);
        let out = optimize(&turns, limits(20, 350));
        assert_eq!(out.len(), 3);
        assert_eq!(out, turns[7..].to_vec());
        assert!(out.iter().map(Turn::char_len).sum::<usize>() <= 350);
    }

    #[test]
    fn stops_at_first_turn_over_budget() {
        // A large middle turn blocks older small turns from being admitted.
        let turns = vec![
            Turn::user("a"),
            Turn::assistant("x".repeat(100)),
            Turn::user("b"),
        ];
        let out = optimize(&turns, limits(20, 50));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "b");
    }

    #[test]
    fn oversized_newest_turn_is_sent_alone() {
        let mut turns = conversation(3, 10);
        turns.push(Turn::user("y".repeat(1_000)));
        let out = optimize(&turns, limits(20, 100));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content.len(), 1_000);
    }

    #[test]
    fn tool_call_segments_count_toward_budget() {
        let call = Segment::ToolCall {
            id: "c".into(),
            name: "shell".into(),
            arguments: "{\"command\":\"ls -la\"}".into(),
        };
        let with_call = Turn::assistant("").with_segment(call);
        let call_len = with_call.char_len();
        assert!(call_len > 0);

        let turns = vec![with_call, Turn::user("go")];
        let out = optimize(&turns, limits(20, call_len + 1));
        assert_eq!(out.len(), 1);
        let out = optimize(&turns, limits(20, call_len + 2));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn optimize_is_idempotent() {
        for (n, chars, max_turns, max_chars) in
            [(30, 50, 20, 600), (5, 10, 3, 1_000), (12, 200, 20, 150), (0, 1, 1, 1)]
        {
            let turns = conversation(n, chars);
            let l = limits(max_turns, max_chars);
            let once = optimize(&turns, l);
            let twice = optimize(&once, l);
            assert_eq!(once, twice);
            assert!(once.len() <= max_turns);
        }
    }

    #[test]
    fn limits_from_config() {
        let config = HistoryConfig {
            max_turns: 7,
            max_chars: 999,
        };
        assert_eq!(HistoryLimits::from(&config), limits(7, 999));
    }
}
