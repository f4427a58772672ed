//! Context aggregator: named blocks of text (file contents, command output)
//! rendered into the system prompt on every model request.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default ceiling on the rendered context block, in characters.
pub const DEFAULT_MAX_CHARS: usize = 50_000;

/// Appended when the rendered block is cut at the ceiling.
pub const TRUNCATION_MARKER: &str = "\n... (truncated)";

/// One named piece of context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextItem {
    pub key: String,
    pub content: String,
    /// Size of `content` in bytes
    pub size: usize,
    pub added_at: DateTime<Utc>,
}

/// Ordered, keyed context items.
///
/// Adding an existing key replaces its content but keeps its position.
#[derive(Debug, Clone)]
pub struct ContextAggregator {
    items: Vec<ContextItem>,
    total_size: usize,
    max_chars: usize,
}

impl Default for ContextAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS)
    }
}

impl ContextAggregator {
    /// An empty aggregator rendering at most `max_chars` characters. The
    /// ceiling is raised to the length of [`TRUNCATION_MARKER`] if lower.
    pub fn new(max_chars: usize) -> Self {
        Self {
            items: Vec::new(),
            total_size: 0,
            max_chars: max_chars.max(TRUNCATION_MARKER.chars().count()),
        }
    }

    /// Add or replace an item.
    pub fn add(&mut self, key: impl Into<String>, content: impl Into<String>) {
        let key = key.into();
        let content = content.into();
        let size = content.len();

        if let Some(existing) = self.items.iter_mut().find(|i| i.key == key) {
            self.total_size = self.total_size - existing.size + size;
            existing.content = content;
            existing.size = size;
            existing.added_at = Utc::now();
            return;
        }

        self.total_size += size;
        self.items.push(ContextItem {
            key,
            content,
            size,
            added_at: Utc::now(),
        });
    }

    /// Remove an item. Returns whether it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.items.iter().position(|i| i.key == key) {
            Some(idx) => {
                let item = self.items.remove(idx);
                self.total_size -= item.size;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.total_size = 0;
    }

    /// Total content size in bytes.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &ContextItem> {
        self.items.iter()
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Render all items as fenced blocks, in insertion order.
    ///
    /// Output longer than the ceiling is cut so that the body plus
    /// [`TRUNCATION_MARKER`] fits exactly within it.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            out.push_str("### ");
            out.push_str(&item.key);
            out.push_str("\n```\n");
            out.push_str(&item.content);
            out.push_str("\n```\n");
        }

        if out.chars().count() <= self.max_chars {
            return out;
        }

        let keep = self
            .max_chars
            .saturating_sub(TRUNCATION_MARKER.chars().count());
        let cut = out
            .char_indices()
            .nth(keep)
            .map(|(idx, _)| idx)
            .unwrap_or(out.len());
        out.truncate(cut);
        out.push_str(TRUNCATION_MARKER);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_in_insertion_order() {
        let mut ctx = ContextAggregator::default();
        ctx.add("b.txt", "second");
        ctx.add("a.txt", "first");
        assert_eq!(
            ctx.render(),
            "### b.txt\n```\nsecond\n```\n### a.txt\n```\nfirst\n```\n"
        );
    }

    #[test]
    fn empty_renders_empty() {
        assert_eq!(ContextAggregator::default().render(), "");
    }

    #[test]
    fn overwrite_keeps_position_and_updates_size() {
        let mut ctx = ContextAggregator::default();
        ctx.add("a", "12345");
        ctx.add("b", "xy");
        ctx.add("a", "1");
        assert_eq!(ctx.count(), 2);
        assert_eq!(ctx.total_size(), 3);
        let keys: Vec<&str> = ctx.items().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(ctx.render().starts_with("### a\n```\n1\n"));
    }

    #[test]
    fn size_counts_bytes() {
        let mut ctx = ContextAggregator::default();
        ctx.add("u", "héllo");
        assert_eq!(ctx.total_size(), 6);
    }

    #[test]
    fn remove_and_clear() {
        let mut ctx = ContextAggregator::default();
        ctx.add("a", "aaa");
        ctx.add("b", "bb");
        assert!(ctx.remove("a"));
        assert!(!ctx.remove("a"));
        assert_eq!(ctx.total_size(), 2);
        ctx.clear();
        assert!(ctx.is_empty());
        assert_eq!(ctx.total_size(), 0);
    }

    #[test]
    fn render_truncates_at_ceiling() {
        let mut ctx = ContextAggregator::new(100);
        ctx.add("big.log", "x".repeat(500));
        let rendered = ctx.render();
        assert_eq!(rendered.chars().count(), 100);
        assert!(rendered.ends_with(TRUNCATION_MARKER));
        assert!(rendered.starts_with("### big.log\n"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut ctx = ContextAggregator::new(40);
        ctx.add("k", "é".repeat(100));
        let rendered = ctx.render();
        assert_eq!(rendered.chars().count(), 40);
        assert!(rendered.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn render_at_exact_ceiling_is_untouched() {
        let full_len = "### k\n```\nv\n```\n".len();
        let mut ctx = ContextAggregator::new(full_len);
        ctx.add("k", "v");
        assert!(!ctx.render().ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn ceiling_below_marker_is_raised() {
        let mut ctx = ContextAggregator::new(5);
        assert_eq!(ctx.max_chars(), TRUNCATION_MARKER.chars().count());
        ctx.add("k", "x".repeat(100));
        let rendered = ctx.render();
        assert_eq!(rendered, TRUNCATION_MARKER);
        assert!(rendered.chars().count() <= ctx.max_chars());
    }

    #[test]
    fn every_key_rendered_when_not_truncated() {
        let mut ctx = ContextAggregator::default();
        for i in 0..10 {
            ctx.add(format!("file{i}.rs"), "fn x() {}");
        }
        let rendered = ctx.render();
        for i in 0..10 {
            assert!(rendered.contains(&format!("### file{i}.rs")));
        }
    }
}
