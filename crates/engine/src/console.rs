//! The orchestrator's view of the terminal.
//!
//! Everything the session engine shows or asks goes through [`Console`], so
//! the engine runs the same under a raw-mode terminal, a pipe, or a test.

use async_trait::async_trait;
use parley_core::CancellationToken;
use tokio::task::JoinHandle;

#[async_trait]
pub trait Console: Send {
    /// Write a piece of streamed model output.
    fn print_chunk(&mut self, text: &str);

    /// End a block of streamed output.
    fn finish_stream(&mut self);

    fn info(&mut self, message: &str);

    fn error(&mut self, message: &str);

    /// Ask a yes/no question. Anything but an explicit yes is a no.
    async fn confirm(&mut self, prompt: &str) -> bool;

    /// Start watching for an interrupt key; cancel `cancel` when one arrives.
    ///
    /// The watch stops when the returned guard is dropped.
    fn watch_interrupt(&mut self, cancel: CancellationToken) -> InterruptWatch {
        let _ = cancel;
        InterruptWatch::none()
    }

    /// The user asked to leave the session while a reply or a prompt had
    /// the keyboard.
    fn quit_requested(&self) -> bool {
        false
    }
}

/// Guard for a running interrupt watcher. Dropping it stops the watcher.
pub struct InterruptWatch {
    stop: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl InterruptWatch {
    pub fn new(stop: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// A watch that never fires.
    pub fn none() -> Self {
        Self {
            stop: CancellationToken::new(),
            handle: None,
        }
    }

    /// Stop the watcher and wait for it to exit.
    pub async fn stop(mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for InterruptWatch {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropping_watch_stops_task() {
        let stop = CancellationToken::new();
        let observed = stop.clone();
        let handle = tokio::spawn(async move { observed.cancelled().await });
        let watch = InterruptWatch::new(stop.clone(), handle);
        drop(watch);
        assert!(stop.is_cancelled());
    }

    #[tokio::test]
    async fn stop_waits_for_task() {
        let stop = CancellationToken::new();
        let observed = stop.clone();
        let handle = tokio::spawn(async move { observed.cancelled().await });
        InterruptWatch::new(stop.clone(), handle).stop().await;
        assert!(stop.is_cancelled());
    }
}
