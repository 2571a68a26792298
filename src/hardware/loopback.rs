//! In-memory channel that records every line instead of talking to a board.
//! Used for `--dry-run` and throughout the test suite.

use super::{ChannelError, CommandChannel};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct LoopbackState {
    sent: Vec<String>,
    fail_prefixes: Vec<String>,
    fail_after: Option<usize>,
}

impl LoopbackState {
    fn should_fail(&self, line: &str) -> bool {
        if self.fail_prefixes.iter().any(|prefix| line.starts_with(prefix.as_str())) {
            return true;
        }
        matches!(self.fail_after, Some(limit) if self.sent.len() >= limit)
    }
}

/// Cloning shares the recorded history, so a test can keep one handle while the
/// sequencer owns another.
#[derive(Debug, Clone, Default)]
pub struct LoopbackChannel {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut LoopbackState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Every successfully written line, in order.
    pub fn sent(&self) -> Vec<String> {
        self.with_state(|state| state.sent.clone())
    }

    pub fn clear(&self) {
        self.with_state(|state| state.sent.clear());
    }

    /// Fail every write whose line starts with `prefix`.
    pub fn fail_matching(&self, prefix: &str) {
        self.with_state(|state| state.fail_prefixes.push(prefix.to_string()));
    }

    /// Fail every write once `count` lines have been recorded.
    pub fn fail_after(&self, count: usize) {
        self.with_state(|state| state.fail_after = Some(count));
    }

    /// Remove all injected failures.
    pub fn heal(&self) {
        self.with_state(|state| {
            state.fail_prefixes.clear();
            state.fail_after = None;
        });
    }
}

#[async_trait]
impl CommandChannel for LoopbackChannel {
    async fn write(&self, line: &str) -> Result<String, ChannelError> {
        self.with_state(|state| {
            if state.should_fail(line) {
                return Err(ChannelError::Injected(line.trim_end().to_string()));
            }
            state.sent.push(line.to_string());
            Ok("OK".to_string())
        })
    }
}
