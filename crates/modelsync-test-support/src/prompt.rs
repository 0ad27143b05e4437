//! Override prompt that remembers what it was asked.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use modelsync_core::OverridePrompt;

/// Prompt returning a fixed answer and recording every message shown.
#[derive(Debug, Default)]
pub struct RecordingPrompt {
    answer: bool,
    messages: Mutex<Vec<String>>,
}

impl RecordingPrompt {
    /// Prompt that always answers `answer`.
    #[must_use]
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Messages the prompt was asked to confirm.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl OverridePrompt for RecordingPrompt {
    async fn confirm(&self, message: &str) -> bool {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_owned());
        self.answer
    }
}
