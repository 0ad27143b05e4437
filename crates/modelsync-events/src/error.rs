//! Event bus error primitives.

use std::fmt::{self, Display, Formatter};

/// Error surfaced to subscribers while draining an event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBusError {
    /// The subscriber fell behind and the broadcast channel dropped events.
    Lagged {
        /// Number of envelopes skipped.
        skipped: u64,
    },
}

impl EventBusError {
    /// Number of envelopes lost because the subscriber lagged.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        match self {
            Self::Lagged { skipped } => *skipped,
        }
    }
}

impl Display for EventBusError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("event subscriber lagged")
    }
}

impl std::error::Error for EventBusError {}

/// Result wrapper for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lagged_error_exposes_skip_count() {
        let err = EventBusError::Lagged { skipped: 7 };
        assert_eq!(err.skipped(), 7);
        assert_eq!(err.to_string(), "event subscriber lagged");
    }
}
