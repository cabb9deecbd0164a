use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::CpeError;

/// Processing state of a document.
///
/// ```text
/// Pending → Processing → Signed → Sent → Accepted | Rejected
///                 (any non-terminal) → Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DocumentState {
    #[default]
    Pending,
    /// XML generated, signature pending.
    Processing,
    Signed,
    Sent,
    Accepted,
    Rejected,
    Error,
}

impl DocumentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Error)
    }

    /// Whether `next` directly follows `self`.
    pub fn can_transition_to(&self, next: DocumentState) -> bool {
        use DocumentState::*;
        match (self, next) {
            (Pending, Processing)
            | (Processing, Signed)
            | (Signed, Sent)
            | (Sent, Accepted)
            | (Sent, Rejected) => true,
            (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Move to `next`, refusing skipped stages and exits from terminal states.
    pub fn advance(&mut self, next: DocumentState) -> Result<(), CpeError> {
        if !self.can_transition_to(next) {
            return Err(CpeError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Signed => "SIGNED",
            Self::Sent => "SENT",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}
