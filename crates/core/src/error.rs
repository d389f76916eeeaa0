//! Error types shared by the marketplace and account services.

use thiserror::Error;

use crate::models::{OfferId, UserId};

/// Message shown to a user after a committed edit.
pub const CHANGES_SAVED: &str = "Changes saved";

/// Message shown to a user when an optimistic edit lost a race.
pub const DATA_MODIFIED: &str = "Data has been modified by someone else. Try again.";

/// Failures raised by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem access failed.
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded.
    #[error("store snapshot is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Atomic replacement of the snapshot file failed.
    #[error("failed to replace store snapshot: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// An account with this id is already registered.
    #[error("user {0} already exists")]
    DuplicateUser(UserId),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Entity named in a [`MarketError::NotFound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    /// A marketplace offer.
    Offer(OfferId),
    /// A user account.
    User(UserId),
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Missing::Offer(id) => write!(f, "offer {id}"),
            Missing::User(id) => write!(f, "user {id}"),
        }
    }
}

/// Domain failures surfaced to callers.
#[derive(Debug, Error)]
pub enum MarketError {
    /// Malformed input; nothing was committed.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Referenced record does not exist, or was deleted concurrently.
    #[error("{0} not found")]
    NotFound(Missing),

    /// Caller does not own the offer it tried to change.
    #[error("offer {0} belongs to another user")]
    OwnershipViolation(OfferId),

    /// Another writer committed first.
    #[error("Data has been modified by someone else. Try again.")]
    ConcurrencyConflict,

    /// Not enough spendable energy for the action.
    #[error("insufficient energy: need {required}, have {available}")]
    InsufficientEnergy {
        /// Energy the action costs.
        required: u32,
        /// Energy the user has.
        available: u32,
    },

    /// Not enough money for the action.
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        /// Money the action costs.
        required: rust_decimal::Decimal,
        /// Money the user has.
        available: rust_decimal::Decimal,
    },

    /// Session token does not map to a signed-in user.
    #[error("unknown session")]
    UnknownSession,

    /// Infrastructure failure, propagated unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MarketError {
    /// Whether the caller may treat this error as "nothing there any more".
    pub fn is_not_found(&self) -> bool {
        matches!(self, MarketError::NotFound(_))
    }

    pub(crate) fn offer_not_found(id: OfferId) -> Self {
        MarketError::NotFound(Missing::Offer(id))
    }

    pub(crate) fn user_not_found(id: &UserId) -> Self {
        MarketError::NotFound(Missing::User(id.clone()))
    }
}

/// Result type for marketplace and account operations.
pub type MarketResult<T> = Result<T, MarketError>;

/// User-facing status line for the outcome of a write.
pub fn outcome_message<T>(result: &MarketResult<T>) -> String {
    match result {
        Ok(_) => CHANGES_SAVED.to_string(),
        Err(err) => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_is_verbatim() {
        assert_eq!(MarketError::ConcurrencyConflict.to_string(), DATA_MODIFIED);
        let result: MarketResult<()> = Err(MarketError::ConcurrencyConflict);
        assert_eq!(outcome_message(&result), DATA_MODIFIED);
        assert_eq!(outcome_message(&Ok::<_, MarketError>(())), CHANGES_SAVED);
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = MarketError::offer_not_found(7);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "offer 7 not found");
    }
}
