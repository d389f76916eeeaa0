//! Marketplace offer lifecycle.

/// Optimistic write protection for offers.
pub mod guard;
/// Offer create/edit/remove and listing queries.
pub mod manager;

pub use guard::{ConcurrencyGuard, GuardOutcome};
pub use manager::OfferManager;
