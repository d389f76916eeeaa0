#![warn(clippy::all, missing_docs)]

//! Core domain logic for the Citizen marketplace.
//!
//! This crate hosts the account and offer models, game balance
//! configuration, energy regeneration rules, the offer lifecycle with its
//! optimistic concurrency guard, and the persistence backends used by the
//! command-line frontend and any future web layer.

pub mod accounts;
pub mod config;
pub mod energy;
pub mod error;
pub mod identity;
pub mod market;
pub mod models;
pub mod store;

pub use accounts::AccountManager;
pub use config::{AppConfig, GameSettings};
pub use energy::EnergyEngine;
pub use error::{
    outcome_message, MarketError, MarketResult, StoreError, CHANGES_SAVED, DATA_MODIFIED,
};
pub use identity::{IdentityProvider, SessionDirectory};
pub use market::{ConcurrencyGuard, GuardOutcome, OfferManager};
pub use models::{
    CountryId, ItemType, Offer, OfferEdit, OfferId, OfferListing, OwnerIdentity, UserAccount,
    UserId, UserProfile,
};
pub use store::{FileStore, MarketStore, MemoryStore, WriteOutcome};
