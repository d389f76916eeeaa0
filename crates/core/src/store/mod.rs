//! Persistence boundary for accounts and offers.
//!
//! Backends implement [`MarketStore`]. Every method is atomic from the
//! caller's point of view: writers never observe each other's partial state.
//! Conditional writes compare the record's `version` against the version the
//! caller last observed and report a mismatch as [`WriteOutcome::Rejected`],
//! which is distinct from a lookup returning `None`.

/// JSON snapshot backed store.
pub mod file;
/// In-process store.
pub mod memory;

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    error::{StoreError, StoreResult},
    models::{
        initial_version, NewOffer, Offer, OfferId, OfferListing, OfferQuery, OwnerIdentity,
        UserAccount, UserId,
    },
};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Result of a version-checked write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    /// The write landed; carries the record as stored.
    Applied(T),
    /// The record is gone or its version moved on.
    Rejected,
}

impl<T> WriteOutcome<T> {
    /// Whether the write landed.
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied(_))
    }
}

/// Key-addressable storage for accounts and offers.
pub trait MarketStore: Send + Sync {
    /// Point lookup of an account.
    fn user(&self, id: &UserId) -> StoreResult<Option<UserAccount>>;

    /// All accounts, ordered by id.
    fn users(&self) -> StoreResult<Vec<UserAccount>>;

    /// Register a new account. Fails with [`StoreError::DuplicateUser`] if the id is taken.
    fn insert_user(&self, user: UserAccount) -> StoreResult<UserAccount>;

    /// Overwrite an account if its stored version equals `expected_version`.
    fn replace_user(
        &self,
        user: UserAccount,
        expected_version: u64,
    ) -> StoreResult<WriteOutcome<UserAccount>>;

    /// Point lookup of an offer.
    fn offer(&self, id: OfferId) -> StoreResult<Option<Offer>>;

    /// Point lookup of an offer joined with its owner's identity.
    fn listing(&self, id: OfferId) -> StoreResult<Option<OfferListing>>;

    /// Offers matching `query`, ascending by price. Equal prices keep
    /// insertion order.
    fn scan_listings(&self, query: &OfferQuery) -> StoreResult<Vec<OfferListing>>;

    /// Store a new offer, assigning its id.
    fn insert_offer(&self, offer: NewOffer) -> StoreResult<Offer>;

    /// Overwrite the mutable fields of an offer if its stored version equals
    /// `expected_version`. Id, owner and listing time are kept from the
    /// stored record.
    fn replace_offer(
        &self,
        offer: Offer,
        expected_version: u64,
    ) -> StoreResult<WriteOutcome<Offer>>;

    /// Remove an offer if its stored version equals `expected_version`.
    fn remove_offer(&self, id: OfferId, expected_version: u64) -> StoreResult<WriteOutcome<Offer>>;
}

/// Plain in-memory tables shared by the store backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoreState {
    next_offer_id: OfferId,
    #[serde(default)]
    users: BTreeMap<UserId, UserAccount>,
    #[serde(default)]
    offers: BTreeMap<OfferId, Offer>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            next_offer_id: 1,
            users: BTreeMap::new(),
            offers: BTreeMap::new(),
        }
    }
}

impl StoreState {
    /// Move the id counter past every stored offer. Returns `true` if it had
    /// fallen behind.
    pub(crate) fn reseat_offer_ids(&mut self) -> bool {
        let floor = self.offers.keys().next_back().map_or(1, |last| last + 1);
        if self.next_offer_id >= floor {
            return false;
        }
        self.next_offer_id = floor;
        true
    }

    pub(crate) fn user(&self, id: &UserId) -> Option<UserAccount> {
        self.users.get(id).cloned()
    }

    pub(crate) fn users(&self) -> Vec<UserAccount> {
        self.users.values().cloned().collect()
    }

    pub(crate) fn insert_user(&mut self, mut user: UserAccount) -> StoreResult<UserAccount> {
        if self.users.contains_key(&user.id) {
            return Err(StoreError::DuplicateUser(user.id));
        }
        user.version = initial_version();
        self.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    pub(crate) fn replace_user(
        &mut self,
        mut user: UserAccount,
        expected_version: u64,
    ) -> WriteOutcome<UserAccount> {
        match self.users.get_mut(&user.id) {
            Some(current) if current.version == expected_version => {
                user.version = expected_version + 1;
                *current = user.clone();
                WriteOutcome::Applied(user)
            }
            _ => WriteOutcome::Rejected,
        }
    }

    pub(crate) fn offer(&self, id: OfferId) -> Option<Offer> {
        self.offers.get(&id).cloned()
    }

    pub(crate) fn listing(&self, id: OfferId) -> Option<OfferListing> {
        self.offers.get(&id).map(|offer| self.join(offer))
    }

    pub(crate) fn scan_listings(&self, query: &OfferQuery) -> Vec<OfferListing> {
        // BTreeMap iteration is id order, which is insertion order; the stable
        // sort keeps it for equal prices.
        let mut listings: Vec<OfferListing> = self
            .offers
            .values()
            .filter(|offer| query.matches(offer))
            .map(|offer| self.join(offer))
            .collect();
        listings.sort_by(|a, b| a.offer.price.cmp(&b.offer.price));
        listings
    }

    pub(crate) fn insert_offer(&mut self, offer: NewOffer) -> Offer {
        self.reseat_offer_ids();
        let id = self.next_offer_id;
        self.next_offer_id += 1;
        let now = Utc::now();
        let stored = Offer {
            id,
            owner_id: offer.owner_id,
            item_type: offer.item_type,
            amount: offer.amount,
            price: offer.price,
            version: initial_version(),
            listed_at: now,
            updated_at: now,
        };
        self.offers.insert(id, stored.clone());
        stored
    }

    pub(crate) fn replace_offer(
        &mut self,
        offer: Offer,
        expected_version: u64,
    ) -> WriteOutcome<Offer> {
        match self.offers.get_mut(&offer.id) {
            Some(current) if current.version == expected_version => {
                current.item_type = offer.item_type;
                current.amount = offer.amount;
                current.price = offer.price;
                current.version = expected_version + 1;
                current.updated_at = Utc::now();
                WriteOutcome::Applied(current.clone())
            }
            _ => WriteOutcome::Rejected,
        }
    }

    pub(crate) fn remove_offer(
        &mut self,
        id: OfferId,
        expected_version: u64,
    ) -> WriteOutcome<Offer> {
        match self.offers.get(&id) {
            Some(current) if current.version == expected_version => self
                .offers
                .remove(&id)
                .map(WriteOutcome::Applied)
                .unwrap_or(WriteOutcome::Rejected),
            _ => WriteOutcome::Rejected,
        }
    }

    fn join(&self, offer: &Offer) -> OfferListing {
        let owner = self
            .users
            .get(&offer.owner_id)
            .map(UserAccount::owner_identity)
            .unwrap_or_else(|| OwnerIdentity {
                id: offer.owner_id.clone(),
                name: offer.owner_id.to_string(),
            });
        OfferListing {
            offer: offer.clone(),
            owner,
        }
    }
}
