use std::sync::Arc;

use parking_lot::RwLock;

use super::{MarketStore, StoreState, WriteOutcome};
use crate::{
    error::StoreResult,
    models::{NewOffer, Offer, OfferId, OfferListing, OfferQuery, UserAccount, UserId},
};

/// Thread-safe store keeping every table in memory.
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarketStore for MemoryStore {
    fn user(&self, id: &UserId) -> StoreResult<Option<UserAccount>> {
        Ok(self.inner.read().user(id))
    }

    fn users(&self) -> StoreResult<Vec<UserAccount>> {
        Ok(self.inner.read().users())
    }

    fn insert_user(&self, user: UserAccount) -> StoreResult<UserAccount> {
        self.inner.write().insert_user(user)
    }

    fn replace_user(
        &self,
        user: UserAccount,
        expected_version: u64,
    ) -> StoreResult<WriteOutcome<UserAccount>> {
        Ok(self.inner.write().replace_user(user, expected_version))
    }

    fn offer(&self, id: OfferId) -> StoreResult<Option<Offer>> {
        Ok(self.inner.read().offer(id))
    }

    fn listing(&self, id: OfferId) -> StoreResult<Option<OfferListing>> {
        Ok(self.inner.read().listing(id))
    }

    fn scan_listings(&self, query: &OfferQuery) -> StoreResult<Vec<OfferListing>> {
        Ok(self.inner.read().scan_listings(query))
    }

    fn insert_offer(&self, offer: NewOffer) -> StoreResult<Offer> {
        Ok(self.inner.write().insert_offer(offer))
    }

    fn replace_offer(
        &self,
        offer: Offer,
        expected_version: u64,
    ) -> StoreResult<WriteOutcome<Offer>> {
        Ok(self.inner.write().replace_offer(offer, expected_version))
    }

    fn remove_offer(&self, id: OfferId, expected_version: u64) -> StoreResult<WriteOutcome<Offer>> {
        Ok(self.inner.write().remove_offer(id, expected_version))
    }
}
