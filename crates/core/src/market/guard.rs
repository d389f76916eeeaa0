use tracing::warn;

use crate::{
    error::{MarketError, MarketResult, StoreResult},
    models::{Offer, OfferId},
    store::{MarketStore, WriteOutcome},
};

/// Result of an optimistic offer write.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    /// The write landed. Carries the stored record (for deletes, the record
    /// as it was just before removal).
    Committed(Offer),
    /// The offer still exists but another writer changed it first.
    Conflict,
    /// The offer no longer exists.
    Missing,
}

impl GuardOutcome {
    /// Map onto the caller-facing error taxonomy.
    pub fn into_result(self, id: OfferId) -> MarketResult<Offer> {
        match self {
            GuardOutcome::Committed(offer) => Ok(offer),
            GuardOutcome::Conflict => Err(MarketError::ConcurrencyConflict),
            GuardOutcome::Missing => Err(MarketError::offer_not_found(id)),
        }
    }
}

/// Commits offer writes only if nobody else wrote first.
///
/// No locks are held between the caller's read and the commit; the store's
/// version check decides the race. A rejected write is classified by
/// re-reading the record. Nothing is retried.
pub struct ConcurrencyGuard<'a, S: MarketStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: MarketStore + ?Sized> ConcurrencyGuard<'a, S> {
    /// Guard writes against `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Replace `next` if the stored version still equals `observed_version`.
    pub fn commit_update(&self, next: Offer, observed_version: u64) -> StoreResult<GuardOutcome> {
        let id = next.id;
        match self.store.replace_offer(next, observed_version)? {
            WriteOutcome::Applied(offer) => Ok(GuardOutcome::Committed(offer)),
            WriteOutcome::Rejected => self.classify(id, observed_version),
        }
    }

    /// Remove offer `id` if the stored version still equals `observed_version`.
    pub fn commit_delete(&self, id: OfferId, observed_version: u64) -> StoreResult<GuardOutcome> {
        match self.store.remove_offer(id, observed_version)? {
            WriteOutcome::Applied(offer) => Ok(GuardOutcome::Committed(offer)),
            WriteOutcome::Rejected => self.classify(id, observed_version),
        }
    }

    fn classify(&self, id: OfferId, observed_version: u64) -> StoreResult<GuardOutcome> {
        match self.store.offer(id)? {
            Some(current) => {
                warn!(
                    offer_id = id,
                    observed_version,
                    current_version = current.version,
                    "Concurrent offer modification detected"
                );
                Ok(GuardOutcome::Conflict)
            }
            None => {
                warn!(offer_id = id, "Offer deleted concurrently");
                Ok(GuardOutcome::Missing)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{CountryId, ItemType, NewOffer, UserAccount, UserId},
        store::MemoryStore,
    };
    use rust_decimal_macros::dec;

    fn seeded() -> StoreResult<(MemoryStore, Offer)> {
        let store = MemoryStore::new();
        store.insert_user(UserAccount {
            id: UserId::new("u1"),
            name: "Alice".to_string(),
            money: dec!(10),
            energy: 100,
            energy_restore: 0,
            country_id: CountryId(1),
            version: 1,
        })?;
        let offer = store.insert_offer(NewOffer {
            owner_id: UserId::new("u1"),
            item_type: ItemType::Food,
            amount: 5,
            price: dec!(2.50),
        })?;
        Ok((store, offer))
    }

    #[test]
    fn stale_update_is_a_conflict_while_the_offer_exists() -> StoreResult<()> {
        let (store, offer) = seeded()?;
        let guard = ConcurrencyGuard::new(&store);

        let mut first = offer.clone();
        first.price = dec!(3.00);
        assert!(matches!(
            guard.commit_update(first, offer.version)?,
            GuardOutcome::Committed(_)
        ));

        let mut second = offer.clone();
        second.amount = 9;
        assert_eq!(
            guard.commit_update(second, offer.version)?,
            GuardOutcome::Conflict
        );
        Ok(())
    }

    #[test]
    fn update_after_concurrent_delete_is_missing() -> StoreResult<()> {
        let (store, offer) = seeded()?;
        let guard = ConcurrencyGuard::new(&store);

        assert!(matches!(
            guard.commit_delete(offer.id, offer.version)?,
            GuardOutcome::Committed(_)
        ));
        assert_eq!(
            guard.commit_update(offer.clone(), offer.version)?,
            GuardOutcome::Missing
        );
        assert!(GuardOutcome::Missing
            .into_result(offer.id)
            .unwrap_err()
            .is_not_found());
        Ok(())
    }
}
