use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::guard::ConcurrencyGuard;
use crate::{
    error::{MarketError, MarketResult},
    models::{ItemType, NewOffer, Offer, OfferEdit, OfferId, OfferListing, OfferQuery, UserId},
    store::MarketStore,
};

/// Creates, edits, removes and lists marketplace offers.
///
/// Only an offer's owner may change or remove it. Edits go through the
/// [`ConcurrencyGuard`], so a stale edit fails instead of overwriting
/// somebody else's change.
pub struct OfferManager<S: MarketStore + ?Sized> {
    store: Arc<S>,
}

impl<S: MarketStore + ?Sized> Clone for OfferManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: MarketStore + ?Sized> OfferManager<S> {
    /// Build a manager over a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// All offers owned by `owner`, cheapest first.
    pub fn list_offers_for_user(&self, owner: &UserId) -> MarketResult<Vec<Offer>> {
        let offers: Vec<Offer> = self
            .store
            .scan_listings(&OfferQuery::owned_by(owner))?
            .into_iter()
            .map(|listing| listing.offer)
            .collect();
        debug!(user = %owner, count = offers.len(), "Listed own offers");
        Ok(offers)
    }

    /// Every offer selling `item_type`, cheapest first, with seller identity.
    pub fn list_offers_by_item_type(
        &self,
        item_type: &ItemType,
    ) -> MarketResult<Vec<OfferListing>> {
        let item_type = item_type.clone().normalize();
        let listings = self.store.scan_listings(&OfferQuery::of_type(&item_type))?;
        debug!(item = %item_type, count = listings.len(), "Browsed offers");
        Ok(listings)
    }

    /// Single offer with seller identity.
    pub fn get_offer(&self, id: OfferId) -> MarketResult<OfferListing> {
        self.store
            .listing(id)?
            .ok_or_else(|| MarketError::offer_not_found(id))
    }

    /// List `amount` units of `item_type` at `price` each.
    ///
    /// The offer is visible to every listing query as soon as this returns.
    pub fn create_offer(
        &self,
        owner: &UserId,
        item_type: ItemType,
        amount: u32,
        price: Decimal,
    ) -> MarketResult<Offer> {
        let item_type = item_type.normalize();
        validate(&item_type, amount, price)?;
        if self.store.user(owner)?.is_none() {
            return Err(MarketError::user_not_found(owner));
        }

        let offer = self.store.insert_offer(NewOffer {
            owner_id: owner.clone(),
            item_type,
            amount,
            price,
        })?;
        info!(
            offer_id = offer.id,
            user = %owner,
            item = %offer.item_type,
            amount = offer.amount,
            price = %offer.price,
            "Offer listed"
        );
        Ok(offer)
    }

    /// Apply `edit` to offer `id` on behalf of `owner`.
    ///
    /// Fails with [`MarketError::ConcurrencyConflict`] if the offer changed
    /// since `edit.expected_version` was read, or with
    /// [`MarketError::NotFound`] if it was removed meanwhile.
    pub fn update_offer(
        &self,
        id: OfferId,
        owner: &UserId,
        edit: OfferEdit,
    ) -> MarketResult<Offer> {
        let current = self.owned_offer(id, owner)?;
        let item_type = edit.item_type.normalize();
        validate(&item_type, edit.amount, edit.price)?;

        let next = Offer {
            item_type,
            amount: edit.amount,
            price: edit.price,
            ..current
        };
        let offer = ConcurrencyGuard::new(self.store.as_ref())
            .commit_update(next, edit.expected_version)?
            .into_result(id)?;
        info!(
            offer_id = id,
            user = %owner,
            version = offer.version,
            price = %offer.price,
            "Offer updated"
        );
        Ok(offer)
    }

    /// Remove offer `id` on behalf of `owner`.
    ///
    /// A [`MarketError::NotFound`] here means the offer is already gone;
    /// callers that only care about the end state may treat it as success.
    pub fn delete_offer(&self, id: OfferId, owner: &UserId) -> MarketResult<()> {
        let current = self.owned_offer(id, owner)?;
        ConcurrencyGuard::new(self.store.as_ref())
            .commit_delete(id, current.version)?
            .into_result(id)?;
        info!(offer_id = id, user = %owner, "Offer removed");
        Ok(())
    }

    fn owned_offer(&self, id: OfferId, owner: &UserId) -> MarketResult<Offer> {
        let offer = self
            .store
            .offer(id)?
            .ok_or_else(|| MarketError::offer_not_found(id))?;
        if &offer.owner_id != owner {
            warn!(offer_id = id, user = %owner, "Rejected change to foreign offer");
            return Err(MarketError::OwnershipViolation(id));
        }
        Ok(offer)
    }
}

fn validate(item_type: &ItemType, amount: u32, price: Decimal) -> MarketResult<()> {
    if let ItemType::Other(name) = item_type {
        if name.is_empty() {
            return Err(MarketError::Validation("item type is required".to_string()));
        }
    }
    if amount == 0 {
        return Err(MarketError::Validation("amount must be greater than zero".to_string()));
    }
    if price <= Decimal::ZERO {
        return Err(MarketError::Validation("price must be greater than zero".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use super::*;
    use crate::{
        error::{outcome_message, CHANGES_SAVED, DATA_MODIFIED},
        models::{CountryId, UserAccount},
        store::MemoryStore,
    };
    use rust_decimal_macros::dec;

    fn account(id: &str, name: &str) -> UserAccount {
        UserAccount {
            id: UserId::new(id),
            name: name.to_string(),
            money: dec!(100.00),
            energy: 100,
            energy_restore: 0,
            country_id: CountryId(1),
            version: 1,
        }
    }

    fn manager() -> MarketResult<OfferManager<MemoryStore>> {
        let store = MemoryStore::new();
        store.insert_user(account("u1", "Alice"))?;
        store.insert_user(account("u2", "Bob"))?;
        Ok(OfferManager::new(Arc::new(store)))
    }

    fn edit(offer: &Offer, amount: u32, price: Decimal) -> OfferEdit {
        OfferEdit {
            expected_version: offer.version,
            item_type: offer.item_type.clone(),
            amount,
            price,
        }
    }

    #[test]
    fn listing_lifecycle_for_a_single_seller() -> MarketResult<()> {
        let market = manager()?;
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");

        let offer = market.create_offer(&u1, ItemType::Food, 5, dec!(2.50))?;
        assert_eq!(market.list_offers_for_user(&u1)?, vec![offer.clone()]);

        let fetched = market.get_offer(offer.id)?;
        assert_eq!(fetched.offer.item_type, ItemType::Food);
        assert_eq!(fetched.offer.amount, 5);
        assert_eq!(fetched.offer.price, dec!(2.50));
        assert_eq!(fetched.owner.id, u1);
        assert_eq!(fetched.owner.name, "Alice");

        let updated = market.update_offer(offer.id, &u1, edit(&offer, 5, dec!(3.00)))?;
        assert_eq!(market.get_offer(offer.id)?.offer.price, dec!(3.00));

        let err = market
            .update_offer(offer.id, &u2, edit(&updated, 1, dec!(0.01)))
            .unwrap_err();
        assert!(matches!(err, MarketError::OwnershipViolation(id) if id == offer.id));

        market.delete_offer(offer.id, &u1)?;
        assert!(market.get_offer(offer.id).unwrap_err().is_not_found());
        assert!(market.list_offers_for_user(&u1)?.is_empty());
        Ok(())
    }

    #[test]
    fn non_owners_are_rejected_regardless_of_payload() -> MarketResult<()> {
        let market = manager()?;
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");
        let offer = market.create_offer(&u1, ItemType::Grain, 10, dec!(1.10))?;

        for (amount, price) in [(3, dec!(2)), (0, dec!(2)), (3, dec!(-1)), (0, dec!(0))] {
            let err = market
                .update_offer(offer.id, &u2, edit(&offer, amount, price))
                .unwrap_err();
            assert!(matches!(err, MarketError::OwnershipViolation(_)));
        }
        assert!(matches!(
            market.delete_offer(offer.id, &u2).unwrap_err(),
            MarketError::OwnershipViolation(_)
        ));
        assert_eq!(market.get_offer(offer.id)?.offer, offer);
        Ok(())
    }

    #[test]
    fn invalid_listings_are_refused() -> MarketResult<()> {
        let market = manager()?;
        let u1 = UserId::new("u1");

        for (item, amount, price) in [
            (ItemType::Food, 0, dec!(1)),
            (ItemType::Food, 1, dec!(0)),
            (ItemType::Grain, 1, dec!(-0.01)),
            (ItemType::Other("  ".to_string()), 1, dec!(1)),
        ] {
            let err = market.create_offer(&u1, item, amount, price).unwrap_err();
            assert!(matches!(err, MarketError::Validation(_)), "{err}");
        }
        assert!(market.list_offers_for_user(&u1)?.is_empty());

        let offer = market.create_offer(&u1, ItemType::Food, 1, dec!(1))?;
        let err = market
            .update_offer(offer.id, &u1, edit(&offer, 0, dec!(1)))
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
        assert_eq!(market.get_offer(offer.id)?.offer.version, offer.version);
        Ok(())
    }

    #[test]
    fn unknown_ids_are_not_found() -> MarketResult<()> {
        let market = manager()?;
        let ghost = UserId::new("ghost");
        let u1 = UserId::new("u1");

        assert!(market
            .create_offer(&ghost, ItemType::Food, 1, dec!(1))
            .unwrap_err()
            .is_not_found());
        assert!(market.get_offer(99).unwrap_err().is_not_found());
        assert!(market.delete_offer(99, &u1).unwrap_err().is_not_found());

        let offer = market.create_offer(&u1, ItemType::Food, 1, dec!(1))?;
        let mut stale = edit(&offer, 2, dec!(2));
        stale.expected_version = offer.version;
        market.delete_offer(offer.id, &u1)?;
        assert!(market
            .update_offer(offer.id, &u1, stale)
            .unwrap_err()
            .is_not_found());
        Ok(())
    }

    #[test]
    fn browse_filters_by_item_and_orders_by_price() -> MarketResult<()> {
        let market = manager()?;
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");

        market.create_offer(&u1, ItemType::Food, 5, dec!(4.00))?;
        market.create_offer(&u2, ItemType::Grain, 5, dec!(0.10))?;
        market.create_offer(&u2, ItemType::Food, 2, dec!(1.25))?;
        market.create_offer(&u1, ItemType::Food, 7, dec!(1.25))?;

        let food = market.list_offers_by_item_type(&ItemType::Food)?;
        assert_eq!(food.len(), 3);
        assert!(food.iter().all(|l| l.offer.item_type == ItemType::Food));
        assert!(food
            .windows(2)
            .all(|pair| pair[0].offer.price <= pair[1].offer.price));
        // Equal prices keep listing order.
        assert_eq!(food[0].owner.name, "Bob");
        assert_eq!(food[1].owner.name, "Alice");
        Ok(())
    }

    #[test]
    fn item_names_are_canonical_across_create_edit_and_browse() -> MarketResult<()> {
        let market = manager()?;
        let u1 = UserId::new("u1");

        let spelled = market.create_offer(&u1, ItemType::Other("Food".to_string()), 3, dec!(2))?;
        assert_eq!(spelled.item_type, ItemType::Food);
        let padded = market.create_offer(&u1, ItemType::Other(" Iron ".to_string()), 1, dec!(5))?;
        assert_eq!(padded.item_type, ItemType::Other("Iron".to_string()));

        let food = market.list_offers_by_item_type(&ItemType::Food)?;
        assert_eq!(food.len(), 1);
        assert_eq!(food[0].offer.id, spelled.id);
        let iron = market.list_offers_by_item_type(&ItemType::Other("iron ".to_string()))?;
        assert!(iron.is_empty(), "custom names stay case-sensitive");
        let iron = market.list_offers_by_item_type(&ItemType::Other("Iron".to_string()))?;
        assert_eq!(iron.len(), 1);

        let mut change = edit(&padded, 1, dec!(5));
        change.item_type = ItemType::Other("  grain".to_string());
        let moved = market.update_offer(padded.id, &u1, change)?;
        assert_eq!(moved.item_type, ItemType::Grain);
        assert_eq!(market.list_offers_by_item_type(&ItemType::Grain)?.len(), 1);
        Ok(())
    }

    #[test]
    fn second_of_two_edits_from_the_same_read_conflicts() -> MarketResult<()> {
        let market = manager()?;
        let u1 = UserId::new("u1");
        let offer = market.create_offer(&u1, ItemType::Food, 5, dec!(2.50))?;

        let first = market.update_offer(offer.id, &u1, edit(&offer, 5, dec!(3.00)));
        let second = market.update_offer(offer.id, &u1, edit(&offer, 4, dec!(2.00)));

        assert_eq!(outcome_message(&first), CHANGES_SAVED);
        assert!(matches!(second, Err(MarketError::ConcurrencyConflict)));
        assert_eq!(outcome_message(&second), DATA_MODIFIED);
        assert_eq!(market.get_offer(offer.id)?.offer.price, dec!(3.00));
        Ok(())
    }

    #[test]
    fn racing_edits_have_exactly_one_winner() -> MarketResult<()> {
        let market = manager()?;
        let u1 = UserId::new("u1");
        let offer = market.create_offer(&u1, ItemType::Grain, 5, dec!(1.00))?;
        let id = offer.id;
        let barrier = Barrier::new(2);

        let results: Vec<MarketResult<Offer>> = std::thread::scope(|scope| {
            let handles: Vec<_> = [dec!(1.50), dec!(2.50)]
                .into_iter()
                .map(|price| {
                    let market = market.clone();
                    let u1 = u1.clone();
                    let edit = edit(&offer, 5, price);
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        market.update_offer(id, &u1, edit)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("editor thread panicked"))
                .collect()
        });

        let winners: Vec<&Offer> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(MarketError::ConcurrencyConflict)))
                .count(),
            1
        );
        let stored = market.get_offer(offer.id)?.offer;
        assert_eq!(stored.price, winners[0].price);
        assert_eq!(stored.version, offer.version + 1);
        Ok(())
    }
}
