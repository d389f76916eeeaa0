//! Account registration and account-level gameplay actions.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    config::GameSettings,
    energy::EnergyEngine,
    error::{MarketError, MarketResult, StoreError},
    models::{CountryId, UserAccount, UserId, UserProfile},
    store::{MarketStore, WriteOutcome},
};

/// Reads and mutates user accounts.
///
/// Every write is checked against the version read just before it; a lost
/// race surfaces as [`MarketError::ConcurrencyConflict`].
pub struct AccountManager<S: MarketStore + ?Sized> {
    store: Arc<S>,
    energy: EnergyEngine,
}

impl<S: MarketStore + ?Sized> Clone for AccountManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            energy: self.energy.clone(),
        }
    }
}

impl<S: MarketStore + ?Sized> AccountManager<S> {
    /// Build a manager over a shared store and balance values.
    pub fn new(store: Arc<S>, settings: GameSettings) -> Self {
        Self {
            store,
            energy: EnergyEngine::new(settings),
        }
    }

    fn settings(&self) -> &GameSettings {
        self.energy.settings()
    }

    /// Create an account with starting money and full energy.
    pub fn register(
        &self,
        id: UserId,
        name: &str,
        country_id: CountryId,
    ) -> MarketResult<UserAccount> {
        let name = name.trim();
        if id.as_str().trim().is_empty() {
            return Err(MarketError::Validation("user id is required".to_string()));
        }
        if name.is_empty() {
            return Err(MarketError::Validation("name is required".to_string()));
        }

        let account = UserAccount {
            id,
            name: name.to_string(),
            money: self.settings().default_money,
            energy: self.settings().energy_max,
            energy_restore: 0,
            country_id,
            version: 1,
        };
        let account = self.store.insert_user(account).map_err(|err| match err {
            StoreError::DuplicateUser(id) => {
                MarketError::Validation(format!("user {id} already exists"))
            }
            other => MarketError::Store(other),
        })?;
        info!(user = %account.id, country = %account.country_id, "Account registered");
        Ok(account)
    }

    /// Full account record.
    pub fn account(&self, id: &UserId) -> MarketResult<UserAccount> {
        self.store
            .user(id)?
            .ok_or_else(|| MarketError::user_not_found(id))
    }

    /// Public profile of an account.
    pub fn profile(&self, id: &UserId) -> MarketResult<UserProfile> {
        Ok(self.account(id)?.profile())
    }

    /// Feed `ticks` of regeneration into one account's restore accumulator.
    pub fn accrue_energy(&self, id: &UserId, ticks: u64) -> MarketResult<UserAccount> {
        let (account, _) = self.modify(id, |account| Ok(self.energy.accrue(account, ticks)))?;
        Ok(account)
    }

    /// Feed `ticks` of regeneration into every account.
    ///
    /// Accounts that lose a write race are skipped for this round. Returns
    /// how many accumulators changed.
    pub fn accrue_all(&self, ticks: u64) -> MarketResult<usize> {
        let mut changed = 0;
        for user in self.store.users()? {
            match self.modify(&user.id, |account| Ok(self.energy.accrue(account, ticks))) {
                Ok((_, true)) => changed += 1,
                Ok((_, false)) => {}
                Err(MarketError::ConcurrencyConflict) | Err(MarketError::NotFound(_)) => {
                    warn!(user = %user.id, ticks, "Skipped energy accrual after concurrent change");
                }
                Err(err) => return Err(err),
            }
        }
        debug!(ticks, changed, "Energy accrual round finished");
        Ok(changed)
    }

    /// Spend energy on an action.
    pub fn spend_energy(&self, id: &UserId, amount: u32) -> MarketResult<UserAccount> {
        let (account, _) = self.modify(id, |account| self.energy.spend(account, amount))?;
        Ok(account)
    }

    /// Eat `units` of food, restoring spendable energy. Returns the updated
    /// account and the energy gained.
    pub fn eat_food(&self, id: &UserId, units: u32) -> MarketResult<(UserAccount, u32)> {
        if units == 0 {
            return Err(MarketError::Validation(
                "food units must be greater than zero".to_string(),
            ));
        }
        self.modify(id, |account| Ok(self.energy.eat(account, units)))
    }

    /// Move an account to another country for `country_change_cost`.
    ///
    /// Moving to the current country is free and changes nothing.
    pub fn change_country(&self, id: &UserId, country_id: CountryId) -> MarketResult<UserAccount> {
        let cost = self.settings().country_change_cost;
        let (account, _) = self.modify(id, |account| {
            if account.country_id == country_id {
                return Ok(());
            }
            if account.money < cost {
                return Err(MarketError::InsufficientFunds {
                    required: cost,
                    available: account.money,
                });
            }
            account.money -= cost;
            account.country_id = country_id;
            Ok(())
        })?;
        info!(user = %account.id, country = %account.country_id, "Country changed");
        Ok(account)
    }

    fn modify<T>(
        &self,
        id: &UserId,
        apply: impl FnOnce(&mut UserAccount) -> MarketResult<T>,
    ) -> MarketResult<(UserAccount, T)> {
        let current = self.account(id)?;
        let mut next = current.clone();
        let value = apply(&mut next)?;
        if next == current {
            return Ok((current, value));
        }

        match self.store.replace_user(next, current.version)? {
            WriteOutcome::Applied(account) => Ok((account, value)),
            WriteOutcome::Rejected => match self.store.user(id)? {
                Some(_) => {
                    warn!(user = %id, "Concurrent account modification detected");
                    Err(MarketError::ConcurrencyConflict)
                }
                None => Err(MarketError::user_not_found(id)),
            },
        }
    }
}
