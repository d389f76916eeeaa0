//! Energy regeneration and spending rules.
//!
//! Two separate quantities are tracked per account: spendable `energy`
//! (capped at `energy_max`) and the regeneration accumulator
//! `energy_restore` (capped at `energy_restore_max`). Ticks only ever feed
//! the accumulator; turning accumulated restore into spendable energy is not
//! defined here.

use tracing::debug;

use crate::{
    config::GameSettings,
    error::{MarketError, MarketResult},
    models::UserAccount,
};

/// Applies energy rules using injected balance values.
#[derive(Debug, Clone)]
pub struct EnergyEngine {
    settings: GameSettings,
}

impl EnergyEngine {
    /// Build an engine over the given balance values.
    pub fn new(settings: GameSettings) -> Self {
        Self { settings }
    }

    /// Balance values in use.
    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// Accumulator value after `ticks` elapsed ticks.
    ///
    /// Growth is `energy_restore_rate` per tick and stops at
    /// `energy_restore_max`; ticks past the cap are discarded. The result is
    /// never below `current`, so a value stored under a higher cap is kept
    /// rather than clipped.
    pub fn restore(&self, current: u32, ticks: u64) -> u32 {
        if ticks == 0 {
            return current;
        }
        let cap = u64::from(self.settings.energy_restore_max);
        let amount = u64::from(self.settings.energy_restore_rate).saturating_mul(ticks);
        let next = u64::from(current).saturating_add(amount).min(cap);
        // `next` is bounded by a u32 cap.
        current.max(next as u32)
    }

    /// Apply `ticks` of regeneration to an account's accumulator.
    ///
    /// Returns `true` when the accumulator changed.
    pub fn accrue(&self, account: &mut UserAccount, ticks: u64) -> bool {
        let before = account.energy_restore;
        account.energy_restore = self.restore(before, ticks);
        debug!(
            user = %account.id,
            ticks,
            before,
            after = account.energy_restore,
            "Energy restore accrued"
        );
        before != account.energy_restore
    }

    /// Deduct spendable energy for an action.
    pub fn spend(&self, account: &mut UserAccount, amount: u32) -> MarketResult<()> {
        if account.energy < amount {
            return Err(MarketError::InsufficientEnergy {
                required: amount,
                available: account.energy,
            });
        }
        account.energy -= amount;
        Ok(())
    }

    /// Restore spendable energy by eating `units` of food, up to `energy_max`.
    ///
    /// Returns the energy actually gained.
    pub fn eat(&self, account: &mut UserAccount, units: u32) -> u32 {
        let gain = self.settings.food_energy_restore.saturating_mul(units);
        let next = account
            .energy
            .saturating_add(gain)
            .min(self.settings.energy_max)
            .max(account.energy);
        let gained = next - account.energy;
        account.energy = next;
        gained
    }
}

impl Default for EnergyEngine {
    fn default() -> Self {
        Self::new(GameSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CountryId, UserId};
    use rust_decimal_macros::dec;

    fn account(energy: u32, energy_restore: u32) -> UserAccount {
        UserAccount {
            id: UserId::new("u1"),
            name: "Alice".to_string(),
            money: dec!(100.00),
            energy,
            energy_restore,
            country_id: CountryId(1),
            version: 1,
        }
    }

    #[test]
    fn zero_ticks_is_a_no_op() {
        let engine = EnergyEngine::default();
        for x in [0, 1, 500, 999, 1000, 5000] {
            assert_eq!(engine.restore(x, 0), x);
        }
    }

    #[test]
    fn accrual_is_monotonic_and_capped() {
        let engine = EnergyEngine::default();
        for x in [0u32, 10, 500, 990, 1000] {
            let mut previous = engine.restore(x, 0);
            for t in 0..1_100u64 {
                let value = engine.restore(x, t);
                assert!(value >= previous, "restore({x}, {t}) decreased");
                assert!(value <= 1000, "restore({x}, {t}) exceeded cap");
                previous = value;
            }
        }
    }

    #[test]
    fn excess_ticks_are_discarded_at_cap() {
        let engine = EnergyEngine::default();
        assert_eq!(engine.restore(995, 10), 1000);
        assert_eq!(engine.restore(0, u64::MAX), 1000);
        assert_eq!(engine.restore(10, 5), 15);
    }

    #[test]
    fn rate_and_cap_come_from_settings() {
        let engine = EnergyEngine::new(GameSettings {
            energy_restore_rate: 3,
            energy_restore_max: 50,
            ..GameSettings::default()
        });
        assert_eq!(engine.restore(0, 4), 12);
        assert_eq!(engine.restore(40, 4), 50);
    }

    #[test]
    fn lowered_cap_never_clips_a_stored_accumulator() {
        let engine = EnergyEngine::new(GameSettings {
            energy_restore_max: 50,
            ..GameSettings::default()
        });
        assert_eq!(engine.restore(900, 0), 900);
        assert_eq!(engine.restore(900, 1), 900);
        assert_eq!(engine.restore(900, 10_000), 900);

        let mut previous = engine.restore(30, 0);
        for t in 1..40 {
            let next = engine.restore(30, t);
            assert!(next >= previous, "restore(30, {t}) went down");
            previous = next;
        }
        assert_eq!(previous, 50);

        let mut user = account(10, 900);
        assert!(!engine.accrue(&mut user, 5));
        assert_eq!(user.energy_restore, 900);
    }

    #[test]
    fn accrue_touches_only_the_accumulator() {
        let engine = EnergyEngine::default();
        let mut user = account(40, 998);
        assert!(engine.accrue(&mut user, 7));
        assert_eq!(user.energy_restore, 1000);
        assert_eq!(user.energy, 40);
        assert!(!engine.accrue(&mut user, 3));
    }

    #[test]
    fn spending_requires_enough_energy() {
        let engine = EnergyEngine::default();
        let mut user = account(5, 0);
        engine.spend(&mut user, 5).unwrap();
        assert_eq!(user.energy, 0);
        let err = engine.spend(&mut user, 1).unwrap_err();
        assert!(matches!(
            err,
            MarketError::InsufficientEnergy {
                required: 1,
                available: 0
            }
        ));
    }

    #[test]
    fn eating_restores_up_to_spendable_cap() {
        let engine = EnergyEngine::default();
        let mut user = account(75, 0);
        assert_eq!(engine.eat(&mut user, 2), 20);
        assert_eq!(user.energy, 95);
        assert_eq!(engine.eat(&mut user, 3), 5);
        assert_eq!(user.energy, 100);
        assert_eq!(user.energy_restore, 0);
    }
}
