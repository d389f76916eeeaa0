//! Resolution of the acting user from an opaque session token.
//!
//! The marketplace never authenticates anyone: it trusts whatever user id the
//! identity provider hands back.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{
    error::{MarketError, MarketResult},
    models::{UserId, UserProfile},
    store::MarketStore,
};

/// Supplies the profile of the user behind a session token.
pub trait IdentityProvider: Send + Sync {
    /// Profile of the user signed in under `token`.
    fn current_user(&self, token: &str) -> MarketResult<UserProfile>;
}

/// In-process session table backed by the account store.
pub struct SessionDirectory<S: MarketStore + ?Sized> {
    store: Arc<S>,
    sessions: RwLock<HashMap<String, UserId>>,
}

impl<S: MarketStore + ?Sized> SessionDirectory<S> {
    /// Empty directory reading profiles from `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Bind `token` to an existing account.
    pub fn sign_in(&self, token: impl Into<String>, user: &UserId) -> MarketResult<()> {
        if self.store.user(user)?.is_none() {
            return Err(MarketError::user_not_found(user));
        }
        self.sessions.write().insert(token.into(), user.clone());
        info!(user = %user, "Session opened");
        Ok(())
    }

    /// Forget `token`. Returns whether it was bound.
    pub fn sign_out(&self, token: &str) -> bool {
        let removed = self.sessions.write().remove(token);
        if let Some(user) = &removed {
            info!(user = %user, "Session closed");
        }
        removed.is_some()
    }
}

impl<S: MarketStore + ?Sized> IdentityProvider for SessionDirectory<S> {
    fn current_user(&self, token: &str) -> MarketResult<UserProfile> {
        let user = self
            .sessions
            .read()
            .get(token)
            .cloned()
            .ok_or(MarketError::UnknownSession)?;
        debug!(user = %user, "Session resolved");
        self.store
            .user(&user)?
            .map(|account| account.profile())
            .ok_or_else(|| MarketError::user_not_found(&user))
    }
}
