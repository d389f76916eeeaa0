use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::{MarketStore, StoreState, WriteOutcome};
use crate::{
    error::StoreResult,
    models::{NewOffer, Offer, OfferId, OfferListing, OfferQuery, UserAccount, UserId},
};

/// File name of the snapshot inside the data root.
pub const SNAPSHOT_FILE: &str = "marketplace.json";

/// Store that keeps its tables in memory and rewrites a JSON snapshot after
/// every committed mutation.
///
/// The snapshot is replaced atomically, and the in-memory tables only change
/// once the new snapshot is on disk, so a failed write leaves both untouched.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl FileStore {
    /// Open the snapshot under `root`, starting empty if none exists.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let path = root.join(SNAPSHOT_FILE);

        let state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let mut state: StoreState = serde_json::from_str(&content)?;
            if state.reseat_offer_ids() {
                warn!(path = %path.display(), "Snapshot offer id counter was behind, advanced it");
            }
            info!(
                path = %path.display(),
                users = state.users().len(),
                "Loaded marketplace snapshot"
            );
            state
        } else {
            StoreState::default()
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit<T>(&self, apply: impl FnOnce(&mut StoreState) -> StoreResult<T>) -> StoreResult<T> {
        let mut state = self.state.write();
        let mut next = state.clone();
        let result = apply(&mut next)?;
        self.flush(&next)?;
        *state = next;
        Ok(result)
    }

    fn commit_conditional<T>(
        &self,
        apply: impl FnOnce(&mut StoreState) -> WriteOutcome<T>,
    ) -> StoreResult<WriteOutcome<T>> {
        let mut state = self.state.write();
        let mut next = state.clone();
        let outcome = apply(&mut next);
        if outcome.is_applied() {
            self.flush(&next)?;
            *state = next;
        }
        Ok(outcome)
    }

    fn flush(&self, state: &StoreState) -> StoreResult<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, state)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        debug!(path = %self.path.display(), "Marketplace snapshot written");
        Ok(())
    }
}

impl MarketStore for FileStore {
    fn user(&self, id: &UserId) -> StoreResult<Option<UserAccount>> {
        Ok(self.state.read().user(id))
    }

    fn users(&self) -> StoreResult<Vec<UserAccount>> {
        Ok(self.state.read().users())
    }

    fn insert_user(&self, user: UserAccount) -> StoreResult<UserAccount> {
        self.commit(|state| state.insert_user(user))
    }

    fn replace_user(
        &self,
        user: UserAccount,
        expected_version: u64,
    ) -> StoreResult<WriteOutcome<UserAccount>> {
        self.commit_conditional(|state| state.replace_user(user, expected_version))
    }

    fn offer(&self, id: OfferId) -> StoreResult<Option<Offer>> {
        Ok(self.state.read().offer(id))
    }

    fn listing(&self, id: OfferId) -> StoreResult<Option<OfferListing>> {
        Ok(self.state.read().listing(id))
    }

    fn scan_listings(&self, query: &OfferQuery) -> StoreResult<Vec<OfferListing>> {
        Ok(self.state.read().scan_listings(query))
    }

    fn insert_offer(&self, offer: NewOffer) -> StoreResult<Offer> {
        self.commit(|state| Ok(state.insert_offer(offer)))
    }

    fn replace_offer(
        &self,
        offer: Offer,
        expected_version: u64,
    ) -> StoreResult<WriteOutcome<Offer>> {
        self.commit_conditional(|state| state.replace_offer(offer, expected_version))
    }

    fn remove_offer(&self, id: OfferId, expected_version: u64) -> StoreResult<WriteOutcome<Offer>> {
        self.commit_conditional(|state| state.remove_offer(id, expected_version))
    }
}
