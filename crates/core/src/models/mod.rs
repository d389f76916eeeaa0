//! Shared domain models.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Opaque account identifier handed out by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Reference to a country; only the id matters to the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryId(pub u32);

impl fmt::Display for CountryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned offer identifier.
pub type OfferId = u64;

/// Kind of goods a listing sells.
///
/// Stored as a plain string tag so new kinds can be listed without touching
/// the offer schema. Unknown tags round-trip through [`ItemType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemType {
    /// Edible goods; eating them restores spendable energy.
    Food,
    /// Raw grain.
    Grain,
    /// Any item kind introduced after this build.
    Other(String),
}

impl ItemType {
    /// The item kinds currently offered to sellers.
    pub fn known() -> [ItemType; 2] {
        [ItemType::Food, ItemType::Grain]
    }

    /// Canonical form: known kinds named through [`ItemType::Other`] become
    /// their own variant and other names are trimmed.
    pub fn normalize(self) -> Self {
        match self {
            ItemType::Other(name) => ItemType::from(name),
            known => known,
        }
    }

    /// Canonical tag used in storage and display.
    pub fn tag(&self) -> &str {
        match self {
            ItemType::Food => "Food",
            ItemType::Grain => "Grain",
            ItemType::Other(name) => name,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl From<String> for ItemType {
    fn from(value: String) -> Self {
        let name = value.trim();
        if name.eq_ignore_ascii_case("food") {
            ItemType::Food
        } else if name.eq_ignore_ascii_case("grain") {
            ItemType::Grain
        } else {
            ItemType::Other(name.to_string())
        }
    }
}

impl From<ItemType> for String {
    fn from(value: ItemType) -> Self {
        match value {
            ItemType::Other(name) => name,
            known => known.tag().to_string(),
        }
    }
}

impl FromStr for ItemType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ItemType::from(s.to_string()))
    }
}

/// Identity and economic state of a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Unique account id.
    pub id: UserId,
    /// Display name shown next to listings.
    pub name: String,
    /// Cash balance, never negative.
    pub money: Decimal,
    /// Spendable energy, bounded by `GameSettings::energy_max`.
    pub energy: u32,
    /// Regeneration accumulator, bounded by `GameSettings::energy_restore_max`.
    pub energy_restore: u32,
    /// Country the player currently belongs to.
    pub country_id: CountryId,
    /// Optimistic concurrency token, bumped on every committed write.
    #[serde(default = "initial_version")]
    pub version: u64,
}

impl UserAccount {
    /// Public fields exposed by the identity provider.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            money: self.money,
            energy: self.energy,
            energy_restore: self.energy_restore,
            country_id: self.country_id,
        }
    }

    /// Identity shown publicly on listings.
    pub fn owner_identity(&self) -> OwnerIdentity {
        OwnerIdentity {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Profile of the acting user as supplied to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub money: Decimal,
    pub energy: u32,
    pub energy_restore: u32,
    pub country_id: CountryId,
}

/// Public owner identity joined onto listings at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerIdentity {
    /// Owner account id.
    pub id: UserId,
    /// Owner display name.
    pub name: String,
}

/// A single marketplace listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// Store-assigned id.
    pub id: OfferId,
    /// Owning account; fixed at creation.
    pub owner_id: UserId,
    /// Kind of goods on sale.
    pub item_type: ItemType,
    /// Units on sale.
    pub amount: u32,
    /// Price per unit.
    pub price: Decimal,
    /// Optimistic concurrency token.
    pub version: u64,
    /// When the offer was first listed.
    pub listed_at: DateTime<Utc>,
    /// When the offer was last changed.
    pub updated_at: DateTime<Utc>,
}

/// Offer together with its owner's public identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferListing {
    /// The listing itself.
    pub offer: Offer,
    /// Who is selling.
    pub owner: OwnerIdentity,
}

/// Validated input for a fresh listing, before the store assigns an id.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub struct NewOffer {
    pub owner_id: UserId,
    pub item_type: ItemType,
    pub amount: u32,
    pub price: Decimal,
}

/// Fields an owner may change on an existing listing.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferEdit {
    /// Version the editor last observed.
    pub expected_version: u64,
    /// New item kind.
    pub item_type: ItemType,
    /// New unit count.
    pub amount: u32,
    /// New unit price.
    pub price: Decimal,
}

/// Filter for range scans over offers. Empty filters match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferQuery {
    /// Restrict to one owner.
    pub owner_id: Option<UserId>,
    /// Restrict to one item kind.
    pub item_type: Option<ItemType>,
}

impl OfferQuery {
    /// Offers owned by `owner`.
    pub fn owned_by(owner: &UserId) -> Self {
        Self {
            owner_id: Some(owner.clone()),
            item_type: None,
        }
    }

    /// Offers selling `item_type`.
    pub fn of_type(item_type: &ItemType) -> Self {
        Self {
            owner_id: None,
            item_type: Some(item_type.clone()),
        }
    }

    /// Whether `offer` passes this filter.
    pub fn matches(&self, offer: &Offer) -> bool {
        self.owner_id
            .as_ref()
            .map(|owner| owner == &offer.owner_id)
            .unwrap_or(true)
            && self
                .item_type
                .as_ref()
                .map(|item| item == &offer.item_type)
                .unwrap_or(true)
    }
}

pub(crate) fn initial_version() -> u64 {
    1
}
