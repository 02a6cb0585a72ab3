//! Indexed entities and their identifiers.
//!
//! Binary identifiers are rendered as `0x`-prefixed lowercase hex. Composite
//! IDs (RSVP, confirmation) are the plain concatenation of the event ID and
//! the attendee address, which stays collision-free because both parts have
//! a fixed length.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when parsing a hex identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Input was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Input decoded to the wrong number of bytes.
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required byte length.
        expected: usize,
        /// Decoded byte length.
        actual: usize,
    },
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], IdError> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(raw).map_err(|e| IdError::InvalidHex(e.to_string()))?;
    if bytes.len() != N {
        return Err(IdError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// A 32-byte event identifier as emitted by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub [u8; 32]);

impl EventId {
    /// Returns the `0x`-prefixed lowercase hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for EventId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(Self)
    }
}

/// A 20-byte account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Returns the `0x`-prefixed lowercase hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Address {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s).map(Self)
    }
}

/// Builds the composite key shared by RSVP and confirmation records.
#[must_use]
pub fn attendance_id(event_id: &EventId, attendee: &Address) -> String {
    format!("{}{}", event_id.to_hex(), attendee.to_hex())
}

/// Descriptive metadata attached to an event at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Display name.
    pub name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// External link.
    pub link: Option<String>,
    /// Retrieval URL for the event image.
    pub image_url: Option<String>,
}

/// An on-chain event (meetup) with its running totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Entity ID (hex event ID).
    pub id: String,
    /// Raw event ID as hex, kept apart from the entity key.
    pub event_id: String,
    /// Creator address.
    pub event_owner: String,
    /// Scheduled start (unix seconds).
    pub event_timestamp: u128,
    /// Maximum number of attendees.
    pub max_capacity: u128,
    /// Deposit required to RSVP (wei).
    pub deposit: u128,
    /// Content identifier of the metadata document.
    pub event_data_cid: String,
    /// Whether unclaimed deposits were paid out.
    pub paid_out: bool,
    /// Number of distinct RSVPs.
    pub total_rsvps: u64,
    /// Number of distinct confirmed attendees.
    pub total_confirmed_attendees: u64,
    /// Optional descriptive metadata.
    pub metadata: EventMetadata,
}

/// An attendee account, created lazily on first reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Entity ID (hex address).
    pub id: String,
    /// RSVPs made across all events.
    pub total_rsvps: u64,
    /// Events where attendance was confirmed.
    pub total_attended_events: u64,
}

impl Account {
    /// Creates an account with zeroed totals.
    #[must_use]
    pub fn new(address: &Address) -> Self {
        Self {
            id: address.to_hex(),
            total_rsvps: 0,
            total_attended_events: 0,
        }
    }
}

/// An RSVP linking an account to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rsvp {
    /// Composite ID (event hex + attendee hex).
    pub id: String,
    /// Account ID of the attendee.
    pub attendee: String,
    /// Event ID.
    pub event: String,
}

/// A confirmed attendance linking an account to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// Composite ID (event hex + attendee hex).
    pub id: String,
    /// Account ID of the attendee.
    pub attendee: String,
    /// Event ID.
    pub event: String,
}

/// Entity families held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// [`Event`] records.
    Event,
    /// [`Account`] records.
    Account,
    /// [`Rsvp`] records.
    Rsvp,
    /// [`Confirmation`] records.
    Confirmation,
}

impl EntityKind {
    /// Returns the storage name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Account => "account",
            Self::Rsvp => "rsvp",
            Self::Confirmation => "confirmation",
        }
    }

    /// Parses a storage name back into a kind.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "event" => Some(Self::Event),
            "account" => Some(Self::Account),
            "rsvp" => Some(Self::Rsvp),
            "confirmation" => Some(Self::Confirmation),
            _ => None,
        }
    }
}

/// Store key: entity kind plus string ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    /// Entity family.
    pub kind: EntityKind,
    /// Entity ID within the family.
    pub id: String,
}

impl EntityKey {
    /// Creates a key.
    #[must_use]
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Any stored entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    /// An event.
    Event(Event),
    /// An account.
    Account(Account),
    /// An RSVP.
    Rsvp(Rsvp),
    /// A confirmation.
    Confirmation(Confirmation),
}

impl Entity {
    /// Returns the store key of this entity.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Event(e) => EntityKey::new(EntityKind::Event, e.id.clone()),
            Self::Account(a) => EntityKey::new(EntityKind::Account, a.id.clone()),
            Self::Rsvp(r) => EntityKey::new(EntityKind::Rsvp, r.id.clone()),
            Self::Confirmation(c) => EntityKey::new(EntityKind::Confirmation, c.id.clone()),
        }
    }

    /// Returns the entity kind.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Event(_) => EntityKind::Event,
            Self::Account(_) => EntityKind::Account,
            Self::Rsvp(_) => EntityKind::Rsvp,
            Self::Confirmation(_) => EntityKind::Confirmation,
        }
    }
}

/// Typed access to one entity family through the untyped [`Entity`] enum.
pub trait StoredEntity: Sized {
    /// Entity family of the implementor.
    const KIND: EntityKind;

    /// Extracts the typed entity, or `None` for another variant.
    fn from_entity(entity: Entity) -> Option<Self>;

    /// Wraps the typed entity.
    fn into_entity(self) -> Entity;
}

macro_rules! stored_entity {
    ($ty:ident) => {
        impl StoredEntity for $ty {
            const KIND: EntityKind = EntityKind::$ty;

            fn from_entity(entity: Entity) -> Option<Self> {
                match entity {
                    Entity::$ty(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_entity(self) -> Entity {
                Entity::$ty(self)
            }
        }
    };
}

stored_entity!(Event);
stored_entity!(Account);
stored_entity!(Rsvp);
stored_entity!(Confirmation);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_hex_is_lowercase_prefixed() {
        let id = EventId([0xAB; 32]);
        let hex = id.to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 66);
        assert_eq!(hex, hex.to_lowercase());
    }

    #[test]
    fn test_address_parse_with_and_without_prefix() {
        let a: Address = "0x00000000000000000000000000000000000000bb"
            .parse()
            .expect("address");
        let b: Address = "00000000000000000000000000000000000000BB"
            .parse()
            .expect("address");
        assert_eq!(a, b);
        assert_eq!(a.to_hex(), "0x00000000000000000000000000000000000000bb");
    }

    #[test]
    fn test_address_parse_wrong_length() {
        let err = "0xbb".parse::<Address>().expect_err("too short");
        assert_eq!(
            err,
            IdError::InvalidLength {
                expected: 20,
                actual: 1
            }
        );
    }

    #[test]
    fn test_event_id_parse_invalid_hex() {
        assert!(matches!(
            "0xzz".parse::<EventId>(),
            Err(IdError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_attendance_id_concatenates_without_separator() {
        let event = EventId([0xAA; 32]);
        let attendee = Address([0xBB; 20]);
        let id = attendance_id(&event, &attendee);
        assert_eq!(id, format!("{}{}", event.to_hex(), attendee.to_hex()));
        assert_eq!(id.len(), 66 + 42);
    }

    #[test]
    fn test_entity_kind_names() {
        for kind in [
            EntityKind::Event,
            EntityKind::Account,
            EntityKind::Rsvp,
            EntityKind::Confirmation,
        ] {
            assert_eq!(EntityKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::from_name("order"), None);
    }

    #[test]
    fn test_entity_key_and_typed_access() {
        let account = Account::new(&Address([1u8; 20]));
        let entity = account.clone().into_entity();
        assert_eq!(entity.kind(), EntityKind::Account);
        assert_eq!(entity.key().id, account.id);
        assert_eq!(Account::from_entity(entity.clone()), Some(account));
        assert_eq!(Rsvp::from_entity(entity), None);
    }

    #[test]
    fn test_event_json_keeps_large_amounts() {
        let event = Event {
            id: EventId([1u8; 32]).to_hex(),
            event_id: EventId([1u8; 32]).to_hex(),
            event_owner: Address([2u8; 20]).to_hex(),
            event_timestamp: 1_700_000_000,
            max_capacity: 50,
            deposit: 10u128.pow(24),
            event_data_cid: "bafy".to_string(),
            paid_out: false,
            total_rsvps: 0,
            total_confirmed_attendees: 0,
            metadata: EventMetadata {
                name: Some("Meetup".to_string()),
                ..Default::default()
            },
        };
        let json = serde_json::to_string(&event).expect("serialize");
        let back: Event = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, event);
    }
}
