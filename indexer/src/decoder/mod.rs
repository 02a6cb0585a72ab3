//! Event decoder for RSVP contract logs.
//!
//! Turns raw log entries into typed [`ContractEvent`]s. Event kinds are
//! identified by topic 0 (keccak-256 of the event signature); all
//! parameters are non-indexed and ABI-encoded in the log data.
//!
//! # Components
//!
//! - [`abi`]: ABI head/tail word reader
//! - [`LogDecoder`]: topic dispatch and optional contract address filter

pub mod abi;

use serde::{Deserialize, Serialize};

use crate::entities::{Address, EventId};
use abi::AbiReader;

/// Topic of `NewEventCreated(bytes32,address,uint256,uint256,uint256,string)`.
pub const NEW_EVENT_CREATED_TOPIC: &str =
    "0x2553138c3f9c9008f266dbdbe9fc64f5b71e098d06ef714a190a65a8b9fc6bf3";

/// Topic of `NewRSVP(bytes32,address)`.
pub const NEW_RSVP_TOPIC: &str =
    "0xb79f4240bbdd272d98e02a5db7f0cf156e5fc000961c517670a26eeeec63ed90";

/// Topic of `ConfirmedAttendee(bytes32,address)`.
pub const CONFIRMED_ATTENDEE_TOPIC: &str =
    "0xf8d1583a733d83bdd3ef5464129d0a95a36d62b382d31c6d0467a61f4264381b";

/// Topic of `DepositsPaidOut(bytes32)`.
pub const DEPOSITS_PAID_OUT_TOPIC: &str =
    "0x393073ea1365f611c3d2f240c992960d2b99dc81715555d3fc40fc55ba80af9c";

/// Errors produced while decoding a log of a known event type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Log carried no topics.
    #[error("log has no topics")]
    MissingTopic,

    /// A hex field could not be decoded.
    #[error("invalid hex in {field}: {reason}")]
    InvalidHex {
        /// Field name.
        field: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// Data ended before the expected word.
    #[error("data too short: need {needed} bytes, have {actual}")]
    DataTooShort {
        /// Required length in bytes.
        needed: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Address word had non-zero padding.
    #[error("word {word}: address padding is not zero")]
    InvalidAddressPadding {
        /// Head word index.
        word: usize,
    },

    /// Integer does not fit in 128 bits.
    #[error("word {word}: integer exceeds 128 bits")]
    IntegerOverflow {
        /// Head word index.
        word: usize,
    },

    /// Dynamic offset or length is out of range.
    #[error("word {word}: invalid dynamic offset")]
    InvalidOffset {
        /// Head word index.
        word: usize,
    },

    /// String payload is not UTF-8.
    #[error("word {word}: string is not valid utf-8")]
    InvalidUtf8 {
        /// Head word index.
        word: usize,
    },
}

/// A raw log entry as delivered by the chain source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    /// Emitting contract address (hex).
    pub address: String,
    /// Log topics (hex); topic 0 is the event signature hash.
    pub topics: Vec<String>,
    /// ABI-encoded data (hex).
    pub data: String,
    /// Block containing the log.
    pub block_number: u64,
    /// Position of the log within its block.
    pub log_index: u32,
    /// Transaction hash, when known.
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

/// `NewEventCreated` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCreated {
    /// Event ID.
    pub event_id: EventId,
    /// Creator address.
    pub creator: Address,
    /// Scheduled start (unix seconds).
    pub event_timestamp: u128,
    /// Capacity.
    pub max_capacity: u128,
    /// Required deposit (wei).
    pub deposit: u128,
    /// Metadata content identifier.
    pub event_data_cid: String,
}

/// Parameters shared by `NewRSVP` and `ConfirmedAttendee`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendeeAction {
    /// Event ID.
    pub event_id: EventId,
    /// Attendee address.
    pub attendee: Address,
}

/// A decoded RSVP contract event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractEvent {
    /// A new event was created.
    EventCreated(EventCreated),
    /// An attendee RSVPed.
    RsvpSubmitted(AttendeeAction),
    /// An attendee was confirmed.
    AttendeeConfirmed(AttendeeAction),
    /// Unclaimed deposits were paid out.
    DepositsPaidOut {
        /// Event ID.
        event_id: EventId,
    },
}

impl ContractEvent {
    /// Returns the event ID the log refers to.
    #[must_use]
    pub const fn event_id(&self) -> &EventId {
        match self {
            Self::EventCreated(e) => &e.event_id,
            Self::RsvpSubmitted(a) | Self::AttendeeConfirmed(a) => &a.event_id,
            Self::DepositsPaidOut { event_id } => event_id,
        }
    }

    /// Returns a short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EventCreated(_) => "NewEventCreated",
            Self::RsvpSubmitted(_) => "NewRSVP",
            Self::AttendeeConfirmed(_) => "ConfirmedAttendee",
            Self::DepositsPaidOut { .. } => "DepositsPaidOut",
        }
    }
}

#[derive(Clone, Copy)]
enum TopicKind {
    EventCreated,
    Rsvp,
    Confirmed,
    PaidOut,
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, DecodeError> {
    let raw = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(raw).map_err(|e| DecodeError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}

/// Decodes raw logs into contract events.
#[derive(Debug, Clone, Default)]
pub struct LogDecoder {
    contract: Option<Address>,
}

impl LogDecoder {
    /// Creates a decoder that accepts logs from any address.
    #[must_use]
    pub const fn new() -> Self {
        Self { contract: None }
    }

    /// Creates a decoder that only accepts logs emitted by `contract`.
    #[must_use]
    pub const fn for_contract(contract: Address) -> Self {
        Self {
            contract: Some(contract),
        }
    }

    /// Returns the contract filter, if any.
    #[must_use]
    pub const fn contract(&self) -> Option<&Address> {
        self.contract.as_ref()
    }

    fn accepts(&self, log: &RawLog) -> bool {
        match &self.contract {
            None => true,
            Some(contract) => log
                .address
                .parse::<Address>()
                .map(|a| a == *contract)
                .unwrap_or(false),
        }
    }

    /// Decodes one log.
    ///
    /// Returns `Ok(None)` for logs of other contracts or unknown topics.
    ///
    /// # Errors
    ///
    /// Returns an error if a log with a known topic has malformed data.
    pub fn decode(&self, log: &RawLog) -> Result<Option<ContractEvent>, DecodeError> {
        if !self.accepts(log) {
            return Ok(None);
        }

        let topic = log.topics.first().ok_or(DecodeError::MissingTopic)?;
        let topic = topic.to_ascii_lowercase();
        let topic = if topic.starts_with("0x") {
            topic
        } else {
            format!("0x{topic}")
        };

        let kind = match topic.as_str() {
            NEW_EVENT_CREATED_TOPIC => TopicKind::EventCreated,
            NEW_RSVP_TOPIC => TopicKind::Rsvp,
            CONFIRMED_ATTENDEE_TOPIC => TopicKind::Confirmed,
            DEPOSITS_PAID_OUT_TOPIC => TopicKind::PaidOut,
            _ => return Ok(None),
        };

        let data = decode_hex("data", &log.data)?;
        let reader = AbiReader::new(&data);

        let event = match kind {
            TopicKind::EventCreated => ContractEvent::EventCreated(EventCreated {
                event_id: EventId(reader.bytes32(0)?),
                creator: Address(reader.address(1)?),
                event_timestamp: reader.uint128(2)?,
                max_capacity: reader.uint128(3)?,
                deposit: reader.uint128(4)?,
                event_data_cid: reader.string(5)?,
            }),
            TopicKind::Rsvp => ContractEvent::RsvpSubmitted(AttendeeAction {
                event_id: EventId(reader.bytes32(0)?),
                attendee: Address(reader.address(1)?),
            }),
            TopicKind::Confirmed => ContractEvent::AttendeeConfirmed(AttendeeAction {
                event_id: EventId(reader.bytes32(0)?),
                attendee: Address(reader.address(1)?),
            }),
            TopicKind::PaidOut => ContractEvent::DepositsPaidOut {
                event_id: EventId(reader.bytes32(0)?),
            },
        };

        Ok(Some(event))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Raw log builders shared by tests across the crate.

    use super::abi::encode::{with_string_tail, word_address, word_u128};
    use super::*;

    pub const CONTRACT: &str = "0x00000000000000000000000000000000000000c0";

    fn raw(topic: &str, data: Vec<u8>, block_number: u64, log_index: u32) -> RawLog {
        RawLog {
            address: CONTRACT.to_string(),
            topics: vec![topic.to_string()],
            data: format!("0x{}", hex::encode(data)),
            block_number,
            log_index,
            transaction_hash: None,
        }
    }

    pub fn event_created(
        event_id: [u8; 32],
        creator: [u8; 20],
        deposit: u128,
        cid: &str,
        block_number: u64,
        log_index: u32,
    ) -> RawLog {
        let head = vec![
            event_id.to_vec(),
            word_address(&creator),
            word_u128(1_700_000_000),
            word_u128(100),
            word_u128(deposit),
        ];
        raw(
            NEW_EVENT_CREATED_TOPIC,
            with_string_tail(head, cid),
            block_number,
            log_index,
        )
    }

    pub fn rsvp(event_id: [u8; 32], attendee: [u8; 20], block_number: u64, log_index: u32) -> RawLog {
        let data = [event_id.to_vec(), word_address(&attendee)].concat();
        raw(NEW_RSVP_TOPIC, data, block_number, log_index)
    }

    pub fn confirmed(
        event_id: [u8; 32],
        attendee: [u8; 20],
        block_number: u64,
        log_index: u32,
    ) -> RawLog {
        let data = [event_id.to_vec(), word_address(&attendee)].concat();
        raw(CONFIRMED_ATTENDEE_TOPIC, data, block_number, log_index)
    }

    pub fn paid_out(event_id: [u8; 32], block_number: u64, log_index: u32) -> RawLog {
        raw(
            DEPOSITS_PAID_OUT_TOPIC,
            event_id.to_vec(),
            block_number,
            log_index,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_decode_event_created() {
        let log = event_created([0xAA; 32], [0x11; 20], 100, "bafyexample", 1, 0);
        let event = LogDecoder::new()
            .decode(&log)
            .expect("decode")
            .expect("known topic");

        assert_eq!(
            event,
            ContractEvent::EventCreated(EventCreated {
                event_id: EventId([0xAA; 32]),
                creator: Address([0x11; 20]),
                event_timestamp: 1_700_000_000,
                max_capacity: 100,
                deposit: 100,
                event_data_cid: "bafyexample".to_string(),
            })
        );
        assert_eq!(event.name(), "NewEventCreated");
    }

    #[test]
    fn test_decode_rsvp_and_confirmation() {
        let decoder = LogDecoder::new();

        let rsvp_event = decoder
            .decode(&rsvp([0xAA; 32], [0xBB; 20], 2, 0))
            .expect("decode")
            .expect("known topic");
        assert_eq!(
            rsvp_event,
            ContractEvent::RsvpSubmitted(AttendeeAction {
                event_id: EventId([0xAA; 32]),
                attendee: Address([0xBB; 20]),
            })
        );
        assert_eq!(rsvp_event.name(), "NewRSVP");

        let confirmed_event = decoder
            .decode(&confirmed([0xAA; 32], [0xBB; 20], 2, 1))
            .expect("decode")
            .expect("known topic");
        assert!(matches!(
            confirmed_event,
            ContractEvent::AttendeeConfirmed(_)
        ));
    }

    #[test]
    fn test_decode_paid_out() {
        let event = LogDecoder::new()
            .decode(&paid_out([0xAA; 32], 3, 0))
            .expect("decode")
            .expect("known topic");
        assert_eq!(event.event_id(), &EventId([0xAA; 32]));
    }

    #[test]
    fn test_decode_unknown_topic_is_ignored() {
        let mut log = paid_out([0xAA; 32], 3, 0);
        log.topics = vec![
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef".to_string(),
        ];
        assert_eq!(LogDecoder::new().decode(&log), Ok(None));
    }

    #[test]
    fn test_decode_topic_is_case_insensitive() {
        let mut log = paid_out([0xAA; 32], 3, 0);
        log.topics = vec![DEPOSITS_PAID_OUT_TOPIC.to_uppercase().replacen("0X", "", 1)];
        assert!(LogDecoder::new().decode(&log).expect("decode").is_some());
    }

    #[test]
    fn test_decode_missing_topic() {
        let mut log = paid_out([0xAA; 32], 3, 0);
        log.topics.clear();
        assert_eq!(LogDecoder::new().decode(&log), Err(DecodeError::MissingTopic));
    }

    #[test]
    fn test_decode_contract_filter() {
        let log = paid_out([0xAA; 32], 3, 0);

        let matching = LogDecoder::for_contract(CONTRACT.parse().expect("address"));
        assert!(matching.decode(&log).expect("decode").is_some());

        let other = LogDecoder::for_contract(Address([0xEE; 20]));
        assert_eq!(other.decode(&log), Ok(None));
    }

    #[test]
    fn test_decode_truncated_data() {
        let mut log = rsvp([0xAA; 32], [0xBB; 20], 2, 0);
        log.data.truncate(2 + 40 * 2);
        assert!(matches!(
            LogDecoder::new().decode(&log),
            Err(DecodeError::DataTooShort { .. })
        ));
    }

    #[test]
    fn test_decode_bad_hex() {
        let mut log = rsvp([0xAA; 32], [0xBB; 20], 2, 0);
        log.data = "0xnothex".to_string();
        assert!(matches!(
            LogDecoder::new().decode(&log),
            Err(DecodeError::InvalidHex { field: "data", .. })
        ));
    }

    #[test]
    fn test_raw_log_json_shape() {
        let json = r#"{
            "address": "0x00000000000000000000000000000000000000c0",
            "topics": ["0x393073ea1365f611c3d2f240c992960d2b99dc81715555d3fc40fc55ba80af9c"],
            "data": "0x",
            "blockNumber": 42,
            "logIndex": 3
        }"#;
        let log: RawLog = serde_json::from_str(json).expect("parse");
        assert_eq!(log.block_number, 42);
        assert_eq!(log.log_index, 3);
        assert!(log.transaction_hash.is_none());
    }
}
