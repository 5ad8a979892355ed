//! Parsing of a single pipe-delimited nfdump line into a [`FlowRecord`].

use std::net::Ipv4Addr;
use std::num::ParseIntError;
use std::sync::Arc;

use crate::config::AddressPolicy;
use crate::domain::{FlowFields, FlowRecord, Timestamp};
use crate::error::ParseError;

pub(crate) const FIELD_DELIMITER: u8 = b'|';

/// Number of positional fields of an nfdump pipe export. Trailing extra fields are ignored.
pub const EXPECTED_FIELDS: usize = 24;

const FIRST_SEEN: usize = 1;
const LAST_SEEN: usize = 3;
const PROTOCOL: usize = 5;
const SOURCE_ADDRESS: usize = 9;
const SOURCE_PORT: usize = 10;
const DEST_ADDRESS: usize = 14;
const DEST_PORT: usize = 15;
const IN_PKTS: usize = 22;
const IN_BYTES: usize = 23;

/// Stateless parser turning lines into flow records. Cheap to clone and safe to share between threads.
#[derive(Debug, Clone)]
pub struct RecordParser {
    host: Arc<str>,
    address_policy: AddressPolicy,
}

impl RecordParser {
    pub fn new(host: &str, address_policy: AddressPolicy) -> Self {
        Self {
            host: Arc::from(host),
            address_policy,
        }
    }

    /// Parses a raw line, splitting it on the field delimiter.
    pub fn parse(&self, line: &str) -> Result<FlowRecord, ParseError> {
        self.parse_fields(line.split(FIELD_DELIMITER as char))
    }

    /// Parses a record which was already split into its fields.
    pub fn parse_fields<'a>(
        &self,
        fields: impl IntoIterator<Item = &'a str>,
    ) -> Result<FlowRecord, ParseError> {
        let parts: Vec<&str> = fields.into_iter().take(EXPECTED_FIELDS).collect();
        if parts.len() < EXPECTED_FIELDS {
            return Err(ParseError::MalformedRecord {
                expected: EXPECTED_FIELDS,
                found: parts.len(),
            });
        }

        let source_address = self.address(parts[SOURCE_ADDRESS])?;
        let dest_address = self.address(parts[DEST_ADDRESS])?;

        Ok(FlowRecord::new(FlowFields {
            host: Arc::clone(&self.host),
            in_bytes: parts[IN_BYTES].to_string(),
            in_pkts: parts[IN_PKTS].to_string(),
            source_address,
            dest_address,
            protocol: parts[PROTOCOL].to_string(),
            source_port: parts[SOURCE_PORT].to_string(),
            dest_port: parts[DEST_PORT].to_string(),
            first_seen: timestamp(parts[FIRST_SEEN]),
            last_seen: timestamp(parts[LAST_SEEN]),
        }))
    }

    fn address(&self, value: &str) -> Result<Option<Ipv4Addr>, ParseError> {
        match (decode_address(value), self.address_policy) {
            (Ok(address), _) => Ok(Some(address)),
            (Err(_), AddressPolicy::Lenient) => Ok(None),
            (Err(source), AddressPolicy::Strict) => Err(ParseError::InvalidAddress {
                value: value.to_string(),
                source,
            }),
        }
    }
}

/// Decodes an IPv4 address stored as a decimal 32-bit integer, most significant octet first.
pub fn decode_address(value: &str) -> Result<Ipv4Addr, ParseIntError> {
    value.parse::<u32>().map(Ipv4Addr::from)
}

// A malformed timestamp never rejects the record
fn timestamp(value: &str) -> Option<Timestamp> {
    value.parse::<i64>().ok().map(Timestamp::from_epoch_seconds)
}
