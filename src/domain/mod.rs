//! Module for the types describing a network flow.

use std::net::Ipv4Addr;
use std::sync::Arc;

/// A single flow record as read from an nfdump export.
///
/// Counters, protocol and ports are carried verbatim as text. Addresses are
/// `None` when the input value could not be decoded under a lenient address
/// policy, timestamps are `None` when the epoch value was not a number.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRecord {
    host: Arc<str>,
    in_bytes: String,
    in_pkts: String,
    source_address: Option<Ipv4Addr>,
    dest_address: Option<Ipv4Addr>,
    protocol: String,
    source_port: String,
    dest_port: String,
    first_seen: Option<Timestamp>,
    last_seen: Option<Timestamp>,
    source_geo: Option<GeoLocation>,
    dest_geo: Option<GeoLocation>,
}

/// The fields of a [`FlowRecord`] as extracted from a line, before enrichment.
pub(crate) struct FlowFields {
    pub(crate) host: Arc<str>,
    pub(crate) in_bytes: String,
    pub(crate) in_pkts: String,
    pub(crate) source_address: Option<Ipv4Addr>,
    pub(crate) dest_address: Option<Ipv4Addr>,
    pub(crate) protocol: String,
    pub(crate) source_port: String,
    pub(crate) dest_port: String,
    pub(crate) first_seen: Option<Timestamp>,
    pub(crate) last_seen: Option<Timestamp>,
}

impl FlowRecord {
    pub(crate) fn new(fields: FlowFields) -> Self {
        let FlowFields {
            host,
            in_bytes,
            in_pkts,
            source_address,
            dest_address,
            protocol,
            source_port,
            dest_port,
            first_seen,
            last_seen,
        } = fields;
        Self {
            host,
            in_bytes,
            in_pkts,
            source_address,
            dest_address,
            protocol,
            source_port,
            dest_port,
            first_seen,
            last_seen,
            source_geo: None,
            dest_geo: None,
        }
    }

    /// Returns the record with the given locations attached. Empty locations are dropped.
    pub fn with_geo(self, source: Option<GeoLocation>, dest: Option<GeoLocation>) -> Self {
        Self {
            source_geo: source.filter(|g| !g.is_empty()),
            dest_geo: dest.filter(|g| !g.is_empty()),
            ..self
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
    pub fn in_bytes(&self) -> &str {
        &self.in_bytes
    }
    pub fn in_pkts(&self) -> &str {
        &self.in_pkts
    }
    pub fn source_address(&self) -> Option<Ipv4Addr> {
        self.source_address
    }
    pub fn dest_address(&self) -> Option<Ipv4Addr> {
        self.dest_address
    }
    pub fn protocol(&self) -> &str {
        &self.protocol
    }
    pub fn source_port(&self) -> &str {
        &self.source_port
    }
    pub fn dest_port(&self) -> &str {
        &self.dest_port
    }
    pub fn first_seen(&self) -> Option<Timestamp> {
        self.first_seen
    }
    pub fn last_seen(&self) -> Option<Timestamp> {
        self.last_seen
    }
    pub fn source_geo(&self) -> Option<&GeoLocation> {
        self.source_geo.as_ref()
    }
    pub fn dest_geo(&self) -> Option<&GeoLocation> {
        self.dest_geo.as_ref()
    }
}

/// Seconds since the Unix epoch, rendered as a UTC calendar timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    const FORMAT: &'static str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn from_epoch_seconds(secs: i64) -> Self {
        Self(secs)
    }

    pub fn epoch_seconds(&self) -> i64 {
        self.0
    }

    /// The timestamp in RFC 3339 form with a `Z` suffix, or `None` if it is out of the calendar range.
    pub fn to_rfc3339(&self) -> Option<String> {
        chrono::DateTime::from_timestamp(self.0, 0).map(|dt| dt.format(Self::FORMAT).to_string())
    }
}

/// Coarse location of an address.
///
/// Every field is optional on its own. The lookup database reports unknown
/// coordinates as zero, so a zero latitude or longitude is stored as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoLocation {
    pub country_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeoLocation {
    /// Builds a location from raw lookup values, treating empty codes and zero coordinates as unknown.
    pub fn from_lookup(country_code: Option<&str>, latitude: Option<f64>, longitude: Option<f64>) -> Self {
        Self {
            country_code: country_code
                .filter(|code| !code.is_empty())
                .map(str::to_string),
            latitude: latitude.filter(|v| *v != 0.0),
            longitude: longitude.filter(|v| *v != 0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.country_code.is_none() && self.latitude.is_none() && self.longitude.is_none()
    }
}
