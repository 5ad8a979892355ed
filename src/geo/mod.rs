//! Geographic enrichment of flow addresses.
//!
//! The lookup itself is an external collaborator behind the [`GeoLookup`]
//! trait. [`MaxMindLookup`] reads a MaxMind GeoLite2/GeoIP2 database file.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use maxminddb::{MaxMindDBError, Reader};
use serde::Deserialize;
use tracing::debug;

use crate::domain::{FlowRecord, GeoLocation};
use crate::error::GeoError;


/// Address to location lookup, shared by all digesters.
///
/// A missing entry and a failed lookup both yield `None`; enrichment never fails a record.
pub trait GeoLookup: Send + Sync {
    fn locate(&self, address: Ipv4Addr) -> Option<GeoLocation>;
}

/// Attaches the locations of the source and destination addresses to `record`.
pub(crate) fn enrich(record: FlowRecord, lookup: &dyn GeoLookup) -> FlowRecord {
    let source = record.source_address().and_then(|a| lookup.locate(a));
    let dest = record.dest_address().and_then(|a| lookup.locate(a));
    record.with_geo(source, dest)
}

/// Lookup backed by a MaxMind database loaded into memory.
pub struct MaxMindLookup {
    reader: Reader<Vec<u8>>,
}

// Subset of the GeoLite2 Country/City record layout
#[derive(Deserialize)]
struct GeoRecord<'a> {
    #[serde(borrow)]
    country: Option<Country<'a>>,
    location: Option<Location>,
}

#[derive(Deserialize)]
struct Country<'a> {
    iso_code: Option<&'a str>,
}

#[derive(Deserialize)]
struct Location {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl MaxMindLookup {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GeoError> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self { reader })
    }

    /// Human readable description of the database: name, format version and build date.
    pub fn describe(&self) -> String {
        let metadata = &self.reader.metadata;
        let description = metadata
            .description
            .get("en")
            .cloned()
            .unwrap_or_else(|| metadata.database_type.clone());
        let built = i64::try_from(metadata.build_epoch)
            .ok()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.format("%d %b %y %H:%M UTC").to_string())
            .unwrap_or_default();
        format!(
            "{description} {}.{} ({built})",
            metadata.binary_format_major_version, metadata.binary_format_minor_version
        )
    }
}

impl fmt::Debug for MaxMindLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaxMindLookup")
            .field("database_type", &self.reader.metadata.database_type)
            .finish_non_exhaustive()
    }
}

impl GeoLookup for MaxMindLookup {
    fn locate(&self, address: Ipv4Addr) -> Option<GeoLocation> {
        match self.reader.lookup::<GeoRecord>(IpAddr::V4(address)) {
            Ok(record) => {
                let location = GeoLocation::from_lookup(
                    record.country.and_then(|c| c.iso_code),
                    record.location.as_ref().and_then(|l| l.latitude),
                    record.location.as_ref().and_then(|l| l.longitude),
                );
                (!location.is_empty()).then_some(location)
            }
            Err(MaxMindDBError::AddressNotFoundError(_)) => None,
            Err(err) => {
                debug!(%address, "geo lookup failed: {err}");
                None
            }
        }
    }
}
