//! Module turning flow records into the JSON documents pushed to the store.

use serde::Serialize;

use crate::domain::{FlowRecord, GeoLocation};


/// Wire shape of a flow record. Field order is the key order of the document.
#[derive(Serialize, Debug, PartialEq)]
pub struct FlowDocument<'a> {
    pub host: &'a str,
    pub in_bytes: &'a str,
    pub in_pkts: &'a str,
    pub ipv4_src_addr: String,
    pub ipv4_dst_addr: String,
    pub protocol: &'a str,
    pub l4_src_port: &'a str,
    pub l4_dst_port: &'a str,
    pub first_switched: String,
    pub last_switched: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoip_src: Option<GeoDocument<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoip_dst: Option<GeoDocument<'a>>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct GeoDocument<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl<'a> FlowDocument<'a> {
    pub fn from_record(record: &'a FlowRecord) -> Self {
        Self {
            host: record.host(),
            in_bytes: record.in_bytes(),
            in_pkts: record.in_pkts(),
            ipv4_src_addr: record
                .source_address()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            ipv4_dst_addr: record
                .dest_address()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            protocol: record.protocol(),
            l4_src_port: record.source_port(),
            l4_dst_port: record.dest_port(),
            first_switched: record
                .first_seen()
                .and_then(|t| t.to_rfc3339())
                .unwrap_or_default(),
            last_switched: record
                .last_seen()
                .and_then(|t| t.to_rfc3339())
                .unwrap_or_default(),
            geoip_src: record.source_geo().map(GeoDocument::from_location),
            geoip_dst: record.dest_geo().map(GeoDocument::from_location),
        }
    }
}

impl<'a> GeoDocument<'a> {
    fn from_location(location: &'a GeoLocation) -> Self {
        Self {
            iso_code: location.country_code.as_deref(),
            latitude: location.latitude,
            longitude: location.longitude,
        }
    }
}

/// Serializes a record into its compact JSON document.
pub fn to_document(record: &FlowRecord) -> Result<String, serde_json::Error> {
    serde_json::to_string(&FlowDocument::from_record(record))
}
