//! Module defining the errors which are exposed to the users of the crate

use std::num::ParseIntError;

/// Errors raised while turning a single input line into a [`crate::FlowRecord`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The line does not carry the fixed number of pipe-delimited fields
    #[error("malformed record: expected at least {expected} fields, found {found}")]
    MalformedRecord { expected: usize, found: usize },

    /// An address field is not a decimal-encoded 32-bit integer
    #[error("invalid address {value:?}: {source}")]
    InvalidAddress {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Failures of the list store client.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("invalid store address {address:?}: {message}")]
    Address { address: String, message: String },

    /// The store refused the operation (used by the in-memory store)
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the geographic lookup database.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("geo database: {0}")]
    Database(#[from] maxminddb::MaxMindDBError),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading the input failed; terminal for the whole run
    #[error("input scan failed: {0}")]
    Scan(#[from] csv::Error),

    /// A record whose bytes are not valid UTF-8
    #[error("line {line}: record is not valid UTF-8: {message}")]
    Encoding { line: u64, message: String },

    /// A record violating the flow record format
    #[error("line {line}: {source}")]
    Parse {
        line: u64,
        #[source]
        source: ParseError,
    },

    #[error("line {line}: serialization failed: {source}")]
    Serialize {
        line: u64,
        #[source]
        source: serde_json::Error,
    },

    /// Queueing or flushing the document of this line failed.
    /// `dropped` counts every queued write lost with it, this line included.
    #[error("line {line}: store write failed, {dropped} writes dropped: {source}")]
    Submit {
        line: u64,
        dropped: u64,
        #[source]
        source: StoreError,
    },

    /// The closing flush of a digester failed, the writes still queued on its connection are lost
    #[error("digester {digester}: final flush of {pending} writes failed: {source}")]
    Flush {
        digester: usize,
        pending: usize,
        #[source]
        source: StoreError,
    },

    /// Store failure outside of a line, e.g. while connecting
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error only affects a single line (or a single digester) and the run can go on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Encoding { .. }
                | Error::Parse { .. }
                | Error::Serialize { .. }
                | Error::Submit { .. }
                | Error::Flush { .. }
        )
    }
}

pub(crate) fn parse_error(line: u64, source: ParseError) -> Error {
    Error::Parse { line, source }
}

pub(crate) fn submit_error(line: u64, dropped: u64, source: StoreError) -> Error {
    Error::Submit {
        line,
        dropped,
        source,
    }
}
