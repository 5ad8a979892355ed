mod config;
mod domain;
mod engine;
mod error;
mod geo;
mod input;
mod output;
mod store;
mod telemetry;

pub use config::{
    AddressPolicy, DEFAULT_BATCH_SIZE, DEFAULT_CHANNEL_CAPACITY, DEFAULT_HOST, DEFAULT_WORKERS,
    PipelineConfig,
};
pub use domain::{FlowRecord, GeoLocation, Timestamp};
pub use engine::{CancelHandle, CancelSignal, Pipeline, RunSummary, cancellation};
pub use error::{Error, GeoError, ParseError, StoreError};
pub use geo::{GeoLookup, MaxMindLookup};
pub use input::{EXPECTED_FIELDS, RecordParser, decode_address};
pub use output::{FlowDocument, GeoDocument, to_document};
pub use store::{
    ListStore, MemoryConnection, MemoryStore, RedisConnection, RedisStore, StoreConnection,
    StoreWriter, WriterStats,
};
pub use telemetry::setup_logging;
