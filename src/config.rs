//! Module holding the run configuration handed to the pipeline

use crate::Error;

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_HOST: &str = "localhost";

/// How the parser treats address fields that are not decimal 32-bit integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddressPolicy {
    /// Reject the record
    #[default]
    Strict,
    /// Keep the record with an empty address
    Lenient,
}

/// Settings of a single ingestion run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Name of the list the documents are appended to
    pub list_key: String,
    /// Host label written into every document
    pub host: String,
    /// Number of pipelined writes per flush
    pub batch_size: usize,
    /// Number of parallel digesters, each with its own store connection
    pub workers: usize,
    /// Bound of the line and error hand-off channels
    pub channel_capacity: usize,
    pub address_policy: AddressPolicy,
}

impl PipelineConfig {
    pub fn new(list_key: impl Into<String>) -> Self {
        Self {
            list_key: list_key.into(),
            host: DEFAULT_HOST.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            address_policy: AddressPolicy::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    pub fn with_address_policy(mut self, address_policy: AddressPolicy) -> Self {
        self.address_policy = address_policy;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.list_key.is_empty() {
            return Err(Error::Config("the list key must not be empty".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::Config("at least one worker is required".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("the batch size must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use claims::{assert_err, assert_ok};

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::new("flows");
        assert_ok!(config.validate());
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.address_policy, AddressPolicy::Strict);
    }

    #[test]
    fn zero_workers_or_batch_size_are_rejected() {
        assert_err!(PipelineConfig::new("flows").with_workers(0).validate());
        assert_err!(PipelineConfig::new("flows").with_batch_size(0).validate());
        assert_err!(PipelineConfig::new("").validate());
    }
}
