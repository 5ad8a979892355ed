//! Module coordinating the line source, the digesters and the error aggregation.

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use crossbeam_channel::bounded;
use tracing::info;

use crate::{
    Error,
    config::PipelineConfig,
    geo::GeoLookup,
    input::{LineSource, RecordParser, spawn_line_source},
    store::{ListStore, StoreWriter, WriterStats},
};

mod cancel;
mod digester;


pub use cancel::{CancelHandle, CancelSignal, cancellation};
use digester::{Digester, DigesterReport};

/// Outcome of a completed run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Records taken from the input by a digester
    pub lines: u64,
    /// Documents confirmed by the store
    pub appended: u64,
    /// Documents dropped with a failed write or flush
    pub lost: u64,
    /// Errors reported to the error callback
    pub failed: u64,
    /// Flushes issued over all connections
    pub flushes: u64,
    /// Whether the run was stopped through its cancellation signal
    pub cancelled: bool,
}

/// Ingestion pipeline: one line source, a fixed pool of digesters and an error aggregator.
///
/// Each line of the input is handed to exactly one digester, which parses it,
/// optionally enriches it, serializes it and appends it to the configured list
/// through its own store connection.
///
/// # Error handling
///
/// An nfdump export is large and a single bad line must not abort the import.
/// Malformed lines and failed writes are reported to the caller-supplied
/// `on_error` callback and the run continues. Only setup failures and a failure
/// to read the input end the run with an error.
///
/// # Example
///
/// ```no_run
/// use std::fs::File;
/// use flow_ingest::{Pipeline, PipelineConfig, RedisStore};
///
/// let store = RedisStore::open("127.0.0.1:6379", None).unwrap();
/// let pipeline = Pipeline::new(PipelineConfig::new("flows").with_workers(8)).unwrap();
///
/// let input = File::open("flows.nfdump").unwrap();
/// let summary = pipeline
///     .run(input, &store, |e| eprintln!("skipped: {e}"))
///     .unwrap();
/// println!("appended {} documents", summary.appended);
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    parser: RecordParser,
    enricher: Option<Arc<dyn GeoLookup>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("enriched", &self.enricher.is_some())
            .finish()
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, Error> {
        config.validate()?;
        let parser = RecordParser::new(&config.host, config.address_policy);
        Ok(Self {
            config,
            parser,
            enricher: None,
        })
    }

    /// Enables geographic enrichment of both addresses of every record.
    pub fn with_enricher(mut self, lookup: Arc<dyn GeoLookup>) -> Self {
        self.enricher = Some(lookup);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the pipeline over `reader` until the input is exhausted.
    ///
    /// Per-line errors are handed to `on_error` and do not stop the run. The
    /// returned error is either a setup failure or the terminal scan error of
    /// the input, reported after every delivered line was processed.
    pub fn run<S: ListStore>(
        &self,
        reader: impl Read + Send,
        store: &S,
        on_error: impl FnMut(Error) + Send,
    ) -> Result<RunSummary, Error> {
        let (handle, cancelled) = cancellation();
        let result = self.run_until_cancelled(reader, store, cancelled, on_error);
        handle.cancel();
        result
    }

    /// Like [`Pipeline::run`], but stops early once `cancelled` is raised.
    ///
    /// Lines already taken by a digester are finished and every digester
    /// flushes its queued writes before exiting.
    pub fn run_until_cancelled<S: ListStore>(
        &self,
        reader: impl Read + Send,
        store: &S,
        cancelled: CancelSignal,
        mut on_error: impl FnMut(Error) + Send,
    ) -> Result<RunSummary, Error> {
        let workers = self.config.workers;
        let capacity = self.config.channel_capacity;

        // One private connection per digester, so pipelined writes never interleave
        let connections = (0..workers)
            .map(|_| store.connect())
            .collect::<Result<Vec<_>, _>>()?;

        let (report, failed) = std::thread::scope(|s| {
            let LineSource { lines, outcome } =
                spawn_line_source(s, reader, capacity, cancelled.clone());
            info!("Parsing has started...");

            let (error_tx, error_rx) = bounded::<Error>(capacity);
            let aggregator = s.spawn(move || {
                let mut failed = 0u64;
                for err in error_rx {
                    failed += 1;
                    on_error(err);
                }
                failed
            });

            let digesters: Vec<_> = connections
                .into_iter()
                .enumerate()
                .map(|(id, connection)| {
                    let writer =
                        StoreWriter::new(connection, &self.config.list_key, self.config.batch_size);
                    let digester =
                        Digester::new(id, &self.parser, self.enricher.as_deref(), writer);
                    let lines = lines.clone();
                    let errors = error_tx.clone();
                    let cancelled = cancelled.clone();
                    s.spawn(move || digester.run(lines, &cancelled, errors))
                })
                .collect();
            info!("Number of workers running: {workers}.");

            // Digesters hold their own clones; the aggregator ends once they are gone
            drop(lines);
            drop(error_tx);

            let mut total = DigesterReport::default();
            for handle in digesters {
                let report = handle.join().expect("digester thread does not panic");
                total.lines += report.lines;
                total.writer += report.writer;
            }
            let failed = aggregator.join().expect("error aggregator does not panic");

            // Nothing arrives when the source was cancelled
            match outcome.recv() {
                Ok(Err(err)) => Err(Error::Scan(err)),
                _ => Ok((total, failed)),
            }
        })?;

        let summary = summarize(report, failed, cancelled.is_cancelled());
        info!(
            lines = summary.lines,
            appended = summary.appended,
            lost = summary.lost,
            failed = summary.failed,
            flushes = summary.flushes,
            "Run finished"
        );
        Ok(summary)
    }
}

fn summarize(report: DigesterReport, failed: u64, cancelled: bool) -> RunSummary {
    let WriterStats {
        appended,
        flushes,
        lost,
        ..
    } = report.writer;
    RunSummary {
        lines: report.lines,
        appended,
        lost,
        failed,
        flushes,
        cancelled,
    }
}
