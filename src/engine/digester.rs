//! A digester turns raw lines into documents submitted on its own store connection.

use crossbeam_channel::{Receiver, Sender, select};
use tracing::debug;

use crate::{
    Error,
    engine::CancelSignal,
    error::{parse_error, submit_error},
    geo::{GeoLookup, enrich},
    input::{Line, RecordParser},
    output::to_document,
    store::{StoreConnection, StoreWriter, WriterStats},
};

pub(super) struct Digester<'a, C> {
    id: usize,
    parser: &'a RecordParser,
    enricher: Option<&'a dyn GeoLookup>,
    writer: StoreWriter<C>,
}

/// What a digester did over its lifetime.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct DigesterReport {
    pub(super) lines: u64,
    pub(super) writer: WriterStats,
}

impl<'a, C: StoreConnection> Digester<'a, C> {
    pub(super) fn new(
        id: usize,
        parser: &'a RecordParser,
        enricher: Option<&'a dyn GeoLookup>,
        writer: StoreWriter<C>,
    ) -> Self {
        Self {
            id,
            parser,
            enricher,
            writer,
        }
    }

    /// Pulls lines until the source is exhausted or the run is cancelled, then flushes what is still queued.
    ///
    /// Per-line failures go to `errors` and never stop the digester.
    pub(super) fn run(
        mut self,
        lines: Receiver<Line>,
        cancelled: &CancelSignal,
        errors: Sender<Error>,
    ) -> DigesterReport {
        let mut processed = 0u64;
        loop {
            select! {
                recv(lines) -> line => {
                    let Ok(line) = line else { break };
                    processed += 1;
                    if let Err(err) = self.digest(line) {
                        // Send fails only if the aggregator panicked; surfaced at join().
                        let _ = errors.send(err);
                    }
                }
                recv(cancelled.channel()) -> _ => {
                    debug!(digester = self.id, "digester cancelled");
                    break;
                }
            }
        }

        let pending = self.writer.pending();
        if let Err(source) = self.writer.flush() {
            let _ = errors.send(Error::Flush {
                digester: self.id,
                pending,
                source,
            });
        }

        let stats = self.writer.stats();
        debug!(
            digester = self.id,
            lines = processed,
            appended = stats.appended,
            lost = stats.lost,
            flushes = stats.flushes,
            "digester finished"
        );
        DigesterReport {
            lines: processed,
            writer: stats,
        }
    }

    fn digest(&mut self, line: Line) -> Result<(), Error> {
        let Line { number, record } = line;

        let record = csv::StringRecord::from_byte_record(record).map_err(|err| Error::Encoding {
            line: number,
            message: err.to_string(),
        })?;
        let flow = self
            .parser
            .parse_fields(record.iter())
            .map_err(|err| parse_error(number, err))?;
        let flow = match self.enricher {
            Some(lookup) => enrich(flow, lookup),
            None => flow,
        };
        let document = to_document(&flow).map_err(|source| Error::Serialize {
            line: number,
            source,
        })?;

        let lost = self.writer.stats().lost;
        self.writer
            .submit(document)
            .map_err(|err| submit_error(number, self.writer.stats().lost - lost, err))
    }
}
