//! Module reading the nfdump export and turning its lines into flow records.

use std::io::Read;
use std::thread::Scope;

use crossbeam_channel::{Receiver, bounded, select};
use tracing::debug;

use crate::engine::CancelSignal;

mod record;


pub use record::{EXPECTED_FIELDS, RecordParser, decode_address};

/// One raw record of the input together with its 1-based line number.
#[derive(Debug)]
pub(crate) struct Line {
    pub(crate) number: u64,
    pub(crate) record: csv::ByteRecord,
}

/// Receiving ends of a running line source.
pub(crate) struct LineSource {
    /// Closed once the input is exhausted or the source was cancelled
    pub(crate) lines: Receiver<Line>,
    /// Receives the scan outcome exactly once, after the last line was handed off.
    /// Nothing is sent if the source was cancelled.
    pub(crate) outcome: Receiver<Result<(), csv::Error>>,
}

/// Starts a thread scanning `reader` and handing each record to whichever consumer is ready.
///
/// Every hand-off also listens on `cancelled`, so a producer blocked on a full
/// channel exits as soon as the signal is raised.
pub(crate) fn spawn_line_source<'s, 'e>(
    s: &'s Scope<'s, 'e>,
    reader: impl Read + Send + 's,
    channel_capacity: usize,
    cancelled: CancelSignal,
) -> LineSource {
    let (lines_tx, lines_rx) = bounded::<Line>(channel_capacity);
    let (outcome_tx, outcome_rx) = bounded::<Result<(), csv::Error>>(1);

    s.spawn(move || {
        let mut delivered = 0u64;
        for result in reader_builder().from_reader(reader).into_byte_records() {
            let mut record = match result {
                Ok(record) => record,
                Err(err) => {
                    // single-slot channel, never full at this point
                    let _ = outcome_tx.send(Err(err));
                    return;
                }
            };
            trim_carriage_return(&mut record);
            let number = record.position().map_or(0, |p| p.line());

            select! {
                send(lines_tx, Line { number, record }) -> sent => {
                    if sent.is_err() {
                        debug!("all digesters are gone, line source stops");
                        return;
                    }
                    delivered += 1;
                }
                recv(cancelled.channel()) -> _ => {
                    debug!(delivered, "line source cancelled");
                    return;
                }
            }
        }
        debug!(delivered, "input exhausted, draining");
        let _ = outcome_tx.send(Ok(()));
    });

    LineSource {
        lines: lines_rx,
        outcome: outcome_rx,
    }
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(record::FIELD_DELIMITER)
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .terminator(csv::Terminator::Any(b'\n'));
    builder
}

// Records end at `\n` only, a CRLF line leaves its `\r` on the last field
fn trim_carriage_return(record: &mut csv::ByteRecord) {
    let Some(last) = record.iter().last() else {
        return;
    };
    if let Some(trimmed) = last.strip_suffix(b"\r") {
        let trimmed = trimmed.to_vec();
        record.truncate(record.len() - 1);
        record.push_field(&trimmed);
    }
}
