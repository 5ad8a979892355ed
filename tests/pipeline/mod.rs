//! Integration tests running the whole pipeline against the in-memory store

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use claims::{assert_matches, assert_ok};
use proptest::prelude::*;
use rstest::rstest;

use flow_ingest::{
    AddressPolicy, Error, GeoLocation, GeoLookup, ListStore, MemoryStore, ParseError, Pipeline,
    PipelineConfig, RunSummary, StoreConnection,
};

const SAMPLE: &str = "2|1463425844|692|1463425855|188|6|0|0|0|3232235777|443|0|0|0|3232235778|57145|64512|12357|39|41|0|0|10|5256";

fn fixture() -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join("flows.nfdump");
    std::fs::read_to_string(path).expect("failed to read fixture")
}

/// Helper: runs the pipeline over `input`, returning the summary, the errors and the stored documents.
fn run(input: &str, config: PipelineConfig) -> (RunSummary, Vec<Error>, Vec<String>) {
    let store = MemoryStore::new();
    let key = config.list_key.clone();
    let pipeline = assert_ok!(Pipeline::new(config));

    let mut errors = Vec::new();
    let summary = assert_ok!(pipeline.run(input.as_bytes(), &store, |e| errors.push(e)));
    (summary, errors, store.list(&key))
}

fn sorted(mut documents: Vec<String>) -> Vec<String> {
    documents.sort();
    documents
}

#[test]
fn sample_line_becomes_the_expected_document() {
    let (summary, errors, documents) = run(SAMPLE, PipelineConfig::new("flows"));

    assert!(errors.is_empty());
    assert_eq!(summary.appended, 1);
    assert_eq!(
        documents,
        vec![
            r#"{"host":"localhost","in_bytes":"5256","in_pkts":"10","ipv4_src_addr":"192.168.1.1","ipv4_dst_addr":"192.168.1.2","protocol":"6","l4_src_port":"443","l4_dst_port":"57145","first_switched":"2016-05-16T19:10:44Z","last_switched":"2016-05-16T19:10:55Z"}"#
        ]
    );
}

#[test]
fn bad_lines_are_reported_and_skipped() {
    let (summary, errors, documents) = run(&fixture(), PipelineConfig::new("flows").with_workers(3));

    assert_eq!(summary.lines, 7);
    assert_eq!(summary.appended, 5);
    assert_eq!(summary.failed, 2);
    assert_eq!(documents.len(), 5);

    let mut errors = errors;
    errors.sort_by_key(|e| match e {
        Error::Parse { line, .. } => *line,
        _ => u64::MAX,
    });
    assert_matches!(
        &errors[0],
        Error::Parse {
            line: 4,
            source: ParseError::MalformedRecord { found: 1, .. }
        }
    );
    assert_matches!(
        &errors[1],
        Error::Parse {
            line: 6,
            source: ParseError::InvalidAddress { .. }
        }
    );
    assert!(errors.iter().all(Error::is_recoverable));
}

#[test]
fn lenient_addresses_keep_the_record() {
    let config = PipelineConfig::new("flows").with_address_policy(AddressPolicy::Lenient);
    let (summary, errors, documents) = run(&fixture(), config);

    assert_eq!(summary.appended, 6);
    assert_eq!(errors.len(), 1);
    assert!(
        documents
            .iter()
            .any(|d| d.contains(r#""ipv4_src_addr":"","ipv4_dst_addr":"192.168.1.25""#))
    );
}

#[test]
fn host_label_is_written_into_every_document() {
    let config = PipelineConfig::new("flows").with_host("collector-7.example.net");
    let (_, _, documents) = run(&fixture(), config);

    assert!(
        documents
            .iter()
            .all(|d| d.starts_with(r#"{"host":"collector-7.example.net","#))
    );
}

#[rstest]
fn batch_size_changes_flushes_but_not_documents(#[values(1, 2, 5, 64)] batch_size: usize) {
    let input = fixture().repeat(20);
    let config = PipelineConfig::new("flows")
        .with_workers(1)
        .with_batch_size(batch_size);
    let (summary, _, documents) = run(&input, config);

    let (_, _, reference) = run(&input, PipelineConfig::new("flows").with_workers(1));
    assert_eq!(summary.appended, 100);
    assert_eq!(documents, reference);
    assert_eq!(summary.flushes, 100u64.div_ceil(batch_size as u64));
}

#[test]
fn single_digester_keeps_source_order() {
    let input: String = (0..30)
        .map(|i| SAMPLE.replacen("|443|", &format!("|{i}|"), 1) + "\n")
        .collect();
    let (_, _, documents) = run(&input, PipelineConfig::new("flows").with_workers(1));

    let ports: Vec<String> = documents
        .iter()
        .map(|d| {
            let value: serde_json::Value = serde_json::from_str(d).unwrap();
            value["l4_src_port"].as_str().unwrap().to_string()
        })
        .collect();
    let expected: Vec<String> = (0..30).map(|i| i.to_string()).collect();
    assert_eq!(ports, expected);
}

#[test]
fn final_length_includes_earlier_runs() {
    let store = MemoryStore::new();
    let pipeline = assert_ok!(Pipeline::new(PipelineConfig::new("flows")));

    for _ in 0..2 {
        assert_ok!(pipeline.run(fixture().as_bytes(), &store, |_| {}));
    }
    assert_eq!(assert_ok!(store.len("flows")), 10);

    assert_ok!(store.clear("flows"));
    assert_ok!(pipeline.run(fixture().as_bytes(), &store, |_| {}));
    assert_eq!(assert_ok!(store.len("flows")), 5);
}

struct CountryLookup(HashMap<Ipv4Addr, &'static str>);

impl GeoLookup for CountryLookup {
    fn locate(&self, address: Ipv4Addr) -> Option<GeoLocation> {
        self.0
            .get(&address)
            .map(|code| GeoLocation::from_lookup(Some(*code), None, None))
    }
}

#[test]
fn enrichment_adds_geo_blocks() {
    let lookup = CountryLookup(HashMap::from([
        (Ipv4Addr::new(142, 58, 103, 21), "CA"),
        (Ipv4Addr::new(217, 12, 24, 33), "ES"),
    ]));
    let store = MemoryStore::new();
    let pipeline =
        assert_ok!(Pipeline::new(PipelineConfig::new("flows"))).with_enricher(Arc::new(lookup));

    assert_ok!(pipeline.run(fixture().as_bytes(), &store, |_| {}));

    let documents = store.list("flows");
    let enriched: Vec<&String> = documents.iter().filter(|d| d.contains("geoip")).collect();
    assert_eq!(enriched.len(), 1);
    assert!(enriched[0].ends_with(r#""geoip_src":{"iso_code":"CA"},"geoip_dst":{"iso_code":"ES"}}"#));
}

#[test]
fn every_digester_gets_its_own_connection() {
    let store = MemoryStore::new();
    let pipeline = assert_ok!(Pipeline::new(PipelineConfig::new("flows").with_workers(6)));
    assert_ok!(pipeline.run(fixture().as_bytes(), &store, |_| {}));
    assert_eq!(store.connections(), 6);

    // a connection of its own still sees the others' flushed writes
    let mut conn = assert_ok!(store.connect());
    assert_ok!(conn.queue_push("flows", "{}".to_string()));
    assert_ok!(conn.flush());
    assert_eq!(assert_ok!(store.len("flows")), 6);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn worker_count_does_not_change_the_documents(
        workers in 2usize..=8,
        batch_size in 1usize..=10,
        repetitions in 1usize..=20,
    ) {
        let input = fixture().repeat(repetitions);
        let (_, _, single) = run(&input, PipelineConfig::new("flows").with_workers(1));
        let (summary, errors, parallel) = run(
            &input,
            PipelineConfig::new("flows").with_workers(workers).with_batch_size(batch_size),
        );

        prop_assert_eq!(summary.appended as usize, 5 * repetitions);
        prop_assert_eq!(errors.len(), 2 * repetitions);
        prop_assert_eq!(sorted(single), sorted(parallel));
    }
}
