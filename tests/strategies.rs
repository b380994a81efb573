//! Cross-strategy integration tests
//!
//! Every strategy runs against a wiremock endpoint with a fixed per-date
//! response script, so the three concurrency models can be checked for the
//! one property that matters: identical store contents from identical input.

use moex_harvest::strategy::{bounded, pool, ranks, StrategyOptions};
use moex_harvest::{DateKey, EndpointConfig, Error, MergeStore};
use std::collections::BTreeSet;
use std::path::PathBuf;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Response body carrying one data row under the given `dd.mm.yyyy` trade date
fn payload(trade_date_dotted: &str) -> String {
    format!(
        "<div>Открытые позиции на {trade_date_dotted}</div>\n\
         <table>\n\
         <tr><th>Contract</th><th>Long</th><th>Short</th></tr>\n\
         <tr><td>MIX-6.25</td><td>1000</td><td>900</td></tr>\n\
         </table>"
    )
}

/// A mock endpoint plus the runtime that keeps it served
///
/// Strategies under test run on plain threads (or their own runtime), so the
/// server needs an explicit multi-thread runtime alive for the test duration.
struct Endpoint {
    _rt: tokio::runtime::Runtime,
    uri: String,
    _server: MockServer,
}

impl Endpoint {
    /// Script the endpoint: each entry maps a requested `YYYYMMDD` key to
    /// either a 200 payload with the given `dd.mm.yyyy` trade date or a 500
    fn script(responses: &[(&str, Option<&str>)]) -> Self {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            for (requested, trade_date) in responses {
                let template = match trade_date {
                    Some(dotted) => ResponseTemplate::new(200).set_body_string(payload(dotted)),
                    None => ResponseTemplate::new(500),
                };
                Mock::given(method("POST"))
                    .and(query_param("d", *requested))
                    .respond_with(template)
                    .mount(&server)
                    .await;
            }
            server
        });
        let uri = server.uri();
        Self {
            _rt: rt,
            uri,
            _server: server,
        }
    }

    fn options(&self, start: &str, end: &str, output: PathBuf, workers: usize) -> StrategyOptions {
        StrategyOptions {
            start: DateKey::parse(start).unwrap(),
            end: DateKey::parse(end).unwrap(),
            output,
            workers,
            concurrent: workers,
            clean: false,
            endpoint: EndpointConfig {
                url: self.uri.clone(),
                timeout_secs: 5,
                ..EndpointConfig::default()
            },
        }
    }
}

fn committed(output: &PathBuf) -> BTreeSet<String> {
    MergeStore::new(output)
        .committed_dates()
        .unwrap()
        .iter()
        .map(|k| k.to_string())
        .collect()
}

#[test]
fn test_all_strategies_agree_under_identical_failures() {
    // 5 requested days, one scripted to fail; the committed trade-date sets
    // must be identical across all three models
    let endpoint = Endpoint::script(&[
        ("20250106", Some("06.01.2025")),
        ("20250107", Some("07.01.2025")),
        ("20250108", None),
        ("20250109", Some("09.01.2025")),
        ("20250110", Some("10.01.2025")),
    ]);
    let dir = tempfile::tempdir().unwrap();

    let pool_out = dir.path().join("pool.csv");
    let ranks_out = dir.path().join("ranks.csv");
    let bounded_out = dir.path().join("bounded.csv");

    pool::run(&endpoint.options("20250106", "20250110", pool_out.clone(), 4)).unwrap();
    ranks::run(&endpoint.options("20250106", "20250110", ranks_out.clone(), 4)).unwrap();
    bounded::run(&endpoint.options("20250106", "20250110", bounded_out.clone(), 4)).unwrap();

    let expected: BTreeSet<String> = ["20250106", "20250107", "20250109", "20250110"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(committed(&pool_out), expected);
    assert_eq!(committed(&ranks_out), expected, "ranks should match pool");
    assert_eq!(committed(&bounded_out), expected, "bounded should match pool");
}

#[test]
fn test_pool_happy_path_commits_every_date() {
    let endpoint = Endpoint::script(&[
        ("20250101", Some("01.01.2025")),
        ("20250102", Some("02.01.2025")),
        ("20250103", Some("03.01.2025")),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");

    let report = pool::run(&endpoint.options("20250101", "20250103", out.clone(), 2)).unwrap();

    assert_eq!(report.requested, 3);
    assert_eq!(report.committed_rows, 3, "one row per scripted payload");
    assert_eq!(committed(&out).len(), 3);
    assert!(report.throughput() > 0.0);
}

#[test]
fn test_overlapping_trade_dates_commit_once() {
    // a Saturday request and the following Monday both resolve to Friday;
    // the store must end up with exactly one entry
    let endpoint = Endpoint::script(&[
        ("20250405", Some("04.04.2025")),
        ("20250406", Some("04.04.2025")),
        ("20250407", Some("04.04.2025")),
    ]);
    let dir = tempfile::tempdir().unwrap();

    for (name, run) in [
        ("pool", pool::run as fn(&StrategyOptions) -> moex_harvest::Result<moex_harvest::RunReport>),
        ("ranks", ranks::run),
        ("bounded", bounded::run),
    ] {
        let out = dir.path().join(format!("{name}.csv"));
        let report = run(&endpoint.options("20250405", "20250407", out.clone(), 2)).unwrap();

        let keys = committed(&out);
        assert_eq!(
            keys.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["20250404"],
            "{name}: all three requests resolve to one trade date"
        );
        assert_eq!(
            report.committed_rows, 1,
            "{name}: only one commit may write rows"
        );
    }
}

#[test]
fn test_inverted_range_fails_before_any_network_activity() {
    // endpoint deliberately unreachable: the range check must fire first
    let opts = StrategyOptions {
        start: DateKey::parse("20250501").unwrap(),
        end: DateKey::parse("20250408").unwrap(),
        output: PathBuf::from("unused.csv"),
        workers: 2,
        concurrent: 2,
        clean: false,
        endpoint: EndpointConfig {
            url: "http://127.0.0.1:1/x".to_string(),
            timeout_secs: 1,
            ..EndpointConfig::default()
        },
    };

    for run in [
        pool::run as fn(&StrategyOptions) -> moex_harvest::Result<moex_harvest::RunReport>,
        ranks::run,
        bounded::run,
    ] {
        match run(&opts) {
            Err(Error::InvalidRange { start, end }) => {
                assert_eq!(start, "20250501");
                assert_eq!(end, "20250408");
            }
            other => panic!("expected InvalidRange, got {:?}", other.map(|r| r.requested)),
        }
    }
    assert!(!PathBuf::from("unused.csv").exists());
}

#[test]
fn test_unscripted_endpoint_yields_empty_store() {
    // wiremock answers 404 for unmatched requests; every date drops
    let endpoint = Endpoint::script(&[]);
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");

    let report = pool::run(&endpoint.options("20250101", "20250102", out.clone(), 1)).unwrap();

    assert_eq!(report.requested, 2);
    assert_eq!(report.committed_rows, 0);
    assert!(committed(&out).is_empty());
}
