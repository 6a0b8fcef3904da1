use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use stock_ranking::config::{MissingPolicy, QueryParam, RequestConfig, ResponseFormat};
use stock_ranking::engine::{AggregationEngine, BatchStatus, EngineSettings, EngineState, Universe};
use stock_ranking::error::{AppError, FetchError};
use stock_ranking::fetch::{
    decode_records, BatchDescriptor, BatchPlanner, FetchResult, QuoteSource, RawQuoteRecord,
};
use stock_ranking::quote::DayReturn;
use stock_ranking::records::RenderedReport;

fn request_config() -> RequestConfig {
    RequestConfig {
        endpoint: "http://quotes.test/stock".to_string(),
        query: vec![QueryParam::new("symbol", "{symbols}")],
        headers: HashMap::new(),
        symbol_separator: ",".to_string(),
        symbol_quote: None,
    }
}

fn symbols(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("S{i:03}")).collect()
}

fn plan(universe: &Universe, batch_size: usize) -> Vec<BatchDescriptor> {
    BatchPlanner::new(batch_size)
        .plan(universe, &request_config())
        .expect("plan")
}

/// Deterministic prices so every symbol's expected state is known up front.
fn priced_record(symbol: &str) -> RawQuoteRecord {
    let n: f64 = symbol[1..].parse().unwrap();
    RawQuoteRecord::new(symbol, 100.0 + n, 100.0 + 2.0 * n)
}

#[derive(Default)]
struct ScriptedSource {
    failing: HashSet<usize>,
    hanging: HashSet<usize>,
    extra: HashMap<usize, Vec<RawQuoteRecord>>,
    delay: Option<Duration>,
    jitter_ms: Option<u64>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl QuoteSource for ScriptedSource {
    async fn fetch(&self, batch: &BatchDescriptor) -> FetchResult<Vec<RawQuoteRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.hanging.contains(&batch.group_index) {
            std::future::pending::<()>().await;
        }

        let mut wait = self.delay.unwrap_or_default();
        if let Some(jitter) = self.jitter_ms {
            let extra = rand::rng().random_range(0..=jitter);
            wait += Duration::from_millis(extra);
        }
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&batch.group_index) {
            return Err(FetchError::malformed("service unavailable"));
        }

        let mut records: Vec<RawQuoteRecord> =
            batch.symbols.iter().map(|s| priced_record(s)).collect();
        records.extend(self.extra.get(&batch.group_index).cloned().unwrap_or_default());
        Ok(records)
    }
}

fn engine(
    count: usize,
    batch_size: usize,
    source: ScriptedSource,
    settings: EngineSettings,
) -> AggregationEngine<ScriptedSource> {
    let universe = Universe::from_symbols(symbols(count));
    let batches = plan(&universe, batch_size);
    AggregationEngine::new(universe, batches, source, settings).expect("engine")
}

struct FixedSource(String);

#[async_trait]
impl QuoteSource for FixedSource {
    async fn fetch(&self, _batch: &BatchDescriptor) -> FetchResult<Vec<RawQuoteRecord>> {
        let format = ResponseFormat {
            data_path: vec![],
            symbol_field: "symbol".to_string(),
            open_field: "Open".to_string(),
            last_field: "Last".to_string(),
        };
        decode_records(&self.0, &format)
    }
}

#[tokio::test]
async fn ranks_two_symbols_end_to_end() {
    let universe = Universe::from_symbols(["AAA", "BBB"]);
    let batches = plan(&universe, 200);
    assert_eq!(batches.len(), 1);

    let source = FixedSource(
        r#"[{"symbol":"AAA","Open":10,"Last":11},{"symbol":"BBB","Open":20,"Last":18}]"#
            .to_string(),
    );
    let mut engine =
        AggregationEngine::new(universe, batches, source, EngineSettings::default()).unwrap();
    let mut report = RenderedReport::new(MissingPolicy::Flag);

    let summary = engine.run(&mut report).await.unwrap().expect("first run");

    assert_eq!(
        report.text,
        "Symbol: AAA, Return: 0.1\nSymbol: BBB, Return: -0.1\n"
    );
    assert_eq!(summary.reported, 2);
    assert_eq!(engine.state(), EngineState::Reported);
}

#[tokio::test]
async fn missing_last_price_is_reported_as_no_data() {
    let universe = Universe::from_symbols(["AAA", "BBB", "CCC"]);
    let batches = plan(&universe, 200);
    let source = FixedSource(
        r#"[{"symbol":"AAA","Open":10,"Last":null},{"symbol":"BBB","Open":20,"Last":18},{"symbol":"CCC","Open":null,"Last":5}]"#
            .to_string(),
    );
    let mut engine =
        AggregationEngine::new(universe, batches, source, EngineSettings::default()).unwrap();
    let mut report = RenderedReport::new(MissingPolicy::Flag);

    let summary = engine.run(&mut report).await.unwrap().expect("run");

    assert_eq!(
        report.text,
        "Symbol: BBB, Return: -0.1
Symbol: AAA, Return: N/A
Symbol: CCC, Return: N/A
"
    );
    assert_eq!(summary.compute.no_data, 2);
}

#[tokio::test]
async fn failed_batch_does_not_block_the_join() {
    let source = ScriptedSource {
        failing: HashSet::from([3]),
        ..ScriptedSource::default()
    };
    let mut engine = engine(10, 2, source, EngineSettings::default());

    let join = engine.fetch_all().await.unwrap().expect("joined");
    assert_eq!(engine.state(), EngineState::Joined);
    assert_eq!(join.batches, 5);
    assert_eq!(join.succeeded, 4);
    assert_eq!(join.failed, vec![3]);
    assert!(join.incomplete.is_empty());

    let compute = engine.compute_returns().unwrap();
    assert_eq!(engine.state(), EngineState::Computed);
    assert_eq!(compute.no_data, 2);
    assert_eq!(compute.priced, 8);

    let universe = engine.universe();
    for symbol in ["S006", "S007"] {
        let quote = universe.get(symbol).unwrap();
        assert_eq!(quote.day_return, DayReturn::NoData);
        assert_eq!((quote.open_price, quote.current_price), (0.0, 0.0));
    }
    assert!(matches!(
        engine.outcomes()[3].status,
        BatchStatus::Failed(ref cause) if cause.contains("service unavailable")
    ));

    let mut report = RenderedReport::new(MissingPolicy::Flag);
    engine.publish(&mut report).unwrap();
    let lines: Vec<&str> = report.text.lines().collect();
    assert_eq!(lines.len(), 10);
    assert_eq!(lines[8], "Symbol: S006, Return: N/A");
    assert_eq!(lines[9], "Symbol: S007, Return: N/A");
}

#[tokio::test]
async fn second_trigger_is_a_no_op() {
    let mut engine = engine(5, 2, ScriptedSource::default(), EngineSettings::default());
    let mut report = RenderedReport::new(MissingPolicy::Flag);

    assert!(engine.run(&mut report).await.unwrap().is_some());
    let first = report.text.clone();

    assert!(engine.run(&mut report).await.unwrap().is_none());
    assert!(engine.fetch_all().await.unwrap().is_none());
    assert_eq!(report.text, first);
    assert_eq!(engine.state(), EngineState::Reported);
}

#[tokio::test]
async fn stages_must_run_in_order() {
    let mut engine = engine(3, 2, ScriptedSource::default(), EngineSettings::default());

    let err = engine.compute_returns().expect_err("compute before fetch");
    assert!(matches!(
        err,
        AppError::InvalidTransition {
            from: EngineState::Idle,
            to: EngineState::Computed
        }
    ));

    engine.fetch_all().await.unwrap();
    let mut report = RenderedReport::default();
    let err = engine.publish(&mut report).expect_err("publish before compute");
    assert!(matches!(err, AppError::InvalidTransition { from: EngineState::Joined, .. }));
}

#[tokio::test]
async fn final_state_is_independent_of_completion_order() {
    let universe_size = 97;
    let expected: Vec<(String, f64, f64)> = symbols(universe_size)
        .iter()
        .map(|symbol| {
            let record = priced_record(symbol);
            (record.symbol, record.open, record.last)
        })
        .collect();

    for _ in 0..8 {
        let source = ScriptedSource {
            jitter_ms: Some(15),
            ..ScriptedSource::default()
        };
        let settings = EngineSettings {
            concurrency: 16,
            overall_timeout: None,
        };
        let mut engine = engine(universe_size, 5, source, settings);

        engine.fetch_all().await.unwrap();

        let actual: Vec<(String, f64, f64)> = engine
            .universe()
            .quotes()
            .iter()
            .map(|quote| (quote.symbol.clone(), quote.open_price, quote.current_price))
            .collect();
        assert_eq!(actual, expected);
    }
}

#[tokio::test]
async fn progress_counts_settled_batches() {
    let source = ScriptedSource {
        failing: HashSet::from([0]),
        ..ScriptedSource::default()
    };
    let mut engine = engine(24, 2, source, EngineSettings::default());
    let progress = engine.progress_handle();
    assert_eq!(progress.load(Ordering::SeqCst), 0);

    engine.fetch_all().await.unwrap();

    assert_eq!(progress.load(Ordering::SeqCst), 12);
    assert_eq!(engine.outcomes().len(), 12);
    assert!(engine.outcomes()[1..]
        .iter()
        .all(|outcome| matches!(outcome.status, BatchStatus::Merged(_))));
}

#[tokio::test]
async fn in_flight_requests_never_exceed_the_limit() {
    let source = ScriptedSource {
        delay: Some(Duration::from_millis(15)),
        ..ScriptedSource::default()
    };
    let universe = Universe::from_symbols(symbols(20));
    let batches = plan(&universe, 2);
    let settings = EngineSettings {
        concurrency: 3,
        overall_timeout: None,
    };

    let source = std::sync::Arc::new(source);
    let mut engine =
        AggregationEngine::new(universe, batches, SharedSource(source.clone()), settings).unwrap();
    engine.fetch_all().await.unwrap();

    assert_eq!(source.calls.load(Ordering::SeqCst), 10);
    let peak = source.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight requests was {peak}");
    assert!(peak >= 2, "requests did not overlap");
}

struct SharedSource(std::sync::Arc<ScriptedSource>);

#[async_trait]
impl QuoteSource for SharedSource {
    async fn fetch(&self, batch: &BatchDescriptor) -> FetchResult<Vec<RawQuoteRecord>> {
        self.0.fetch(batch).await
    }
}

#[tokio::test]
async fn overall_timeout_joins_with_partial_data() {
    let source = ScriptedSource {
        hanging: HashSet::from([1]),
        ..ScriptedSource::default()
    };
    let settings = EngineSettings {
        concurrency: 4,
        overall_timeout: Some(Duration::from_millis(200)),
    };
    let mut engine = engine(6, 2, source, settings);
    let mut report = RenderedReport::new(MissingPolicy::Omit);

    let summary = engine.run(&mut report).await.unwrap().expect("run");

    assert!(summary.join.timed_out);
    assert_eq!(summary.join.incomplete, vec![1]);
    assert_eq!(summary.join.succeeded, 2);
    assert_eq!(engine.outcomes()[1].status, BatchStatus::Incomplete);
    assert_eq!(summary.compute.no_data, 2);
    assert_eq!(summary.reported, 4);
    assert!(!report.text.contains("S002"));
    assert!(!report.text.contains("S003"));
    assert_eq!(engine.state(), EngineState::Reported);
}

#[tokio::test]
async fn records_for_other_batches_are_skipped() {
    let source = ScriptedSource {
        extra: HashMap::from([(
            0,
            vec![
                RawQuoteRecord::new("S003", 1.0, 1000.0),
                RawQuoteRecord::new("UNKNOWN", 1.0, 2.0),
            ],
        )]),
        ..ScriptedSource::default()
    };
    let mut engine = engine(4, 2, source, EngineSettings::default());

    let join = engine.fetch_all().await.unwrap().unwrap();

    assert_eq!(join.merged.applied, 4);
    assert_eq!(join.merged.skipped, 2);
    let quote = engine.universe().get("S003").unwrap();
    assert_eq!(quote.current_price, priced_record("S003").last);
}

#[tokio::test]
async fn empty_universe_produces_an_empty_report() {
    let mut engine = engine(0, 200, ScriptedSource::default(), EngineSettings::default());
    let mut report = RenderedReport::new(MissingPolicy::Flag);

    let summary = engine.run(&mut report).await.unwrap().expect("run");

    assert_eq!(summary.join.batches, 0);
    assert_eq!(summary.reported, 0);
    assert!(report.text.is_empty());
    assert_eq!(engine.state(), EngineState::Reported);
}

#[tokio::test]
async fn rejects_batches_from_another_plan() {
    let universe = Universe::from_symbols(symbols(4));
    let other = Universe::from_symbols(symbols(6));
    let batches = plan(&other, 2);

    let result = AggregationEngine::new(
        universe,
        batches,
        ScriptedSource::default(),
        EngineSettings::default(),
    );

    assert!(result.is_err());
}
