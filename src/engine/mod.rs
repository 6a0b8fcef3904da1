//! Fan-out of batch requests, the join barrier, and the return/rank pipeline.
//!
//! The engine walks `Idle -> Fetching -> Joined -> Computed -> Reported`.
//! Every batch request runs concurrently, capped by the configured
//! concurrency limit, and writes only into the region of the universe that
//! its batch owns. The join completes once every batch has settled, or when
//! the optional overall timeout expires.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::fetch::{ensure_concurrency_limit, BatchDescriptor, QuoteSource};
use crate::quote::{rank_quotes, DayReturn};
use crate::records::ReportSink;

pub mod merger;
pub mod universe;

pub use merger::{BatchSlot, MergeStats, ResultMerger};
pub use universe::{SymbolIndex, Universe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Fetching,
    Joined,
    Computed,
    Reported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub concurrency: usize,
    pub overall_timeout: Option<Duration>,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            concurrency: config.batch.concurrency,
            overall_timeout: config.timeouts.overall,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            concurrency: crate::config::DEFAULT_CONCURRENCY_LIMIT,
            overall_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    /// Still in flight when the overall timeout fired.
    Incomplete,
    Merged(MergeStats),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub group_index: usize,
    pub symbols: usize,
    pub status: BatchStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinSummary {
    pub batches: usize,
    pub succeeded: usize,
    pub failed: Vec<usize>,
    pub incomplete: Vec<usize>,
    pub merged: MergeStats,
    pub timed_out: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputeSummary {
    pub priced: usize,
    pub no_data: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub join: JoinSummary,
    pub compute: ComputeSummary,
    pub reported: usize,
}

pub struct AggregationEngine<S> {
    universe: Universe,
    batches: Vec<BatchDescriptor>,
    source: S,
    settings: EngineSettings,
    state: EngineState,
    progress: Arc<AtomicUsize>,
    outcomes: Vec<BatchOutcome>,
}

impl<S: QuoteSource> AggregationEngine<S> {
    /// `batches` must partition `universe` in order, as produced by `BatchPlanner`.
    pub fn new(
        universe: Universe,
        batches: Vec<BatchDescriptor>,
        source: S,
        settings: EngineSettings,
    ) -> Result<Self> {
        universe.check_batches(&batches)?;
        Ok(Self {
            universe,
            batches,
            source,
            settings: EngineSettings {
                concurrency: ensure_concurrency_limit(settings.concurrency),
                ..settings
            },
            state: EngineState::Idle,
            progress: Arc::new(AtomicUsize::new(0)),
            outcomes: Vec::new(),
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn batches(&self) -> &[BatchDescriptor] {
        &self.batches
    }

    pub fn outcomes(&self) -> &[BatchOutcome] {
        &self.outcomes
    }

    /// Count of settled batches, readable while a fetch is running.
    pub fn progress_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.progress)
    }

    /// Run every stage and hand the ranking to `sink`.
    ///
    /// Returns `None` when the engine was already triggered.
    pub async fn run<R>(&mut self, sink: &mut R) -> Result<Option<RunSummary>>
    where
        R: ReportSink + ?Sized,
    {
        let Some(join) = self.fetch_all().await? else {
            return Ok(None);
        };
        let compute = self.compute_returns()?;
        let reported = self.publish(sink)?;

        Ok(Some(RunSummary {
            join,
            compute,
            reported,
        }))
    }

    /// Fetch and merge every batch, then wait for all of them to settle.
    ///
    /// Only the first call does any work; later calls return `None`.
    pub async fn fetch_all(&mut self) -> Result<Option<JoinSummary>> {
        if self.state != EngineState::Idle {
            debug!("Fetch already triggered; engine is {:?}", self.state);
            return Ok(None);
        }
        self.state = EngineState::Fetching;

        let started = Instant::now();
        let total = self.batches.len();
        let concurrency = self.settings.concurrency;
        self.progress.store(0, Ordering::SeqCst);

        info!(
            "Fetching {} symbols in {} groups, at most {} in flight",
            self.universe.len(),
            total,
            concurrency
        );

        let mut statuses = vec![BatchStatus::Incomplete; total];

        let timed_out = {
            let source = &self.source;
            let progress = &self.progress;
            let (index, regions) = self.universe.split_for_batches(&self.batches)?;
            let merger = ResultMerger::new(index);

            let work = stream::iter(self.batches.iter().zip(regions).zip(statuses.iter_mut()))
                .map(|((batch, quotes), status)| async move {
                    let mut slot = BatchSlot::new(batch.offset, quotes);
                    *status = match source.fetch(batch).await {
                        Ok(records) => BatchStatus::Merged(merger.merge(&records, &mut slot)),
                        Err(err) => {
                            warn!("Group {} failed: {}", batch.group_index, err);
                            BatchStatus::Failed(err.to_string())
                        }
                    };

                    let done = progress.fetch_add(1, Ordering::SeqCst) + 1;
                    info!("Complete group: {}/{}", done, total);
                })
                .buffer_unordered(concurrency)
                .for_each(|()| future::ready(()));

            match self.settings.overall_timeout {
                Some(limit) => tokio::time::timeout(limit, work).await.is_err(),
                None => {
                    work.await;
                    false
                }
            }
        };

        let mut summary = JoinSummary {
            batches: total,
            timed_out,
            ..JoinSummary::default()
        };

        self.outcomes = self
            .batches
            .iter()
            .zip(statuses)
            .map(|(batch, status)| {
                match &status {
                    BatchStatus::Merged(stats) => {
                        summary.succeeded += 1;
                        summary.merged.absorb(*stats);
                    }
                    BatchStatus::Failed(_) => summary.failed.push(batch.group_index),
                    BatchStatus::Incomplete => summary.incomplete.push(batch.group_index),
                }
                BatchOutcome {
                    group_index: batch.group_index,
                    symbols: batch.len(),
                    status,
                }
            })
            .collect();

        if timed_out {
            warn!(
                "Stopped waiting after {:?}; groups never completed: {:?}",
                self.settings.overall_timeout.unwrap_or_default(),
                summary.incomplete
            );
        }

        summary.elapsed = started.elapsed();
        self.state = EngineState::Joined;
        info!(
            "Joined {} groups: {} ok, {} failed, {} incomplete",
            total,
            summary.succeeded,
            summary.failed.len(),
            summary.incomplete.len()
        );

        Ok(Some(summary))
    }

    /// Derive the day return of every quote. Zero open prices yield the sentinel.
    pub fn compute_returns(&mut self) -> Result<ComputeSummary> {
        self.expect_state(EngineState::Joined, EngineState::Computed)?;

        let mut summary = ComputeSummary::default();
        for quote in self.universe.quotes_mut() {
            match quote.compute_day_return() {
                DayReturn::Value(_) => summary.priced += 1,
                DayReturn::NoData => summary.no_data += 1,
            }
        }

        self.state = EngineState::Computed;
        info!(
            "Computed returns: {} priced, {} without data",
            summary.priced, summary.no_data
        );
        Ok(summary)
    }

    /// Rank by descending return and hand the ordered quotes to `sink`.
    pub fn publish<R>(&mut self, sink: &mut R) -> Result<usize>
    where
        R: ReportSink + ?Sized,
    {
        self.expect_state(EngineState::Computed, EngineState::Reported)?;

        let ranked = rank_quotes(self.universe.quotes());
        let lines = sink.publish(&ranked)?;

        self.state = EngineState::Reported;
        Ok(lines)
    }

    fn expect_state(&self, required: EngineState, next: EngineState) -> Result<()> {
        if self.state == required {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                from: self.state,
                to: next,
            })
        }
    }
}
