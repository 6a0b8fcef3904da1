use std::ops::Range;

use crate::config::RequestConfig;
use crate::engine::Universe;
use crate::error::Result;

use super::request::{prepare_request, PreparedRequest, RequestContext};

/// One group of symbols fetched by a single request. Immutable once planned.
#[derive(Debug, Clone)]
pub struct BatchDescriptor {
    pub group_index: usize,
    /// Position of the first symbol of this batch in the universe.
    pub offset: usize,
    pub symbols: Vec<String>,
    pub request: PreparedRequest,
}

impl BatchDescriptor {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.symbols.len()
    }
}

#[inline]
pub fn ensure_batch_size(batch_size: usize) -> usize {
    batch_size.max(1)
}

/// Number of requests needed for `total` symbols; the remainder gets its own batch.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    total.div_ceil(ensure_batch_size(batch_size))
}

/// Contiguous, non-overlapping ranges covering `0..total` in order.
pub fn partition_ranges(total: usize, batch_size: usize) -> Vec<Range<usize>> {
    let batch_size = ensure_batch_size(batch_size);
    (0..batch_count(total, batch_size))
        .map(|group| {
            let start = group * batch_size;
            start..(start + batch_size).min(total)
        })
        .collect()
}

/// Splits the universe into fixed-size groups and prepares one request per group.
#[derive(Debug, Clone, Copy)]
pub struct BatchPlanner {
    batch_size: usize,
}

impl BatchPlanner {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: ensure_batch_size(batch_size),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn plan(&self, universe: &Universe, request: &RequestConfig) -> Result<Vec<BatchDescriptor>> {
        self.plan_with(universe, |context| prepare_request(request, context))
    }

    pub fn plan_with<F>(&self, universe: &Universe, mut build: F) -> Result<Vec<BatchDescriptor>>
    where
        F: FnMut(RequestContext<'_>) -> Result<PreparedRequest>,
    {
        let quotes = universe.quotes();

        partition_ranges(quotes.len(), self.batch_size)
            .into_iter()
            .enumerate()
            .map(|(group_index, range)| {
                let offset = range.start;
                let symbols: Vec<String> = quotes[range]
                    .iter()
                    .map(|quote| quote.symbol.clone())
                    .collect();
                let request = build(RequestContext {
                    group_index,
                    symbols: &symbols,
                })?;
                Ok(BatchDescriptor {
                    group_index,
                    offset,
                    symbols,
                    request,
                })
            })
            .collect()
    }
}
