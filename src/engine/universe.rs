use std::collections::HashMap;

use log::warn;

use crate::error::{AppError, Result};
use crate::fetch::BatchDescriptor;
use crate::quote::Quote;

pub type SymbolIndex = HashMap<String, usize>;

/// Ordered quotes plus a symbol index for constant-time lookup during merges.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    quotes: Vec<Quote>,
    index: SymbolIndex,
}

impl Universe {
    /// Build the universe in input order. Repeated symbols keep their first position.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut universe = Universe::default();
        for symbol in symbols {
            let symbol = symbol.into();
            if universe.index.contains_key(&symbol) {
                warn!("Ignoring duplicate symbol {symbol}");
                continue;
            }
            let id = universe.quotes.len();
            universe.index.insert(symbol.clone(), id);
            universe.quotes.push(Quote::new(id, symbol));
        }
        universe
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    pub fn get(&self, symbol: &str) -> Option<&Quote> {
        self.index.get(symbol).map(|&position| &self.quotes[position])
    }

    pub fn position(&self, symbol: &str) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    pub(crate) fn quotes_mut(&mut self) -> &mut [Quote] {
        &mut self.quotes
    }

    #[cfg(test)]
    pub(crate) fn index_for_tests(&self) -> SymbolIndex {
        self.index.clone()
    }

    /// Check that `batches` cover the universe contiguously, in order, with matching symbols.
    pub fn check_batches(&self, batches: &[BatchDescriptor]) -> Result<()> {
        let mut consumed = 0;
        for batch in batches {
            if batch.offset != consumed {
                return Err(AppError::message(format!(
                    "group {} starts at {} but {} symbols were planned before it",
                    batch.group_index, batch.offset, consumed
                )));
            }

            let Some(owned) = self.quotes.get(batch.range()) else {
                return Err(AppError::message(format!(
                    "group {} extends past the end of the universe ({} symbols)",
                    batch.group_index,
                    self.quotes.len()
                )));
            };

            if let Some((quote, planned)) = owned
                .iter()
                .zip(&batch.symbols)
                .find(|(quote, planned)| quote.symbol != **planned)
            {
                return Err(AppError::message(format!(
                    "group {} planned {} where the universe holds {}",
                    batch.group_index, planned, quote.symbol
                )));
            }

            consumed += batch.len();
        }

        if consumed != self.quotes.len() {
            return Err(AppError::message(format!(
                "batches cover {} of {} symbols",
                consumed,
                self.quotes.len()
            )));
        }

        Ok(())
    }

    /// Hand out one disjoint mutable region per batch, plus the shared read-only index.
    pub(crate) fn split_for_batches(
        &mut self,
        batches: &[BatchDescriptor],
    ) -> Result<(&SymbolIndex, Vec<&mut [Quote]>)> {
        self.check_batches(batches)?;

        let mut rest: &mut [Quote] = &mut self.quotes;
        let mut regions = Vec::with_capacity(batches.len());
        for batch in batches {
            let (owned, tail) = std::mem::take(&mut rest).split_at_mut(batch.len());
            regions.push(owned);
            rest = tail;
        }

        Ok((&self.index, regions))
    }
}
