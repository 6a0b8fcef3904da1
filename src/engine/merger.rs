use log::debug;

use crate::fetch::RawQuoteRecord;
use crate::quote::Quote;

use super::universe::SymbolIndex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub applied: usize,
    pub skipped: usize,
}

impl MergeStats {
    pub fn absorb(&mut self, other: MergeStats) {
        self.applied += other.applied;
        self.skipped += other.skipped;
    }
}

/// The quotes one batch is allowed to write, starting at universe position `offset`.
pub struct BatchSlot<'a> {
    offset: usize,
    quotes: &'a mut [Quote],
}

impl<'a> BatchSlot<'a> {
    pub fn new(offset: usize, quotes: &'a mut [Quote]) -> Self {
        Self { offset, quotes }
    }

    fn get_mut(&mut self, position: usize) -> Option<&mut Quote> {
        let local = position.checked_sub(self.offset)?;
        self.quotes.get_mut(local)
    }
}

/// Applies decoded records to the quotes of the batch that requested them.
///
/// Each batch owns a disjoint slot, so merges from concurrently completing
/// batches never touch the same quote. Records whose symbol is unknown, or
/// belongs to another batch, are skipped.
#[derive(Debug, Clone, Copy)]
pub struct ResultMerger<'a> {
    index: &'a SymbolIndex,
}

impl<'a> ResultMerger<'a> {
    pub fn new(index: &'a SymbolIndex) -> Self {
        Self { index }
    }

    pub fn merge(&self, records: &[RawQuoteRecord], slot: &mut BatchSlot<'_>) -> MergeStats {
        let mut stats = MergeStats::default();

        for record in records {
            let target = self
                .index
                .get(&record.symbol)
                .and_then(|&position| slot.get_mut(position));

            match target {
                Some(quote) => {
                    quote.set_prices(record.open, record.last);
                    stats.applied += 1;
                }
                None => {
                    debug!("Skipping record for {} outside this group", record.symbol);
                    stats.skipped += 1;
                }
            }
        }

        stats
    }
}
