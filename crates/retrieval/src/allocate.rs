//! Gradient chunk allocation.
//!
//! Entities and relations arrive sorted by importance, each with its own
//! chunk ids sorted by relevance. The top source is offered `max_top`
//! chunks, the bottom one `min_bottom`, and the sources in between a
//! linearly interpolated share. Whatever a source cannot fill is handed out
//! again, one chunk at a time, to the highest-ranked sources that still have
//! unused chunks.

use ragloom_core::RankedSource;
use std::collections::HashSet;
use tracing::debug;

/// Per-rank chunk targets for `n` sources, interpolated from `max_top` down
/// to `min_bottom` and rounded half to even.
pub fn gradient_targets(n: usize, max_top: usize, min_bottom: usize) -> Vec<usize> {
    match n {
        0 => Vec::new(),
        1 => vec![max_top],
        _ => {
            let top = max_top as f64;
            let span = top - min_bottom as f64;
            let last = (n - 1) as f64;
            (0..n)
                .map(|i| {
                    let expected = top - (i as f64 / last) * span;
                    expected.round_ties_even().max(0.0) as usize
                })
                .collect()
        }
    }
}

/// Walks each source's chunk list, skipping ids already handed out.
struct Cursors<'a> {
    sources: &'a [RankedSource],
    positions: Vec<usize>,
    seen: HashSet<&'a str>,
    picked: Vec<Vec<&'a str>>,
}

impl<'a> Cursors<'a> {
    fn new(sources: &'a [RankedSource]) -> Self {
        Self {
            sources,
            positions: vec![0; sources.len()],
            seen: HashSet::new(),
            picked: vec![Vec::new(); sources.len()],
        }
    }

    /// Give source `rank` its next unused chunk, if it has one left.
    fn take_next(&mut self, rank: usize) -> bool {
        let sources = self.sources;
        let chunks = &sources[rank].sorted_chunks;
        while let Some(id) = chunks.get(self.positions[rank]) {
            self.positions[rank] += 1;
            if self.seen.insert(id.as_str()) {
                self.picked[rank].push(id.as_str());
                return true;
            }
        }
        false
    }

    /// Up to `count` chunks for source `rank`; returns how many it got.
    fn take(&mut self, rank: usize, count: usize) -> usize {
        (0..count).take_while(|_| self.take_next(rank)).count()
    }

    fn into_ids(self) -> Vec<String> {
        self.picked
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect()
    }
}

/// Select chunk ids across `sources`, favouring the more important ones.
///
/// Output is grouped by source in rank order, each group in the source's own
/// chunk order. No id appears twice: a chunk already chosen for a
/// higher-ranked source is skipped.
pub fn allocate_gradient(sources: &[RankedSource], max_top: usize, min_bottom: usize) -> Vec<String> {
    let mut cursors = Cursors::new(sources);
    if sources.len() == 1 {
        cursors.take(0, max_top);
        return cursors.into_ids();
    }

    let targets = gradient_targets(sources.len(), max_top, min_bottom);
    let mut remaining = 0usize;
    for (rank, &target) in targets.iter().enumerate() {
        let taken = cursors.take(rank, target);
        remaining += target - taken;
    }

    let mut redistributed = 0usize;
    for _ in 0..remaining {
        let granted = (0..sources.len()).any(|rank| cursors.take_next(rank));
        if !granted {
            break;
        }
        redistributed += 1;
    }

    if remaining > 0 {
        debug!(
            sources = sources.len(),
            shortfall = remaining,
            redistributed,
            "Redistributed unfilled chunk quota"
        );
    }
    cursors.into_ids()
}
