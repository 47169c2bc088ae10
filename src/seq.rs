// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the logmatch authors

//! Ordered sequence matcher: terms must match in order within a window.
//!
//! A small state machine: slots `0..n_active` are complete, slot `n_active`
//! is the one currently pursued, and the machine advances only when the
//! pursued slot's predicate matches a scanned entry. Completed slots keep
//! collecting matches too, so overlapping frames fire back-to-back instead of
//! losing progress to the first hit.
//!
//! Consecutive identical terms collapse into one slot with a duplicate count;
//! the slot must accumulate that many extra occurrences before the machine
//! moves on. Non-adjacent repeats intentionally stay separate slots — an
//! `A B A` pattern is three positions, not two.
//!
//! Matching does not enforce strict ordering across equal timestamps: two
//! entries on the same tick count as forward progress, which keeps patterns
//! usable on low-resolution clocks.
//!
//! The machine resets when the oldest captured entry ages out of the window;
//! like the set matcher this is driven lazily from `scan`, so a frame can
//! never span more than the window.

use tracing::warn;

use crate::common::entry::LogEntry;
use crate::common::hits::Hits;
use crate::common::mask::MAX_TERMS;
use crate::error::MatchError;
use crate::slot::{resync_active, TermSlot};
use crate::term::TermSpec;
use crate::Matcher;

/// Matcher for an ordered sequence of terms within a window.
#[derive(Debug)]
pub struct MatchSeq {
    clock: i64,
    window: i64,
    n_active: usize,
    slots: Vec<TermSlot>,
    dupe_map: Vec<usize>,
    extra_total: usize,
}

/// Collapses consecutive identical terms into counted slots.
pub(crate) fn build_seq_slots(
    terms: &[TermSpec],
) -> Result<(Vec<TermSlot>, Vec<usize>), MatchError> {
    if terms.is_empty() {
        return Err(MatchError::NoTerms);
    }
    // The limit applies before collapsing; dupes don't buy extra width.
    if terms.len() > MAX_TERMS {
        return Err(MatchError::TooManyTerms);
    }

    let mut slots: Vec<TermSlot> = Vec::new();
    let mut dupe_map: Vec<usize> = Vec::new();

    for (i, term) in terms.iter().enumerate() {
        if i > 0 && terms[i - 1] == *term {
            *dupe_map.last_mut().unwrap() += 1;
        } else {
            slots.push(TermSlot::new(term.compile()?));
            dupe_map.push(0);
        }
    }

    Ok((slots, dupe_map))
}

impl MatchSeq {
    /// Builds a sequence matcher over `terms` with the given window
    /// (nanoseconds).
    ///
    /// # Errors
    ///
    /// [`MatchError::NoTerms`], [`MatchError::TooManyTerms`], or term
    /// compilation errors.
    pub fn new(window: i64, terms: &[TermSpec]) -> Result<Self, MatchError> {
        let (slots, dupe_map) = build_seq_slots(terms)?;
        let extra_total = dupe_map.iter().sum();
        Ok(Self {
            clock: 0,
            window,
            n_active: 0,
            slots,
            dupe_map,
            extra_total,
        })
    }

    fn maybe_gc(&mut self, clock: i64) {
        let Some(first) = self.slots[0].first_clock() else {
            return;
        };
        if clock - first < self.window {
            return;
        }
        self.garbage_collect_inner(clock);
    }

    fn garbage_collect_inner(&mut self, clock: i64) {
        let deadline = clock - self.window;
        let stale = self.slots[0].stale_prefix(deadline);
        if stale > 0 {
            self.slots[0].shift_left(stale);
        }
        self.mini_gc();
    }

    fn mini_gc(&mut self) {
        self.n_active = resync_active(&mut self.slots, &self.dupe_map, self.n_active, 0);
    }

    fn fire(&mut self, entry: LogEntry) -> Hits {
        let n = self.slots.len();
        let mut hits = Hits {
            count: 1,
            logs: Vec::with_capacity(n + self.extra_total),
            props: None,
        };

        // Emit each completed slot's required asserts but drop only the
        // first, leaving remaining dupes for an overlapping next frame.
        for i in 0..n - 1 {
            let take = 1 + self.dupe_map[i];
            hits.logs.extend_from_slice(&self.slots[i].asserts[..take]);
            self.slots[i].shift_left(1);
        }

        let last = n - 1;
        hits.logs
            .extend_from_slice(&self.slots[last].asserts[..self.dupe_map[last]]);
        hits.logs.push(entry);
        self.slots[last].shift_left(1);

        // The triggering entry completed the frame; resync over all slots.
        self.n_active = n;
        self.mini_gc();

        hits
    }
}

impl Matcher for MatchSeq {
    fn scan(&mut self, entry: LogEntry) -> Hits {
        if entry.timestamp < self.clock {
            warn!(
                line = %entry.line,
                stamp = entry.timestamp,
                clock = self.clock,
                "MatchSeq: out of order event"
            );
            return Hits::default();
        }
        self.clock = entry.timestamp;

        self.maybe_gc(entry.timestamp);

        // Completed slots keep collecting for overlapping frames.
        for i in 0..self.n_active {
            if self.slots[i].predicate.matches(&entry.line) {
                self.slots[i].asserts.push(entry.clone());
            }
        }

        let cur = self.n_active;
        if !self.slots[cur].predicate.matches(&entry.line) {
            return Hits::default();
        }

        if self.slots[cur].asserts.len() < self.dupe_map[cur] {
            // Still accumulating this slot's duplicate run.
            self.slots[cur].asserts.push(entry);
            return Hits::default();
        }

        if cur + 1 < self.slots.len() {
            self.slots[cur].asserts.push(entry);
            self.n_active += 1;
            return Hits::default();
        }

        self.fire(entry)
    }

    fn eval(&mut self, _clock: i64) -> Hits {
        // Edge-triggered: time alone can never complete a sequence.
        Hits::default()
    }

    fn garbage_collect(&mut self, clock: i64) {
        if self.slots[0].asserts.is_empty() {
            return;
        }
        self.garbage_collect_inner(clock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(window: i64, terms: &[&str]) -> MatchSeq {
        let specs: Vec<TermSpec> = terms.iter().copied().map(TermSpec::raw).collect();
        MatchSeq::new(window, &specs).unwrap()
    }

    fn stamps(hits: &Hits) -> Vec<i64> {
        hits.logs.iter().map(|e| e.timestamp).collect()
    }

    fn lines(hits: &Hits) -> Vec<&str> {
        hits.logs.iter().map(|e| e.line.as_str()).collect()
    }

    #[test]
    fn test_simple() {
        let mut m = seq(10, &["alpha", "beta"]);
        assert!(m.scan(LogEntry::new(1, "noop")).is_empty());
        assert!(m.scan(LogEntry::new(2, "beta")).is_empty());
        assert!(m.scan(LogEntry::new(3, "alpha")).is_empty());
        let hits = m.scan(LogEntry::new(4, "beta"));
        assert_eq!(stamps(&hits), vec![3, 4]);
    }

    #[test]
    fn test_over_fire_suppression() {
        let mut m = seq(10, &["alpha", "beta"]);
        m.scan(LogEntry::new(1, "alpha"));
        m.scan(LogEntry::new(2, "alpha"));
        m.scan(LogEntry::new(3, "alpha"));
        let hits = m.scan(LogEntry::new(4, "beta"));
        assert_eq!(hits.count, 1);
        assert_eq!(stamps(&hits), vec![1, 4]);
    }

    #[test]
    fn test_overlap() {
        let mut m = seq(20, &["alpha", "beta", "gamma"]);
        m.scan(LogEntry::new(1, "alpha"));
        m.scan(LogEntry::new(2, "alpha"));
        m.scan(LogEntry::new(3, "beta"));
        m.scan(LogEntry::new(4, "alpha"));
        assert_eq!(stamps(&m.scan(LogEntry::new(5, "gamma"))), vec![1, 3, 5]);
        m.scan(LogEntry::new(6, "beta"));
        m.scan(LogEntry::new(7, "alpha"));
        assert_eq!(stamps(&m.scan(LogEntry::new(8, "gamma"))), vec![2, 6, 8]);
        m.scan(LogEntry::new(9, "beta"));
        m.scan(LogEntry::new(10, "noop"));
        m.scan(LogEntry::new(11, "noop"));
        m.scan(LogEntry::new(12, "noop"));
        assert_eq!(stamps(&m.scan(LogEntry::new(13, "gamma"))), vec![4, 9, 13]);

        // GC up to the surviving alpha@7 + window leaves it in place.
        m.garbage_collect(7 + 20);
        assert_eq!(m.n_active, 1);
        m.garbage_collect(7 + 20 + 1);
        assert_eq!(m.n_active, 0);
    }

    #[test]
    fn test_window_expires_partial_frame() {
        let mut m = seq(10, &["alpha", "beta"]);
        m.scan(LogEntry::new(1, "alpha"));
        assert!(m.scan(LogEntry::new(12, "beta")).is_empty());
        assert_eq!(m.n_active, 0);
    }

    #[test]
    fn test_window_boundary_is_closed() {
        let mut m = seq(10, &["alpha", "beta"]);
        m.scan(LogEntry::new(1, "alpha"));
        // Exactly window apart still fires.
        assert_eq!(stamps(&m.scan(LogEntry::new(11, "beta"))), vec![1, 11]);
    }

    #[test]
    fn test_out_of_order_dropped() {
        let mut m = seq(10, &["alpha", "gamma"]);
        m.scan(LogEntry::new(2, "alpha"));
        assert!(m.scan(LogEntry::new(1, "gamma")).is_empty());
        assert_eq!(m.n_active, 1);
    }

    #[test]
    fn test_equal_timestamps_advance() {
        let mut m = seq(10, &["alpha", "beta", "gamma"]);
        m.scan(LogEntry::new(1, "alpha1"));
        m.scan(LogEntry::new(1, "beta1"));
        let hits = m.scan(LogEntry::new(1, "gamma1"));
        assert_eq!(lines(&hits), vec!["alpha1", "beta1", "gamma1"]);
    }

    #[test]
    fn test_gc_old_terms() {
        let mut m = seq(50, &["alpha", "beta", "gamma"]);
        m.scan(LogEntry::new(1, "alpha"));
        m.scan(LogEntry::new(2, "beta"));
        m.scan(LogEntry::new(3, "beta"));
        m.scan(LogEntry::new(4, "alpha"));
        assert_eq!(stamps(&m.scan(LogEntry::new(5, "gamma"))), vec![1, 2, 5]);
        m.scan(LogEntry::new(6, "gamma"));
        m.scan(LogEntry::new(7, "gamma"));
        m.scan(LogEntry::new(8, "beta"));
        m.scan(LogEntry::new(9, "beta"));
        m.scan(LogEntry::new(10, "alpha"));
        m.scan(LogEntry::new(11, "beta"));
        assert_eq!(stamps(&m.scan(LogEntry::new(12, "gamma"))), vec![4, 8, 12]);
        m.garbage_collect(12 + 50);
        assert_eq!(m.n_active, 0);
    }

    #[test]
    fn test_adjacent_dupes_overlap() {
        let mut m = seq(
            10,
            &[
                "Discarding message",
                "Discarding message",
                "Discarding message",
                "Mnesia overloaded",
            ],
        );
        m.scan(LogEntry::new(1, "Discarding message"));
        assert!(m.scan(LogEntry::new(2, "Mnesia overloaded")).is_empty());
        m.scan(LogEntry::new(3, "Discarding message"));
        m.scan(LogEntry::new(4, "Discarding message"));
        m.scan(LogEntry::new(5, "Discarding message"));
        m.scan(LogEntry::new(6, "Discarding message"));
        let hits = m.scan(LogEntry::new(7, "Mnesia overloaded"));
        assert_eq!(stamps(&hits), vec![1, 3, 4, 7]);
        let hits = m.scan(LogEntry::new(8, "Mnesia overloaded"));
        assert_eq!(stamps(&hits), vec![3, 4, 5, 8]);
        // Past the last dupe's window nothing is left to fire.
        assert!(m.scan(LogEntry::new(6 + 10 + 1, "Mnesia overloaded")).is_empty());
    }

    #[test]
    fn test_dupes_window_miss() {
        let mut m = seq(4, &["dupe", "dupe", "dupe", "fire"]);
        for ts in 1..=5 {
            m.scan(LogEntry::new(ts, "dupe"));
        }
        assert!(m.scan(LogEntry::new(8, "fire")).is_empty());
    }

    #[test]
    fn test_dupes_window_hit_takes_newest_run() {
        let mut m = seq(3, &["dupe", "dupe", "dupe", "fire"]);
        for ts in 1..=7 {
            m.scan(LogEntry::new(ts, format!("dupe{ts}")));
        }
        let hits = m.scan(LogEntry::new(8, "fire"));
        assert_eq!(lines(&hits), vec!["dupe5", "dupe6", "dupe7", "fire"]);
    }

    #[test]
    fn test_dupes_same_timestamp_overlapping_fires() {
        let mut m = seq(3, &["dupe", "dupe", "dupe", "fire"]);
        for i in 1..=7 {
            m.scan(LogEntry::new(1, format!("dupe{i}")));
        }
        let hits = m.scan(LogEntry::new(1, "fire1"));
        assert_eq!(lines(&hits), vec!["dupe1", "dupe2", "dupe3", "fire1"]);
        let hits = m.scan(LogEntry::new(2, "fire2"));
        assert_eq!(lines(&hits), vec!["dupe2", "dupe3", "dupe4", "fire2"]);
    }

    #[test]
    fn test_disjoint_dupe_runs() {
        let mut m = seq(5, &["dupe", "dupe", "disjoint", "dupe", "dupe", "fire"]);
        m.scan(LogEntry::new(1, "1_dupe"));
        m.scan(LogEntry::new(2, "2_dupe"));
        m.scan(LogEntry::new(3, "3_disjoint"));
        m.scan(LogEntry::new(4, "4_dupe"));
        m.scan(LogEntry::new(5, "5_dupe"));
        m.scan(LogEntry::new(6, "6_dupe"));
        m.scan(LogEntry::new(7, "7_disjoint"));
        m.scan(LogEntry::new(8, "8_dupe"));
        m.scan(LogEntry::new(9, "9_dupe"));
        let hits = m.scan(LogEntry::new(10, "A_fire"));
        assert_eq!(
            lines(&hits),
            vec!["5_dupe", "6_dupe", "7_disjoint", "8_dupe", "9_dupe", "A_fire"]
        );
    }

    #[test]
    fn test_distinct_dupe_pairs_window_miss() {
        let mut m = seq(4, &["alpha", "alpha", "beta", "beta", "fire"]);
        for ts in 1..=4 {
            m.scan(LogEntry::new(ts, "alpha"));
        }
        m.scan(LogEntry::new(5, "beta"));
        m.scan(LogEntry::new(6, "beta"));
        assert!(m.scan(LogEntry::new(8, "fire")).is_empty());
    }

    #[test]
    fn test_distinct_dupe_pairs_window_hit() {
        let mut m = seq(5, &["alpha", "alpha", "beta", "beta", "fire"]);
        for ts in 1..=5 {
            m.scan(LogEntry::new(ts, format!("{ts}_alpha")));
        }
        m.scan(LogEntry::new(6, "6_beta"));
        m.scan(LogEntry::new(7, "7_beta"));
        m.scan(LogEntry::new(8, "8_beta"));
        let hits = m.scan(LogEntry::new(8, "8_fire"));
        assert_eq!(
            lines(&hits),
            vec!["3_alpha", "4_alpha", "6_beta", "7_beta", "8_fire"]
        );
    }

    #[test]
    fn test_eval_is_noop() {
        let mut m = seq(10, &["alpha", "beta"]);
        m.scan(LogEntry::new(1, "alpha"));
        assert!(m.eval(12345).is_empty());
        assert_eq!(m.n_active, 1);
    }

    #[test]
    fn test_init_errors() {
        assert_eq!(MatchSeq::new(10, &[]).unwrap_err(), MatchError::NoTerms);

        let too_many: Vec<TermSpec> = (0..65).map(|i| TermSpec::raw(format!("t{i}"))).collect();
        assert_eq!(
            MatchSeq::new(10, &too_many).unwrap_err(),
            MatchError::TooManyTerms
        );

        // Unlike sets, collapsing does not raise the sequence limit.
        let dupes: Vec<TermSpec> = (0..128).map(|_| TermSpec::raw("same")).collect();
        assert_eq!(
            MatchSeq::new(10, &dupes).unwrap_err(),
            MatchError::TooManyTerms
        );

        assert_eq!(
            MatchSeq::new(10, &[TermSpec::raw("")]).unwrap_err(),
            MatchError::TermEmpty
        );
    }
}
