// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the logmatch authors

//! Unordered set matcher: all terms within a sliding window.
//!
//! Duplicate terms are collapsed at construction into counted slots: the
//! distinct terms define the slots, and `dupe_map[i]` records how many extra
//! occurrences slot `i` needs beyond the first. A slot is *hot* once it holds
//! enough asserts; the matcher fires the moment every slot is hot, emitting
//! the oldest required asserts from each slot and keeping any surplus for
//! overlapping hits.
//!
//! The matcher is edge-triggered: state only changes on `scan`. Window
//! enforcement rides on lazy garbage collection — `gc_mark` tracks the oldest
//! buffered assert, and any scan that lands more than a window past it prunes
//! before matching, so a fire can never span more than the window.

use tracing::warn;

use crate::common::entry::LogEntry;
use crate::common::hits::Hits;
use crate::common::mask::{SlotMask, MAX_TERMS};
use crate::error::MatchError;
use crate::slot::{TermSlot, GC_DISABLED};
use crate::term::TermSpec;
use crate::Matcher;

/// Matcher for an unordered set of terms within a window.
#[derive(Debug)]
pub struct MatchSet {
    clock: i64,
    window: i64,
    gc_mark: i64,
    slots: Vec<TermSlot>,
    dupe_map: Vec<usize>,
    hot: SlotMask,
}

/// Collapses a term list into distinct slots plus per-slot extra counts.
pub(crate) fn build_set_slots(
    terms: &[TermSpec],
) -> Result<(Vec<TermSlot>, Vec<usize>), MatchError> {
    if terms.is_empty() {
        return Err(MatchError::NoTerms);
    }

    let mut slots: Vec<TermSlot> = Vec::with_capacity(terms.len());
    let mut dupe_map: Vec<usize> = Vec::with_capacity(terms.len());
    let mut uniq: std::collections::HashMap<&TermSpec, usize> =
        std::collections::HashMap::with_capacity(terms.len());

    for term in terms {
        if let Some(&idx) = uniq.get(term) {
            dupe_map[idx] += 1;
        } else {
            uniq.insert(term, slots.len());
            slots.push(TermSlot::new(term.compile()?));
            dupe_map.push(0);
        }
    }

    // The limit applies after collapsing: 64 distinct terms.
    if slots.len() > MAX_TERMS {
        return Err(MatchError::TooManyTerms);
    }

    Ok((slots, dupe_map))
}

impl MatchSet {
    /// Builds a set matcher over `terms` with the given window (nanoseconds).
    ///
    /// # Errors
    ///
    /// [`MatchError::NoTerms`], [`MatchError::TooManyTerms`], or term
    /// compilation errors.
    pub fn new(window: i64, terms: &[TermSpec]) -> Result<Self, MatchError> {
        let (slots, dupe_map) = build_set_slots(terms)?;
        Ok(Self {
            clock: 0,
            window,
            gc_mark: GC_DISABLED,
            slots,
            dupe_map,
            hot: SlotMask::empty(),
        })
    }

    fn maybe_gc(&mut self, clock: i64) {
        if self.gc_mark == GC_DISABLED || clock - self.gc_mark <= self.window {
            return;
        }
        self.garbage_collect_inner(clock);
    }

    fn garbage_collect_inner(&mut self, clock: i64) {
        let deadline = clock - self.window;
        self.gc_mark = GC_DISABLED;

        for i in 0..self.slots.len() {
            let stale = self.slots[i].stale_prefix(deadline);
            if stale > 0 {
                self.slots[i].shift_left(stale);
            }

            if self.slots[i].satisfied(self.dupe_map[i]) {
                self.hot.set(i);
            } else {
                self.hot.clear(i);
            }
            if let Some(first) = self.slots[i].first_clock() {
                self.gc_mark = self.gc_mark.min(first);
            }
        }
    }

    fn fire(&mut self) -> Hits {
        let mut hits = Hits {
            count: 1,
            logs: Vec::with_capacity(self.slots.len() + self.dupe_map.iter().sum::<usize>()),
            props: None,
        };

        self.gc_mark = GC_DISABLED;
        for i in 0..self.slots.len() {
            let take = 1 + self.dupe_map[i];
            hits.logs.extend_from_slice(&self.slots[i].asserts[..take]);
            self.slots[i].shift_left(take);

            if !self.slots[i].satisfied(self.dupe_map[i]) {
                self.hot.clear(i);
            }
            if let Some(first) = self.slots[i].first_clock() {
                self.gc_mark = self.gc_mark.min(first);
            }
        }

        hits
    }
}

impl Matcher for MatchSet {
    fn scan(&mut self, entry: LogEntry) -> Hits {
        if entry.timestamp < self.clock {
            warn!(
                line = %entry.line,
                stamp = entry.timestamp,
                clock = self.clock,
                "MatchSet: out of order event"
            );
            return Hits::default();
        }
        self.clock = entry.timestamp;

        self.maybe_gc(entry.timestamp);

        // A set cannot short-circuit like a sequence; every slot scans.
        for i in 0..self.slots.len() {
            if self.slots[i].predicate.matches(&entry.line) {
                self.slots[i].asserts.push(entry.clone());
                if self.slots[i].satisfied(self.dupe_map[i]) {
                    self.hot.set(i);
                }
                if entry.timestamp < self.gc_mark {
                    self.gc_mark = entry.timestamp;
                }
            }
        }

        if !self.hot.first_n(self.slots.len()) {
            return Hits::default();
        }

        self.fire()
    }

    fn eval(&mut self, _clock: i64) -> Hits {
        // Edge-triggered: time alone can never complete a set.
        Hits::default()
    }

    fn garbage_collect(&mut self, clock: i64) {
        self.garbage_collect_inner(clock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(window: i64, terms: &[&str]) -> MatchSet {
        let specs: Vec<TermSpec> = terms.iter().copied().map(TermSpec::raw).collect();
        MatchSet::new(window, &specs).unwrap()
    }

    fn stamps(hits: &Hits) -> Vec<i64> {
        hits.logs.iter().map(|e| e.timestamp).collect()
    }

    #[test]
    fn test_ordering_agnostic() {
        let mut m = set(50, &["alpha", "beta", "gamma"]);
        assert!(m.scan(LogEntry::new(1, "alpha")).is_empty());
        assert!(m.scan(LogEntry::new(2, "gamma")).is_empty());
        let hits = m.scan(LogEntry::new(3, "beta"));
        assert_eq!(hits.count, 1);
        // Slot order: alpha, beta, gamma.
        assert_eq!(stamps(&hits), vec![1, 3, 2]);
    }

    #[test]
    fn test_overlap_keeps_surplus_asserts() {
        let mut m = set(50, &["alpha", "beta", "gamma"]);
        m.scan(LogEntry::new(1, "alpha"));
        m.scan(LogEntry::new(2, "gamma"));
        assert_eq!(stamps(&m.scan(LogEntry::new(3, "beta"))), vec![1, 3, 2]);
        m.scan(LogEntry::new(4, "gamma"));
        m.scan(LogEntry::new(5, "alpha"));
        m.scan(LogEntry::new(6, "gamma"));
        let hits = m.scan(LogEntry::new(7, "beta"));
        assert_eq!(stamps(&hits), vec![5, 7, 4]);
        // Gamma kept its surplus assert and stays hot.
        assert_eq!(m.hot.bits(), 0b100);
        assert!(m.scan(LogEntry::new(8, "beta")).is_empty());
        assert_eq!(m.hot.bits(), 0b110);
    }

    #[test]
    fn test_window_prunes_before_fire() {
        let mut m = set(5, &["alpha", "beta", "gamma"]);
        m.scan(LogEntry::new(1, "alpha"));
        m.scan(LogEntry::new(4, "gamma"));
        m.scan(LogEntry::new(7, "beta"));
        // alpha@1 aged out before beta@7 landed; a fresh alpha completes.
        let hits = m.scan(LogEntry::new(8, "alpha"));
        assert_eq!(stamps(&hits), vec![8, 7, 4]);
        m.scan(LogEntry::new(9, "gamma"));
        assert_eq!(m.hot.bits(), 0b100);
    }

    #[test]
    fn test_equal_timestamps_tolerated() {
        let mut m = set(5, &["alpha", "beta", "gamma"]);
        m.scan(LogEntry::new(1, "alpha"));
        m.scan(LogEntry::new(1, "gamma"));
        let hits = m.scan(LogEntry::new(1, "beta"));
        assert_eq!(stamps(&hits), vec![1, 1, 1]);
    }

    #[test]
    fn test_out_of_order_dropped() {
        let mut m = set(10, &["alpha", "beta"]);
        m.scan(LogEntry::new(2, "alpha"));
        assert!(m.scan(LogEntry::new(1, "beta")).is_empty());
        // The stale beta was not buffered.
        assert!(m.slots[1].asserts.is_empty());
    }

    #[test]
    fn test_simple_dupes() {
        let mut m = set(5, &["alpha", "alpha"]);
        assert!(m.scan(LogEntry::new(1, "alpha")).is_empty());
        let hits = m.scan(LogEntry::new(2, "alpha"));
        assert_eq!(stamps(&hits), vec![1, 2]);
    }

    #[test]
    fn test_dupes_same_timestamp() {
        let mut m = set(5, &["alpha", "alpha"]);
        m.scan(LogEntry::new(1, "alpha"));
        assert_eq!(stamps(&m.scan(LogEntry::new(1, "alpha"))), vec![1, 1]);
    }

    #[test]
    fn test_dupes_with_other_terms() {
        let mut m = set(5, &["alpha", "alpha", "beta"]);
        m.scan(LogEntry::new(1, "alpha"));
        m.scan(LogEntry::new(2, "beta"));
        let hits = m.scan(LogEntry::new(3, "alpha"));
        assert_eq!(stamps(&hits), vec![1, 3, 2]);
    }

    #[test]
    fn test_dupes_consume_oldest_first() {
        let mut m = set(5, &["alpha", "alpha", "beta"]);
        m.scan(LogEntry::new(1, "alpha"));
        m.scan(LogEntry::new(2, "alpha"));
        m.scan(LogEntry::new(3, "alpha"));
        let hits = m.scan(LogEntry::new(4, "beta"));
        assert_eq!(stamps(&hits), vec![1, 2, 4]);
        // Third alpha is surplus but not enough for the dupe requirement.
        assert!(!m.hot.is_set(0));
    }

    #[test]
    fn test_triple_dupe_with_other_terms() {
        let mut m = set(5, &["alpha", "alpha", "alpha", "beta"]);
        m.scan(LogEntry::new(1, "alpha"));
        m.scan(LogEntry::new(2, "beta"));
        m.scan(LogEntry::new(3, "alpha"));
        let hits = m.scan(LogEntry::new(4, "alpha"));
        assert_eq!(stamps(&hits), vec![1, 3, 4, 2]);
    }

    #[test]
    fn test_dupes_obey_window() {
        let mut m = set(5, &["alpha", "alpha", "beta"]);
        m.scan(LogEntry::new(1, "alpha"));
        m.scan(LogEntry::new(2, "beta"));
        m.scan(LogEntry::new(7, "alpha"));
        m.scan(LogEntry::new(8, "alpha"));
        let hits = m.scan(LogEntry::new(11, "beta"));
        assert_eq!(stamps(&hits), vec![7, 8, 11]);

        m.scan(LogEntry::new(12, "beta"));
        assert_eq!(m.hot.bits(), 0b10);
        m.scan(LogEntry::new(13, "alpha"));
        assert_eq!(m.hot.bits(), 0b10);
        m.scan(LogEntry::new(14, "beta"));
        m.scan(LogEntry::new(19, "alpha"));
        let hits = m.scan(LogEntry::new(19, "alpha"));
        assert_eq!(stamps(&hits), vec![19, 19, 14]);
        m.scan(LogEntry::new(20, "nope"));
        assert!(m.hot.is_empty());
    }

    #[test]
    fn test_forced_gc() {
        let mut m = set(50, &["alpha", "beta", "gamma"]);
        m.scan(LogEntry::new(11, "beta"));
        m.scan(LogEntry::new(12, "gamma"));
        m.garbage_collect(50);
        assert_eq!(m.hot.bits(), 0b110);
        m.garbage_collect(73);
        assert!(m.hot.is_empty());
        assert_eq!(m.gc_mark, GC_DISABLED);
    }

    #[test]
    fn test_eval_is_noop() {
        let mut m = set(10, &["alpha", "beta"]);
        m.scan(LogEntry::new(1, "alpha"));
        assert!(m.eval(12345).is_empty());
        // Eval never advances the clock for a set.
        assert_eq!(m.clock, 1);
    }

    #[test]
    fn test_no_terms() {
        assert_eq!(
            MatchSet::new(10, &[]).unwrap_err(),
            MatchError::NoTerms
        );
    }

    #[test]
    fn test_too_many_terms_after_collapse() {
        let distinct: Vec<TermSpec> = (0..65).map(|i| TermSpec::raw(format!("t{i}"))).collect();
        assert_eq!(
            MatchSet::new(10, &distinct).unwrap_err(),
            MatchError::TooManyTerms
        );

        // 128 terms collapsing to 64 distinct slots is fine.
        let dupes: Vec<TermSpec> = (0..128).map(|i| TermSpec::raw(format!("t{}", i % 64))).collect();
        assert!(MatchSet::new(10, &dupes).is_ok());
    }

    #[test]
    fn test_empty_term_rejected() {
        let err = MatchSet::new(10, &[TermSpec::raw("")]).unwrap_err();
        assert_eq!(err, MatchError::TermEmpty);
    }
}
