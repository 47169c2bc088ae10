// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the logmatch authors

//! Inverse set matcher: an unordered set guarded by reset terms.
//!
//! Extends [`MatchSet`](crate::MatchSet) semantics with reset windows. Every
//! scan also records reset-term observations, and a completed set is not
//! fired until every reset interval around it can be judged:
//!
//! 1. If the candidate frame spans more than the window, the oldest consumed
//!    assert is dropped and the check restarts.
//! 2. If a reset was observed inside its closed interval, the assert the
//!    interval anchors on is dropped and the check restarts.
//! 3. If any interval reaches past the current clock, the verdict is still
//!    open: the frame is left intact and re-evaluated on a later scan or an
//!    explicit [`Matcher::eval`]. This is the deferred-fire path.
//!
//! Anchors are the frame's consumed asserts sorted by time, so `anchor: 1`
//! pins a reset window on the second-oldest entry regardless of which slot
//! captured it. Duplicate terms are fine with the default anchor, but a
//! non-zero anchor cannot be combined with them: dupe occurrences are
//! interchangeable in a set, and construction rejects the combination with
//! [`MatchError::AnchorNoDupes`].
//!
//! Garbage collection is scheduled through `gc_mark` (the next clock at which
//! pruning could produce work) and retains asserts for `gc_right` and reset
//! observations for `gc_right + gc_left` behind the clock. While a full frame
//! is waiting on resets, GC defers entirely rather than risk pruning a
//! single-occurrence slot out from under the pending verdict.

use tracing::warn;

use crate::common::entry::LogEntry;
use crate::common::hits::Hits;
use crate::common::mask::SlotMask;
use crate::error::MatchError;
use crate::reset::{calc_gc_window, ResetSlot, ResetSpec};
use crate::set::build_set_slots;
use crate::slot::{Anchor, TermSlot, GC_DISABLED};
use crate::term::TermSpec;
use crate::Matcher;

/// Matcher for an unordered set with reset (inverse) terms.
#[derive(Debug)]
pub struct InverseSet {
    clock: i64,
    window: i64,
    gc_mark: i64,
    gc_left: i64,
    gc_right: i64,
    slots: Vec<TermSlot>,
    dupe_map: Vec<usize>,
    hot: SlotMask,
    resets: Vec<ResetSlot>,
}

impl InverseSet {
    /// Builds an inverse set matcher.
    ///
    /// # Errors
    ///
    /// Set construction errors plus [`MatchError::AnchorRange`] for anchors
    /// past the pattern's anchor list and [`MatchError::AnchorNoDupes`] for
    /// non-zero anchors combined with duplicate terms.
    pub fn new(
        window: i64,
        terms: &[TermSpec],
        reset_specs: &[ResetSpec],
    ) -> Result<Self, MatchError> {
        let (slots, dupe_map) = build_set_slots(terms)?;
        let has_dupes = dupe_map.iter().any(|&d| d > 0);

        let mut resets = Vec::with_capacity(reset_specs.len());
        for spec in reset_specs {
            let reset = ResetSlot::compile(spec, terms.len())?;
            if reset.anchor != 0 && has_dupes {
                return Err(MatchError::AnchorNoDupes);
            }
            resets.push(reset);
        }

        let (gc_left, gc_right) = calc_gc_window(window, &resets);

        Ok(Self {
            clock: 0,
            window,
            gc_mark: GC_DISABLED,
            gc_left,
            gc_right,
            slots,
            dupe_map,
            hot: SlotMask::empty(),
            resets,
        })
    }

    fn lower_gc_mark(&mut self, mark: i64) {
        if mark < self.gc_mark {
            self.gc_mark = mark;
        }
    }

    fn maybe_gc(&mut self, clock: i64) {
        if clock < self.gc_mark {
            return;
        }
        self.garbage_collect_inner(clock);
    }

    fn garbage_collect_inner(&mut self, clock: i64) {
        // A full frame waiting on resets must not be pruned out from under
        // the pending verdict; let the next evaluation settle it first.
        if self.hot.first_n(self.slots.len()) && !self.resets.is_empty() {
            self.gc_mark = GC_DISABLED;
            return;
        }

        let deadline = clock - self.gc_right;
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
                self.lower_gc_mark(first + self.gc_right);
            }
        }

        let reset_deadline = deadline - self.gc_left;
        for i in 0..self.resets.len() {
            self.resets[i].prune(reset_deadline);
            if let Some(&first) = self.resets[i].observed.first() {
                let mark = first + self.gc_left + self.gc_right;
                self.lower_gc_mark(mark);
            }
        }
    }

    /// Consumed asserts of the candidate frame, sorted by time.
    fn build_anchors(&self) -> Vec<Anchor> {
        let mut anchors = Vec::with_capacity(self.slots.len() + self.dupe_map.iter().sum::<usize>());
        for (i, slot) in self.slots.iter().enumerate() {
            for offset in 0..=self.dupe_map[i] {
                anchors.push(Anchor {
                    clock: slot.asserts[offset].timestamp,
                    slot: i,
                    offset,
                });
            }
        }
        anchors.sort_by_key(|a| a.clock);
        anchors
    }

    /// Deferred evaluation loop: judge the candidate frame against window and
    /// resets until it fires, degrades, or must wait for the future.
    fn evaluate(&mut self, clock: i64) -> Hits {
        let n = self.slots.len();
        let mut hits = Hits::default();

        while self.hot.first_n(n) {
            let anchors = self.build_anchors();
            let t_start = anchors[0].clock;
            let t_stop = anchors[anchors.len() - 1].clock;

            let mut drop = None;
            if t_stop - t_start > self.window {
                drop = Some(anchors[0]);
            } else {
                for reset in &self.resets {
                    let (start, stop) = reset.interval(&anchors);
                    if reset.observed_in(start, stop) {
                        drop = Some(anchors[reset.anchor]);
                        break;
                    }
                    if stop >= clock {
                        // Interval extends into the future; the verdict must
                        // wait for the clock to pass it.
                        return hits;
                    }
                }
            }

            match drop {
                Some(anchor) => {
                    self.slots[anchor.slot].shift_anchor(anchor.offset);
                    if !self.slots[anchor.slot].satisfied(self.dupe_map[anchor.slot]) {
                        self.hot.clear(anchor.slot);
                    }
                }
                None => {
                    if hits.count == 0 {
                        hits.logs.reserve(n + self.dupe_map.iter().sum::<usize>());
                    }
                    hits.count += 1;
                    for i in 0..n {
                        let take = 1 + self.dupe_map[i];
                        hits.logs.extend_from_slice(&self.slots[i].asserts[..take]);
                        self.slots[i].shift_left(take);
                        if !self.slots[i].satisfied(self.dupe_map[i]) {
                            self.hot.clear(i);
                        }
                    }
                }
            }
        }

        hits
    }
}

impl Matcher for InverseSet {
    fn scan(&mut self, entry: LogEntry) -> Hits {
        if entry.timestamp < self.clock {
            warn!(
                line = %entry.line,
                stamp = entry.timestamp,
                clock = self.clock,
                "InverseSet: out of order event"
            );
            return Hits::default();
        }
        self.clock = entry.timestamp;

        self.maybe_gc(entry.timestamp);

        // Reset lines only matter while a frame is possible around them:
        // with no lookback window and nothing buffered they cannot affect
        // any future match, so skip the bookkeeping.
        if self.gc_left > 0 || self.slots.iter().any(|s| !s.asserts.is_empty()) {
            for i in 0..self.resets.len() {
                if self.resets[i].predicate.matches(&entry.line) {
                    self.resets[i].observed.push(entry.timestamp);
                    let mark = entry.timestamp + self.gc_left + self.gc_right;
                    self.lower_gc_mark(mark);
                }
            }
        }

        for i in 0..self.slots.len() {
            if self.slots[i].predicate.matches(&entry.line) {
                self.slots[i].asserts.push(entry.clone());
                if self.slots[i].satisfied(self.dupe_map[i]) {
                    self.hot.set(i);
                }
                let mark = entry.timestamp + self.gc_right;
                self.lower_gc_mark(mark);
            }
        }

        self.evaluate(entry.timestamp)
    }

    fn eval(&mut self, clock: i64) -> Hits {
        // Everything up to the current clock has already been judged.
        if clock <= self.clock {
            return Hits::default();
        }
        self.clock = clock;
        self.evaluate(clock)
    }

    fn garbage_collect(&mut self, clock: i64) {
        self.garbage_collect_inner(clock);
    }
}
