// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the logmatch authors

//! Inverse sequence matcher: an ordered sequence guarded by reset terms.
//!
//! Combines the [`MatchSeq`](crate::MatchSeq) state machine with the deferred
//! reset evaluation of [`InverseSet`](crate::InverseSet). Because a frame may
//! only fire once every reset interval around it lies in the past, the
//! triggering entry is buffered like any other assert and the full frame is
//! re-judged on every scan and on explicit [`Matcher::eval`] calls.
//!
//! The anchor list is dupe-aware: one anchor per consumed assert, in slot and
//! duplicate-run order, so `reset.anchor` can pin a window on any position of
//! the expanded pattern — including the middle of a collapsed duplicate run.
//! When a reset observation lands inside its interval, only the assert that
//! anchor identifies is dropped; progress made by the rest of the prefix
//! survives and can complete again with later entries.
//!
//! Two scheduling details keep the idle path cheap:
//!
//! - The zero-match fast path skips reset bookkeeping entirely when nothing
//!   is buffered, no lookback window exists, and the first slot does not
//!   match: no future frame could be affected by the line.
//! - While a full frame is waiting on resets, garbage collection defers
//!   (`gc_mark` is disabled) rather than age out asserts the pending verdict
//!   still needs.

use tracing::warn;

use crate::common::entry::LogEntry;
use crate::common::hits::Hits;
use crate::error::MatchError;
use crate::reset::{calc_gc_window, ResetSlot, ResetSpec};
use crate::seq::build_seq_slots;
use crate::slot::{resync_active, Anchor, TermSlot, GC_DISABLED};
use crate::term::TermSpec;
use crate::Matcher;

/// Matcher for an ordered sequence with reset (inverse) terms.
#[derive(Debug)]
pub struct InverseSeq {
    clock: i64,
    window: i64,
    gc_mark: i64,
    gc_left: i64,
    gc_right: i64,
    n_active: usize,
    slots: Vec<TermSlot>,
    dupe_map: Vec<usize>,
    extra_total: usize,
    resets: Vec<ResetSlot>,
}

impl InverseSeq {
    /// Builds an inverse sequence matcher.
    ///
    /// # Errors
    ///
    /// Sequence construction errors plus [`MatchError::AnchorRange`] for
    /// anchors past the expanded anchor list.
    pub fn new(
        window: i64,
        terms: &[TermSpec],
        reset_specs: &[ResetSpec],
    ) -> Result<Self, MatchError> {
        let (slots, dupe_map) = build_seq_slots(terms)?;
        let extra_total = dupe_map.iter().sum();

        let mut resets = Vec::with_capacity(reset_specs.len());
        for spec in reset_specs {
            // Anchors index the expanded list: one per original term.
            resets.push(ResetSlot::compile(spec, terms.len())?);
        }

        let (gc_left, gc_right) = calc_gc_window(window, &resets);

        Ok(Self {
            clock: 0,
            window,
            gc_mark: GC_DISABLED,
            gc_left,
            gc_right,
            n_active: 0,
            slots,
            dupe_map,
            extra_total,
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
        // A full frame waiting on resets must survive until it is judged;
        // pruning now could drop a single-occurrence slot prematurely.
        if self.n_active == self.slots.len() && !self.resets.is_empty() {
            self.gc_mark = GC_DISABLED;
            return;
        }

        let deadline = clock - self.gc_right;
        let stale = self.slots[0].stale_prefix(deadline);
        if stale > 0 {
            self.slots[0].shift_left(stale);
        }
        self.mini_gc();

        self.gc_mark = GC_DISABLED;
        if let Some(first) = self.slots[0].first_clock() {
            self.lower_gc_mark(first + self.gc_right);
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

    fn mini_gc(&mut self) {
        self.n_active = resync_active(
            &mut self.slots,
            &self.dupe_map,
            self.n_active,
            self.dupe_map[0],
        );
    }

    /// Expanded anchor list: one entry per consumed assert, in slot and
    /// dupe-run order. Only valid while the frame is full.
    fn build_anchors(&self) -> Vec<Anchor> {
        let mut anchors = Vec::with_capacity(self.slots.len() + self.extra_total);
        for (i, slot) in self.slots.iter().enumerate() {
            for offset in 0..=self.dupe_map[i] {
                anchors.push(Anchor {
                    clock: slot.asserts[offset].timestamp,
                    slot: i,
                    offset,
                });
            }
        }
        anchors
    }

    fn evaluate(&mut self, clock: i64) -> Hits {
        let n = self.slots.len();
        let mut hits = Hits::default();

        while self.n_active == n {
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
                        // Open interval; equal clocks can still produce a
                        // reset on this tick, so wait one tick past it.
                        return hits;
                    }
                }
            }

            match drop {
                Some(anchor) => {
                    self.slots[anchor.slot].shift_anchor(anchor.offset);
                }
                None => {
                    if hits.count == 0 {
                        hits.logs.reserve(n + self.extra_total);
                    }
                    hits.count += 1;
                    for i in 0..n {
                        let take = 1 + self.dupe_map[i];
                        hits.logs.extend_from_slice(&self.slots[i].asserts[..take]);
                        self.slots[i].shift_left(1);
                    }
                }
            }

            self.mini_gc();
        }

        hits
    }
}

impl Matcher for InverseSeq {
    fn scan(&mut self, entry: LogEntry) -> Hits {
        if entry.timestamp < self.clock {
            warn!(
                line = %entry.line,
                stamp = entry.timestamp,
                clock = self.clock,
                "InverseSeq: out of order event"
            );
            return Hits::default();
        }
        self.clock = entry.timestamp;

        self.maybe_gc(entry.timestamp);

        // Zero-match fast path: with nothing buffered and no lookback, a
        // line that misses the first slot cannot affect any future frame.
        let zero_match = if self.n_active == 0
            && self.gc_left == 0
            && self.slots[0].asserts.is_empty()
        {
            if !self.slots[0].predicate.matches(&entry.line) {
                return Hits::default();
            }
            true
        } else {
            false
        };

        for i in 0..self.resets.len() {
            if self.resets[i].predicate.matches(&entry.line) {
                self.resets[i].observed.push(entry.timestamp);
                let mark = entry.timestamp + self.gc_left + self.gc_right;
                self.lower_gc_mark(mark);
            }
        }

        // Completed slots keep collecting for overlapping frames.
        for i in 0..self.n_active {
            if self.slots[i].predicate.matches(&entry.line) {
                self.slots[i].asserts.push(entry.clone());
            }
        }

        if self.n_active < self.slots.len() {
            let cur = self.n_active;
            if !zero_match && !self.slots[cur].predicate.matches(&entry.line) {
                return Hits::default();
            }

            self.slots[cur].asserts.push(entry);
            let mark = self.clock + self.gc_right;
            self.lower_gc_mark(mark);

            if self.slots[cur].satisfied(self.dupe_map[cur]) {
                self.n_active += 1;
            }
            if self.n_active < self.slots.len() {
                return Hits::default();
            }
        }

        self.evaluate(self.clock)
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
