// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the logmatch authors

//! Reset (inverse) terms and their window geometry.
//!
//! A reset term cancels a prospective hit when it is observed inside a time
//! interval derived from the hit's anchors:
//!
//! ```text
//! start = anchors[reset.anchor].clock + reset.slide
//! width = reset.window + (absolute ? 0 : anchors.last - anchors.first)
//! stop  = start + max(width, 0)
//! ```
//!
//! The interval is closed on both ends; an observation at either boundary
//! invalidates. A `stop` that has not yet been reached by the matcher clock
//! means the verdict is still open and the hit must be deferred.
//!
//! [`calc_gc_window`] turns a pattern window plus its resets into the
//! retention horizons `(gc_left, gc_right)`: how far behind the clock slot
//! asserts (`gc_right`) and reset observations (`gc_right + gc_left`) must be
//! kept to still be able to judge the worst-case frame.

use serde::{Deserialize, Serialize};

use crate::error::MatchError;
use crate::slot::Anchor;
use crate::term::{Predicate, TermSpec};

/// Specification of one reset term attached to an inverse matcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResetSpec {
    /// The term whose occurrence cancels a hit.
    pub term: TermSpec,
    /// Window width in nanoseconds. With `absolute == false`, 0 means the
    /// window spans exactly the matched frame.
    #[serde(default)]
    pub window: i64,
    /// Signed shift applied to the anchor timestamp.
    #[serde(default)]
    pub slide: i64,
    /// Index into the frame's anchor list the window is pinned to.
    #[serde(default)]
    pub anchor: u8,
    /// When true the width is exactly `window`; otherwise the frame's own
    /// span is added.
    #[serde(default)]
    pub absolute: bool,
}

impl ResetSpec {
    /// Creates a relative reset anchored on the first frame position.
    #[must_use]
    pub fn new(term: TermSpec) -> Self {
        Self {
            term,
            window: 0,
            slide: 0,
            anchor: 0,
            absolute: false,
        }
    }

    /// Returns the spec with the given window width.
    #[must_use]
    pub fn with_window(mut self, window: i64) -> Self {
        self.window = window;
        self
    }

    /// Returns the spec with the given anchor slide.
    #[must_use]
    pub fn with_slide(mut self, slide: i64) -> Self {
        self.slide = slide;
        self
    }

    /// Returns the spec anchored on the given frame position.
    #[must_use]
    pub fn with_anchor(mut self, anchor: u8) -> Self {
        self.anchor = anchor;
        self
    }

    /// Returns the spec with an absolute window.
    #[must_use]
    pub fn absolute(mut self) -> Self {
        self.absolute = true;
        self
    }
}

/// Compiled reset term plus its observation log.
///
/// Invariant: `observed` is non-decreasing, which is what makes binary-search
/// pruning and interval probing valid.
#[derive(Debug)]
pub(crate) struct ResetSlot {
    pub predicate: Predicate,
    pub observed: Vec<i64>,
    pub window: i64,
    pub slide: i64,
    pub anchor: usize,
    pub absolute: bool,
}

impl ResetSlot {
    /// Compiles a spec, validating the anchor against the pattern's expanded
    /// anchor count.
    pub(crate) fn compile(spec: &ResetSpec, n_anchors: usize) -> Result<Self, MatchError> {
        let predicate = spec.term.compile()?;
        if usize::from(spec.anchor) >= n_anchors {
            return Err(MatchError::AnchorRange);
        }
        Ok(Self {
            predicate,
            observed: Vec::new(),
            window: spec.window,
            slide: spec.slide,
            anchor: usize::from(spec.anchor),
            absolute: spec.absolute,
        })
    }

    /// Closed invalidation interval for a frame described by `anchors`.
    pub(crate) fn interval(&self, anchors: &[Anchor]) -> (i64, i64) {
        if anchors.is_empty() {
            return (0, 0);
        }
        let start = anchors[self.anchor].clock + self.slide;
        let mut width = self.window;
        if !self.absolute {
            width += anchors[anchors.len() - 1].clock - anchors[0].clock;
        }
        if width < 0 {
            width = 0;
        }
        (start, start + width)
    }

    /// True if any observation lies in `[start, stop]`.
    pub(crate) fn observed_in(&self, start: i64, stop: i64) -> bool {
        let i = self.observed.partition_point(|&t| t < start);
        self.observed.get(i).is_some_and(|&t| t <= stop)
    }

    /// Drops observations older than `deadline`.
    pub(crate) fn prune(&mut self, deadline: i64) {
        let stale = self.observed.partition_point(|&t| t < deadline);
        if stale > 0 {
            self.observed.drain(..stale);
        }
    }
}

/// Retention horizons `(gc_left, gc_right)` for a window and its resets.
pub(crate) fn calc_gc_window(window: i64, resets: &[ResetSlot]) -> (i64, i64) {
    let mut left: i64 = 0;
    let mut right: i64 = window;

    // Worst case keeps a full frame alive until the furthest reset window
    // closes, and keeps lookback observations for left-slid windows.
    for reset in resets {
        right = right.max(window + reset.window + reset.slide);
        left = left.max(-reset.slide.min(0));
    }

    (left, right)
}
