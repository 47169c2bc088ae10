// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the logmatch authors

//! Single-term matcher.
//!
//! Fires a one-entry hit on every predicate match. No window, no buffered
//! state; `eval` and `garbage_collect` are no-ops. Exists so a lone term can
//! be driven through the same [`Matcher`] interface as the stateful shapes.

use tracing::warn;

use crate::common::entry::LogEntry;
use crate::common::hits::Hits;
use crate::error::MatchError;
use crate::term::{Predicate, TermSpec};
use crate::Matcher;

/// Matcher for a single term.
#[derive(Debug)]
pub struct MatchSingle {
    clock: i64,
    predicate: Predicate,
}

impl MatchSingle {
    /// Compiles the term into a single matcher.
    ///
    /// # Errors
    ///
    /// Term compilation errors ([`MatchError::TermEmpty`],
    /// [`MatchError::TermCompile`]).
    pub fn new(term: &TermSpec) -> Result<Self, MatchError> {
        Ok(Self {
            clock: 0,
            predicate: term.compile()?,
        })
    }
}

impl Matcher for MatchSingle {
    fn scan(&mut self, entry: LogEntry) -> Hits {
        if entry.timestamp < self.clock {
            warn!(
                line = %entry.line,
                stamp = entry.timestamp,
                clock = self.clock,
                "MatchSingle: out of order event"
            );
            return Hits::default();
        }
        self.clock = entry.timestamp;

        if !self.predicate.matches(&entry.line) {
            return Hits::default();
        }

        Hits {
            count: 1,
            logs: vec![entry],
            props: None,
        }
    }

    fn eval(&mut self, _clock: i64) -> Hits {
        Hits::default()
    }

    fn garbage_collect(&mut self, _clock: i64) {}
}
