// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the logmatch authors

//! # `logmatch` — Streaming log-pattern matching engine
//!
//! Consumes a monotonic stream of timestamped log entries and emits hits
//! whenever a configured temporal pattern is satisfied. Five matcher shapes
//! share one interface:
//!
//! | Matcher | Shape | Fires when |
//! |---------|-------|------------|
//! | [`MatchSingle`] | one term | the term matches a line |
//! | [`MatchSet`] | unordered set | every term matched within the window |
//! | [`MatchSeq`] | ordered sequence | terms matched in order within the window |
//! | [`InverseSet`] | set + reset terms | set satisfied and no reset window violated |
//! | [`InverseSeq`] | sequence + reset terms | sequence satisfied and no reset window violated |
//!
//! Terms are substrings, regexes, or jq programs over JSON/YAML lines (see
//! [`TermSpec`]); reset terms carry window geometry (see [`ResetSpec`]) that
//! can cancel — or defer — an otherwise-valid hit. Matchers never block and
//! never schedule timers: state changes only on [`Matcher::scan`] and
//! [`Matcher::eval`].
//!
//! ## Example
//!
//! ```
//! use logmatch::{LogEntry, MatchSeq, Matcher, TermSpec};
//!
//! let terms = [TermSpec::raw("unresponsive"), TermSpec::raw("fencing")];
//! let mut matcher = MatchSeq::new(30_000_000_000, &terms)?;
//!
//! assert!(matcher.scan(LogEntry::new(1_000, "node worker-3 unresponsive")).is_empty());
//! let hits = matcher.scan(LogEntry::new(2_000, "fencing worker-3"));
//! assert_eq!(hits.count, 1);
//! assert_eq!(hits.index(0).len(), 2);
//! # Ok::<(), logmatch::MatchError>(())
//! ```
//!
//! Line framing, timestamp extraction, and file tailing are the caller's
//! business; the engine consumes ready-made [`LogEntry`] values.

pub mod common;
pub mod error;
pub mod inverse_seq;
pub mod inverse_set;
pub mod reset;
pub mod rule;
pub mod seq;
pub mod set;
pub mod single;
pub mod term;

mod slot;

pub use common::entry::LogEntry;
pub use common::hits::{Hits, PropKey};
pub use common::mask::{SlotMask, MAX_TERMS};
pub use error::MatchError;
pub use inverse_seq::InverseSeq;
pub use inverse_set::InverseSet;
pub use reset::ResetSpec;
pub use rule::{RuleShape, RuleSpec};
pub use seq::MatchSeq;
pub use set::MatchSet;
pub use single::MatchSingle;
pub use term::{is_regex, Predicate, TermKind, TermSpec};

/// Uniform matcher interface.
///
/// Implementations are single-owner state machines: `scan`, `eval`, and
/// `garbage_collect` must be called serially, with non-decreasing
/// timestamps. Entries older than the matcher's clock are dropped with a
/// warning, never an error.
pub trait Matcher: std::fmt::Debug {
    /// Ingests one entry; returns zero or more completed hits.
    fn scan(&mut self, entry: LogEntry) -> Hits;

    /// Advances time without input, flushing hits whose reset windows have
    /// closed. A `clock` at or before the current one is a no-op.
    fn eval(&mut self, clock: i64) -> Hits;

    /// Forces pruning of state older than the retention horizon at `clock`.
    fn garbage_collect(&mut self, clock: i64);
}
