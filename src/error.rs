// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the logmatch authors

//! Construction-time errors.
//!
//! Errors are only produced while building a matcher or compiling a term.
//! Once a matcher is constructed, `scan`/`eval`/`garbage_collect` are total:
//! runtime anomalies (out-of-order entries, malformed structured lines, jq
//! evaluation failures) are logged and treated as non-matches, never
//! surfaced as errors.

use thiserror::Error;

use crate::common::mask::MAX_TERMS;

/// Errors returned by matcher constructors and term compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MatchError {
    /// A pattern needs at least one term.
    #[error("no terms")]
    NoTerms,

    /// The pattern exceeds the slot mask width.
    #[error("too many terms (limit {MAX_TERMS})")]
    TooManyTerms,

    /// A reset anchor points past the pattern's anchor list.
    #[error("anchor out of range")]
    AnchorRange,

    /// Non-zero reset anchors cannot be combined with duplicate terms here.
    #[error("non-zero anchor unsupported with duplicate terms")]
    AnchorNoDupes,

    /// Term value is empty.
    #[error("empty term")]
    TermEmpty,

    /// Term kind name is not one of `raw`, `regex`, `jqJson`, `jqYaml`.
    #[error("unknown term type")]
    TermType,

    /// The term value failed to parse or compile.
    #[error("term compile error: kind:'{kind}' value:'{value}': {reason}")]
    TermCompile {
        /// Term kind name.
        kind: &'static str,
        /// Offending term value.
        value: String,
        /// Underlying parser/compiler message.
        reason: String,
    },

    /// A declarative rule spec is structurally invalid.
    #[error("invalid rule: {0}")]
    Rule(String),
}
