// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the logmatch authors

//! Term specifications and predicate compilation.
//!
//! A [`TermSpec`] names one of four match kinds over a raw log line:
//!
//! | Kind | Semantics |
//! |------|-----------|
//! | `Raw` | substring containment |
//! | `Regex` | unanchored regex search |
//! | `JqJson` | jq filter over the line decoded as JSON |
//! | `JqYaml` | jq filter over the line decoded as YAML |
//!
//! Compilation happens once per term at matcher construction; scanning is
//! allocation-free for `Raw` and `Regex`. Structured kinds decode the line
//! into a document first and keep a one-slot cache of the last decoded line
//! (including decode *failures*), keyed on exact string equality, so several
//! jq terms scanning the same entry pay for a single parse.
//!
//! A jq term matches when at least one filter output is truthy (neither
//! `null` nor `false`). Decode failures and jq runtime errors are debug-logged
//! and count as non-matches; they never propagate.

use std::fmt;
use std::str::FromStr;

use jaq_interpret::{Ctx, FilterT, ParseCtx, RcIter, Val};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MatchError;

/// How a term's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TermKind {
    /// Literal substring.
    Raw,
    /// Regular expression, searched anywhere in the line.
    Regex,
    /// jq filter program over the JSON-decoded line.
    JqJson,
    /// jq filter program over the YAML-decoded line.
    JqYaml,
}

impl TermKind {
    /// Canonical name, as used in rule documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Regex => "regex",
            Self::JqJson => "jqJson",
            Self::JqYaml => "jqYaml",
        }
    }
}

impl fmt::Display for TermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TermKind {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "regex" => Ok(Self::Regex),
            "jqJson" => Ok(Self::JqJson),
            "jqYaml" => Ok(Self::JqYaml),
            _ => Err(MatchError::TermType),
        }
    }
}

/// One term of a pattern: a kind plus its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TermSpec {
    /// Interpretation of `value`.
    pub kind: TermKind,
    /// Substring, regex, or jq program. Must be non-empty.
    pub value: String,
}

impl TermSpec {
    /// Creates a raw substring term.
    pub fn raw(value: impl Into<String>) -> Self {
        Self {
            kind: TermKind::Raw,
            value: value.into(),
        }
    }

    /// Creates a regex term.
    pub fn regex(value: impl Into<String>) -> Self {
        Self {
            kind: TermKind::Regex,
            value: value.into(),
        }
    }

    /// Creates a jq-over-JSON term.
    pub fn jq_json(value: impl Into<String>) -> Self {
        Self {
            kind: TermKind::JqJson,
            value: value.into(),
        }
    }

    /// Creates a jq-over-YAML term.
    pub fn jq_yaml(value: impl Into<String>) -> Self {
        Self {
            kind: TermKind::JqYaml,
            value: value.into(),
        }
    }

    /// Compiles the term into a runnable predicate.
    ///
    /// # Errors
    ///
    /// [`MatchError::TermEmpty`] for empty values and
    /// [`MatchError::TermCompile`] wrapping regex/jq parse failures.
    pub fn compile(&self) -> Result<Predicate, MatchError> {
        if self.value.is_empty() {
            return Err(MatchError::TermEmpty);
        }

        match self.kind {
            TermKind::Raw => Ok(Predicate::Raw(self.value.clone())),
            TermKind::Regex => match Regex::new(&self.value) {
                Ok(re) => Ok(Predicate::Regex(re)),
                Err(err) => Err(self.compile_error(err.to_string())),
            },
            TermKind::JqJson => self.compile_jq(DocFormat::Json),
            TermKind::JqYaml => self.compile_jq(DocFormat::Yaml),
        }
    }

    fn compile_jq(&self, format: DocFormat) -> Result<Predicate, MatchError> {
        let (main, errs) = jaq_parse::parse(&self.value, jaq_parse::main());
        if let Some(err) = errs.first() {
            return Err(self.compile_error(err.to_string()));
        }
        let Some(main) = main else {
            return Err(self.compile_error("empty jq program".to_string()));
        };

        let mut defs = ParseCtx::new(Vec::new());
        defs.insert_natives(jaq_core::core());
        defs.insert_defs(jaq_std::std());
        let filter = defs.compile(main);
        if !defs.errs.is_empty() {
            return Err(self.compile_error(format!(
                "{} undefined or misused name(s)",
                defs.errs.len()
            )));
        }

        Ok(Predicate::Jq(Box::new(JqPredicate {
            program: self.value.clone(),
            filter,
            format,
            cache: DocCache::default(),
        })))
    }

    fn compile_error(&self, reason: String) -> MatchError {
        MatchError::TermCompile {
            kind: self.kind.as_str(),
            value: self.value.clone(),
            reason,
        }
    }
}

/// Heuristic: does `s` contain regex metacharacters?
///
/// True iff quoting the string with [`regex::escape`] changes it. Callers use
/// this to decide whether a user-supplied literal should be promoted to a
/// `Regex` term.
#[must_use]
pub fn is_regex(s: &str) -> bool {
    regex::escape(s) != s
}

/// Document format for structured terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocFormat {
    Json,
    Yaml,
}

/// One-slot cache of the last decoded line.
///
/// Stores the decode error as well, so a malformed line repeated across
/// several jq terms (or several scans) is parsed once.
#[derive(Default)]
struct DocCache {
    line: Option<String>,
    doc: Option<Result<Val, String>>,
}

/// Compiled jq predicate: program, document format, and parse cache.
pub struct JqPredicate {
    program: String,
    filter: jaq_interpret::Filter,
    format: DocFormat,
    cache: DocCache,
}

impl JqPredicate {
    fn matches(&mut self, line: &str) -> bool {
        if self.cache.line.as_deref() != Some(line) {
            let doc = match self.format {
                DocFormat::Json => serde_json::from_str::<serde_json::Value>(line)
                    .map(Val::from)
                    .map_err(|e| e.to_string()),
                DocFormat::Yaml => serde_yaml::from_str::<serde_json::Value>(line)
                    .map(Val::from)
                    .map_err(|e| e.to_string()),
            };
            self.cache.line = Some(line.to_owned());
            self.cache.doc = Some(doc);
        }

        let doc = match self.cache.doc.as_ref() {
            Some(Ok(doc)) => doc.clone(),
            Some(Err(err)) => {
                debug!(line, error = %err, "failed to decode structured log line");
                return false;
            }
            None => return false,
        };

        let inputs = RcIter::new(core::iter::empty());
        let mut matched = false;
        for out in self.filter.run((Ctx::new([], &inputs), doc)) {
            match out {
                Ok(Val::Null | Val::Bool(false)) => {}
                Ok(_) => matched = true,
                Err(err) => {
                    debug!(line, term = %self.program, error = %err, "jq evaluation failed");
                    matched = false;
                    break;
                }
            }
        }
        matched
    }
}

/// A compiled line predicate.
///
/// Matching takes `&mut self` because structured predicates update their
/// document cache.
pub enum Predicate {
    /// Substring containment.
    Raw(String),
    /// Unanchored regex search.
    Regex(Regex),
    /// jq filter over a decoded document.
    Jq(Box<JqPredicate>),
}

impl Predicate {
    /// Returns true if `line` satisfies the predicate.
    pub fn matches(&mut self, line: &str) -> bool {
        match self {
            Self::Raw(needle) => line.contains(needle.as_str()),
            Self::Regex(re) => re.is_match(line),
            Self::Jq(jq) => jq.matches(line),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(s) => f.debug_tuple("Raw").field(s).finish(),
            Self::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Self::Jq(jq) => f
                .debug_struct("Jq")
                .field("program", &jq.program)
                .field("format", &jq.format)
                .finish(),
        }
    }
}
