// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the logmatch authors

//! Declarative rule specifications.
//!
//! A [`RuleSpec`] is the serde-friendly description of one matcher: shape,
//! window, terms, and optional resets. Rules typically arrive as YAML
//! documents:
//!
//! ```yaml
//! shape: seq
//! window: 30000000000
//! terms:
//!   - kind: raw
//!     value: node unresponsive
//!   - kind: jqJson
//!     value: select(.event == "fence")
//! resets:
//!   - term: { kind: raw, value: node recovered }
//!     window: 10000000000
//!     absolute: true
//! ```
//!
//! [`RuleSpec::build`] turns the description into a boxed [`Matcher`]. A
//! `set`/`seq` rule that carries resets builds the corresponding inverse
//! matcher, so plain shapes stay forward-compatible with rules that grow a
//! reset clause later.

use serde::{Deserialize, Serialize};

use crate::error::MatchError;
use crate::inverse_seq::InverseSeq;
use crate::inverse_set::InverseSet;
use crate::reset::ResetSpec;
use crate::seq::MatchSeq;
use crate::set::MatchSet;
use crate::single::MatchSingle;
use crate::term::TermSpec;
use crate::Matcher;

/// Matcher shape a rule requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleShape {
    /// One term, fires per match.
    Single,
    /// Unordered set within a window.
    Set,
    /// Ordered sequence within a window.
    Seq,
    /// Set with reset terms.
    InverseSet,
    /// Sequence with reset terms.
    InverseSeq,
}

/// Declarative description of one matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    /// Matcher shape.
    pub shape: RuleShape,
    /// Pattern window in nanoseconds; unused by `single` rules.
    #[serde(default)]
    pub window: i64,
    /// Pattern terms, in order for sequence shapes.
    pub terms: Vec<TermSpec>,
    /// Reset terms; only meaningful for set/seq shapes and their inverses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resets: Vec<ResetSpec>,
}

impl RuleSpec {
    /// Parses a YAML rule document.
    ///
    /// # Errors
    ///
    /// [`MatchError::Rule`] wrapping the deserializer message.
    pub fn from_yaml(doc: &str) -> Result<Self, MatchError> {
        serde_yaml::from_str(doc).map_err(|e| MatchError::Rule(e.to_string()))
    }

    /// Parses a JSON rule document.
    ///
    /// # Errors
    ///
    /// [`MatchError::Rule`] wrapping the deserializer message.
    pub fn from_json(doc: &str) -> Result<Self, MatchError> {
        serde_json::from_str(doc).map_err(|e| MatchError::Rule(e.to_string()))
    }

    /// Builds the matcher this rule describes.
    ///
    /// # Errors
    ///
    /// [`MatchError::Rule`] for structurally invalid rules, plus any matcher
    /// construction error.
    pub fn build(&self) -> Result<Box<dyn Matcher>, MatchError> {
        match self.shape {
            RuleShape::Single => {
                if self.terms.len() != 1 {
                    return Err(MatchError::Rule(
                        "single rules take exactly one term".to_string(),
                    ));
                }
                if !self.resets.is_empty() {
                    return Err(MatchError::Rule(
                        "single rules do not take resets".to_string(),
                    ));
                }
                Ok(Box::new(MatchSingle::new(&self.terms[0])?))
            }
            RuleShape::Set if self.resets.is_empty() => {
                Ok(Box::new(MatchSet::new(self.window, &self.terms)?))
            }
            RuleShape::Seq if self.resets.is_empty() => {
                Ok(Box::new(MatchSeq::new(self.window, &self.terms)?))
            }
            RuleShape::Set | RuleShape::InverseSet => Ok(Box::new(InverseSet::new(
                self.window,
                &self.terms,
                &self.resets,
            )?)),
            RuleShape::Seq | RuleShape::InverseSeq => Ok(Box::new(InverseSeq::new(
                self.window,
                &self.terms,
                &self.resets,
            )?)),
        }
    }
}
