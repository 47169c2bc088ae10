// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the logmatch authors

//! Hit container emitted by the matchers.
//!
//! A scan can complete several overlapping pattern frames at once, so hits
//! are grouped: `logs` holds `count` groups of equal length, oldest first.
//! Callers either iterate with [`Hits::index`] or drain with
//! [`Hits::pop_front`].
//!
//! An optional per-position property bag lets callers attach annotations
//! (extracted fields, rule metadata) to individual group positions without
//! growing [`LogEntry`] itself.

use std::collections::HashMap;

use serde_json::Value;

use crate::common::entry::LogEntry;

/// Key of one property: the group position it annotates plus a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropKey {
    /// Group position the property belongs to.
    pub index: usize,
    /// Property name, unique per position.
    pub key: String,
}

/// Zero or more groups of matched log entries.
///
/// Invariant: `logs.len()` is a multiple of `count`; every group has the
/// same length.
#[derive(Debug, Clone, Default)]
pub struct Hits {
    /// Number of groups.
    pub count: usize,
    /// Flat list of entries, `count` groups of `logs.len() / count` each.
    pub logs: Vec<LogEntry>,
    /// Per-position property bag; allocated only when used.
    pub props: Option<HashMap<PropKey, Value>>,
}

impl Hits {
    /// Returns true if no group was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Length of each group, or 0 when empty.
    #[must_use]
    pub fn group_size(&self) -> usize {
        if self.count == 0 {
            0
        } else {
            self.logs.len() / self.count
        }
    }

    /// Removes and returns the oldest group.
    ///
    /// Returns an empty vector once all groups have been drained.
    pub fn pop_front(&mut self) -> Vec<LogEntry> {
        if self.count == 0 {
            return Vec::new();
        }
        let sz = self.logs.len() / self.count;
        self.count -= 1;
        self.logs.drain(..sz).collect()
    }

    /// Returns the `i`-th group, oldest first.
    ///
    /// Out-of-range indices return an empty slice.
    #[must_use]
    pub fn index(&self, i: usize) -> &[LogEntry] {
        if i >= self.count {
            return &[];
        }
        let sz = self.logs.len() / self.count;
        &self.logs[i * sz..(i + 1) * sz]
    }

    /// Returns the newest group.
    #[must_use]
    pub fn last(&self) -> &[LogEntry] {
        if self.count == 0 {
            return &[];
        }
        self.index(self.count - 1)
    }

    /// Attaches a property to group position `index`.
    pub fn set_prop(&mut self, index: usize, key: impl Into<String>, value: Value) {
        self.props.get_or_insert_with(HashMap::new).insert(
            PropKey {
                index,
                key: key.into(),
            },
            value,
        );
    }

    /// Returns the properties attached to group position `i`, keyed by name.
    ///
    /// Empty when nothing was attached to that position.
    #[must_use]
    pub fn index_props(&self, i: usize) -> HashMap<&str, &Value> {
        let Some(props) = &self.props else {
            return HashMap::new();
        };
        props
            .iter()
            .filter(|(k, _)| k.index == i)
            .map(|(k, v)| (k.key.as_str(), v))
            .collect()
    }
}
