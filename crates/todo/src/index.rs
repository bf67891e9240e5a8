// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prefix-resolving index over todo IDs.
//!
//! IDs are normalized to lowercase up front. Exact matches win even when a
//! longer ID shares the prefix; an ambiguous prefix is an error, never a
//! silent pick.

use crate::store::StoreError;
use incr_core::TodoId;
use std::collections::HashMap;

/// Index of normalized todo IDs for prefix resolution.
#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    ids: Vec<String>,
}

impl IdIndex {
    pub fn new(ids: impl IntoIterator<Item = TodoId>) -> Self {
        let mut ids: Vec<String> = ids.into_iter().map(|id| id.0.to_lowercase()).collect();
        ids.sort();
        ids.dedup();
        Self { ids }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Resolve an ID or unique prefix (case-insensitive) to the full ID.
    pub fn resolve(&self, input: &str) -> Result<TodoId, StoreError> {
        let needle = input.to_lowercase();
        if needle.is_empty() {
            return Err(StoreError::TodoNotFound {
                ids: vec![input.to_string()],
            });
        }

        // Exact match is preferred even when a longer ID shares the prefix.
        if self.ids.binary_search(&needle).is_ok() {
            return Ok(TodoId::new(needle));
        }

        let matches: Vec<&String> = self
            .ids
            .iter()
            .filter(|id| id.starts_with(&needle))
            .collect();
        match matches.as_slice() {
            [] => Err(StoreError::TodoNotFound {
                ids: vec![input.to_string()],
            }),
            [only] => Ok(TodoId::new((*only).clone())),
            many => Err(StoreError::AmbiguousTodoIdPrefix {
                prefix: input.to_string(),
                matches: many.iter().map(|id| TodoId::new((*id).clone())).collect(),
            }),
        }
    }

    /// Shortest prefix length that keeps each ID unique, for terse display.
    pub fn prefix_lengths(&self) -> HashMap<TodoId, usize> {
        let mut lengths = HashMap::with_capacity(self.ids.len());
        for (i, id) in self.ids.iter().enumerate() {
            // In a sorted list, only the neighbors can share the longest
            // common prefix with this ID.
            let prev = i.checked_sub(1).map(|j| self.ids[j].as_str());
            let next = self.ids.get(i + 1).map(String::as_str);
            let shared = prev
                .map(|p| common_prefix_len(id, p))
                .max(next.map(|n| common_prefix_len(id, n)))
                .unwrap_or(0);
            lengths.insert(TodoId::new(id.clone()), (shared + 1).min(id.len().max(1)));
        }
        lengths
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
