// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency-graph traversal: blocked detection, ready ordering, dep trees.

use chrono::{DateTime, Utc};
use incr_core::{Dependency, Todo, TodoId, TodoStatus};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// A todo is blocked iff at least one dependency points at an existing todo
/// whose status is unresolved. Missing blockers count as resolved.
pub(crate) fn blocked_ids(todos: &[Todo], deps: &[Dependency]) -> HashSet<TodoId> {
    let by_id: HashMap<&str, &Todo> = todos.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut unresolved_blockers: HashSet<&str> = HashSet::new();
    for dep in deps {
        if let Some(blocker) = by_id.get(dep.depends_on_id.as_str()) {
            if !blocker.status.is_resolved() {
                unresolved_blockers.insert(blocker.id.as_str());
            }
        }
    }

    deps.iter()
        .filter(|dep| unresolved_blockers.contains(dep.depends_on_id.as_str()))
        .map(|dep| dep.todo_id.clone())
        .collect()
}

/// Sort key for the ready ordering: priority ascending, then type rank,
/// then creation time.
fn ready_key(todo: &Todo) -> (u8, u8, DateTime<Utc>) {
    (todo.priority.value(), todo.todo_type.rank(), todo.created_at)
}

struct HeapEntry(Todo);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        ready_key(&self.0) == ready_key(&other.0)
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        ready_key(&self.0).cmp(&ready_key(&other.0))
    }
}

/// Open, unblocked todos sorted by (priority, type rank, createdAt).
///
/// `limit` of 0 means unbounded; otherwise a bounded max-heap keeps only the
/// best `limit` entries while scanning.
pub fn ready(todos: &[Todo], deps: &[Dependency], limit: usize) -> Vec<Todo> {
    let blocked = blocked_ids(todos, deps);
    let candidates = todos
        .iter()
        .filter(|t| t.status == TodoStatus::Open && !blocked.contains(&t.id))
        .cloned();

    if limit == 0 {
        let mut all: Vec<Todo> = candidates.collect();
        all.sort_by_key(ready_key);
        return all;
    }

    // Max-heap of the current best `limit`; the root is the worst of them
    // and is evicted when a better candidate arrives.
    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(limit + 1);
    for todo in candidates {
        heap.push(HeapEntry(todo));
        if heap.len() > limit {
            heap.pop();
        }
    }
    let mut best: Vec<Todo> = heap.into_iter().map(|e| e.0).collect();
    best.sort_by_key(ready_key);
    best
}

/// A node in a dependency tree rooted at some todo.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DepTreeNode {
    pub todo: Todo,
    /// Subtrees for each dependency that resolves to an existing todo.
    pub children: Vec<DepTreeNode>,
}

/// Build the dependency tree rooted at `root`.
///
/// Cycle guard is per-call path marking: a node already on the current
/// root-to-leaf path is not expanded again, so diamonds re-expose shared
/// descendants at every encounter while true cycles terminate.
pub(crate) fn dep_tree(root: &Todo, todos: &[Todo], deps: &[Dependency]) -> DepTreeNode {
    let by_id: HashMap<&str, &Todo> = todos.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
    for dep in deps {
        edges
            .entry(dep.todo_id.as_str())
            .or_default()
            .push(dep.depends_on_id.as_str());
    }

    let mut path: Vec<String> = Vec::new();
    build_node(root, &by_id, &edges, &mut path)
}

fn build_node(
    todo: &Todo,
    by_id: &HashMap<&str, &Todo>,
    edges: &HashMap<&str, Vec<&str>>,
    path: &mut Vec<String>,
) -> DepTreeNode {
    path.push(todo.id.to_string());
    let mut children = Vec::new();
    if let Some(dep_ids) = edges.get(todo.id.as_str()) {
        for dep_id in dep_ids {
            if path.iter().any(|p| p == dep_id) {
                // On the current path: expanding again would loop.
                continue;
            }
            if let Some(child) = by_id.get(dep_id) {
                children.push(build_node(child, by_id, edges, path));
            }
        }
    }
    path.pop();
    DepTreeNode {
        todo: todo.clone(),
        children,
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
