//! In-memory dependency graph over task nodes.
//!
//! Topological layering, cycle detection, readiness tracking, and
//! critical-path analysis, as required for the Planner's execution plan and
//! the Queue's promotion logic.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::specialty::Specialty;

/// Node in the dependency graph (graph-form of a [`crate::task::Task`]).
///
/// `remaining_prerequisites` is the only field the graph mutates, and only
/// via [`Graph::mark_completed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    pub task_id: String,
    pub specialty: Specialty,
    pub estimated_hours: f64,
    pub remaining_prerequisites: BTreeSet<String>,
}

impl TaskNode {
    #[must_use]
    pub fn new(
        task_id: impl Into<String>,
        specialty: Specialty,
        estimated_hours: f64,
        prerequisites: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            specialty,
            estimated_hours,
            remaining_prerequisites: prerequisites.into_iter().collect(),
        }
    }

    /// A node with no remaining prerequisites is ready to run.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.remaining_prerequisites.is_empty()
    }
}

/// Directed acyclic graph over task nodes, keyed by task id, plus reverse
/// edges from a task to the tasks that depend on it.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: HashMap<String, TaskNode>,
    /// prerequisite id -> ids of tasks that depend on it
    dependents: HashMap<String, Vec<String>>,
    /// insertion order, used to break critical-path ties deterministically
    insertion_order: Vec<String>,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node and record reverse edges for each of its prerequisites.
    pub fn add_node(&mut self, node: TaskNode) {
        let id = node.task_id.clone();
        for prereq in &node.remaining_prerequisites {
            self.dependents
                .entry(prereq.clone())
                .or_default()
                .push(id.clone());
        }
        self.dependents.entry(id.clone()).or_default();
        self.insertion_order.push(id.clone());
        self.nodes.insert(id, node);
    }

    #[must_use]
    pub fn get(&self, task_id: &str) -> Option<&TaskNode> {
        self.nodes.get(task_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes with no remaining prerequisites.
    #[must_use]
    pub fn get_ready_tasks(&self) -> Vec<&TaskNode> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| node.is_ready())
            .collect()
    }

    /// Nodes directly depending on `task_id`.
    #[must_use]
    pub fn get_dependents(&self, task_id: &str) -> Vec<&TaskNode> {
        self.dependents
            .get(task_id)
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    /// Remove `task_id` from each dependent's remaining-prerequisite set;
    /// return the nodes that newly became ready.
    pub fn mark_completed(&mut self, task_id: &str) -> Vec<&TaskNode> {
        let dependent_ids = self.dependents.get(task_id).cloned().unwrap_or_default();
        let mut newly_ready = Vec::new();

        for id in &dependent_ids {
            if let Some(node) = self.nodes.get_mut(id) {
                node.remaining_prerequisites.remove(task_id);
                if node.is_ready() {
                    newly_ready.push(id.clone());
                }
            }
        }

        newly_ready
            .into_iter()
            .filter_map(|id| self.nodes.get(&id))
            .collect()
    }

    /// DFS cycle detection with an explicit recursion-stack set. Returns the
    /// cycle path (as task ids) when one is found.
    #[must_use]
    pub fn validate_acyclic(&self) -> (bool, Option<Vec<String>>) {
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack: HashSet<String> = HashSet::new();

        for start in &self.insertion_order {
            if visited.contains(start) {
                continue;
            }
            let mut path = Vec::new();
            if let Some(cycle) = self.dfs_find_cycle(start, &mut visited, &mut stack, &mut path) {
                return (false, Some(cycle));
            }
        }
        (true, None)
    }

    fn dfs_find_cycle(
        &self,
        task_id: &str,
        visited: &mut HashSet<String>,
        stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(task_id.to_string());
        stack.insert(task_id.to_string());
        path.push(task_id.to_string());

        if let Some(deps) = self.dependents.get(task_id) {
            for dependent in deps {
                if stack.contains(dependent) {
                    let mut cycle = path.clone();
                    cycle.push(dependent.clone());
                    return Some(cycle);
                }
                if !visited.contains(dependent) {
                    if let Some(cycle) = self.dfs_find_cycle(dependent, visited, stack, path) {
                        return Some(cycle);
                    }
                }
            }
        }

        path.pop();
        stack.remove(task_id);
        None
    }

    /// Kahn's algorithm: each level contains every node whose in-degree
    /// reaches zero simultaneously.
    pub fn execution_order(&self) -> Result<Vec<Vec<String>>> {
        let (ok, cycle) = self.validate_acyclic();
        if !ok {
            let path = cycle.unwrap_or_default();
            return Err(Error::Cycle(path.join(" -> ")));
        }

        let mut in_degree: HashMap<String, usize> = self
            .nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.remaining_prerequisites.len()))
            .collect();

        let mut remaining: HashSet<String> = self.nodes.keys().cloned().collect();
        let mut levels = Vec::new();

        while !remaining.is_empty() {
            let mut level: Vec<String> = self
                .insertion_order
                .iter()
                .filter(|id| remaining.contains(*id) && in_degree.get(*id).copied() == Some(0))
                .cloned()
                .collect();
            level.sort();

            if level.is_empty() {
                return Err(Error::Cycle("no task with zero in-degree".into()));
            }

            for id in &level {
                remaining.remove(id);
                if let Some(deps) = self.dependents.get(id) {
                    for dependent in deps {
                        if let Some(count) = in_degree.get_mut(dependent) {
                            *count = count.saturating_sub(1);
                        }
                    }
                }
            }

            levels.push(level);
        }

        Ok(levels)
    }

    /// Longest path by estimated hours, using earliest-start times derived
    /// from the topological layering. Ties break by insertion order.
    pub fn critical_path(&self) -> Result<(Vec<String>, f64)> {
        if self.nodes.is_empty() {
            return Ok((Vec::new(), 0.0));
        }

        let levels = self.execution_order()?;
        let mut earliest_start: HashMap<String, f64> = HashMap::new();
        // prerequisite sets are consumed by mark_completed in the live graph,
        // so reconstruct them from the original edges for this read-only pass.
        let prereqs_of = self.original_prerequisites();

        for level in &levels {
            for id in level {
                let node = &self.nodes[id];
                let deps = &prereqs_of[id];
                let start = deps
                    .iter()
                    .map(|dep| earliest_start[dep] + self.nodes[dep].estimated_hours)
                    .fold(0.0_f64, f64::max);
                earliest_start.insert(node.task_id.clone(), start);
            }
        }

        let latest_finish_id = self
            .insertion_order
            .iter()
            .max_by(|a, b| {
                let fa = earliest_start[*a] + self.nodes[*a].estimated_hours;
                let fb = earliest_start[*b] + self.nodes[*b].estimated_hours;
                fa.partial_cmp(&fb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
            .ok_or_else(|| Error::Cycle("empty graph".into()))?;

        let mut path = Vec::new();
        let mut current = Some(latest_finish_id);
        let mut total_hours = 0.0;

        while let Some(id) = current {
            path.insert(0, id.clone());
            total_hours += self.nodes[&id].estimated_hours;

            let deps = &prereqs_of[&id];
            current = deps
                .iter()
                .find(|dep| {
                    (earliest_start[*dep] + self.nodes[*dep].estimated_hours - earliest_start[&id]).abs()
                        < f64::EPSILON
                })
                .cloned();
        }

        Ok((path, total_hours))
    }

    /// Sum of all task hours (sequential execution time).
    #[must_use]
    pub fn total_estimated_hours(&self) -> f64 {
        self.nodes.values().map(|n| n.estimated_hours).sum()
    }

    /// Sum of per-level max hours (parallel execution time).
    pub fn parallel_estimated_hours(&self) -> Result<f64> {
        let levels = self.execution_order()?;
        Ok(levels
            .iter()
            .map(|level| {
                level
                    .iter()
                    .map(|id| self.nodes[id].estimated_hours)
                    .fold(0.0_f64, f64::max)
            })
            .sum())
    }

    /// Reconstruct the prerequisite sets as they were at graph-build time,
    /// since `mark_completed` drains `remaining_prerequisites` in place.
    /// Each list is ordered by insertion order so callers that break ties by
    /// "first in insertion order" (e.g. [`Self::critical_path`]) get a
    /// deterministic answer rather than `HashMap` iteration order.
    fn original_prerequisites(&self) -> HashMap<String, Vec<String>> {
        let position: HashMap<&str, usize> = self
            .insertion_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut out: HashMap<String, Vec<String>> =
            self.nodes.keys().map(|id| (id.clone(), Vec::new())).collect();
        for (prereq, dependents) in &self.dependents {
            for dependent in dependents {
                if let Some(list) = out.get_mut(dependent) {
                    list.push(prereq.clone());
                }
            }
        }

        for list in out.values_mut() {
            list.sort_by_key(|id| position.get(id.as_str()).copied().unwrap_or(usize::MAX));
        }
        out
    }
}
