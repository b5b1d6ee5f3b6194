//! Join conditions and the relation graph
//!
//! Relations are the inputs of a multi-way join, identified by index. Two
//! relations are connected when they expose a common variable; the join-tree
//! compiler only ever joins along these edges.

use crate::var_registry::VarId;
use std::collections::{BTreeMap, BTreeSet};

/// Two relations joined on a shared variable (`left < right`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinCondition {
    pub left: usize,
    pub right: usize,
    pub var: VarId,
}

impl JoinCondition {
    pub fn new(a: usize, b: usize, var: VarId) -> Self {
        Self {
            left: a.min(b),
            right: a.max(b),
            var,
        }
    }
}

/// Variables per relation and the join conditions between relations
#[derive(Debug, Clone, Default)]
pub struct JoinInfo {
    relation_vars: Vec<Vec<VarId>>,
    conditions: Vec<JoinCondition>,
}

impl JoinInfo {
    /// Build from each relation's exposed variables
    ///
    /// Every variable shared by several relations yields one condition per
    /// pair of those relations. A variable only one relation exposes joins
    /// nothing.
    pub fn new(relation_vars: Vec<Vec<VarId>>) -> Self {
        let mut var_to_rels: BTreeMap<VarId, Vec<usize>> = BTreeMap::new();
        for (rel, vars) in relation_vars.iter().enumerate() {
            for &var in vars {
                let rels = var_to_rels.entry(var).or_default();
                if rels.last() != Some(&rel) {
                    rels.push(rel);
                }
            }
        }

        let mut conditions = Vec::new();
        for (var, rels) in &var_to_rels {
            if rels.len() < 2 {
                tracing::trace!(var = var.0, "variable occurs in a single relation");
                continue;
            }
            for (i, &a) in rels.iter().enumerate() {
                for &b in &rels[i + 1..] {
                    conditions.push(JoinCondition::new(a, b, *var));
                }
            }
        }
        conditions.sort();

        Self {
            relation_vars,
            conditions,
        }
    }

    pub fn relation_count(&self) -> usize {
        self.relation_vars.len()
    }

    /// Variables of `rel`, in the order the relation exposes them
    pub fn vars_of(&self, rel: usize) -> &[VarId] {
        self.relation_vars
            .get(rel)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn conditions(&self) -> &[JoinCondition] {
        &self.conditions
    }
}

/// Undirected adjacency over relation indices
#[derive(Debug, Clone)]
pub struct JoinGraph {
    adjacency: Vec<BTreeSet<usize>>,
}

impl JoinGraph {
    pub fn new(relation_count: usize, conditions: &[JoinCondition]) -> Self {
        let mut adjacency = vec![BTreeSet::new(); relation_count];
        for cond in conditions {
            if cond.left == cond.right || cond.right >= relation_count {
                continue;
            }
            adjacency[cond.left].insert(cond.right);
            adjacency[cond.right].insert(cond.left);
        }
        Self { adjacency }
    }

    pub fn from_info(info: &JoinInfo) -> Self {
        Self::new(info.relation_count(), info.conditions())
    }

    /// Neighbours of `rel` in ascending order
    pub fn neighbours(&self, rel: usize) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.adjacency.get(rel).into_iter().flatten().copied()
    }

    /// Depth-first visit order from `start`; lower-numbered neighbours first
    pub fn dfs_order(&self, start: usize) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.adjacency.len());
        if start >= self.adjacency.len() {
            return order;
        }

        let mut seen = vec![false; self.adjacency.len()];
        let mut stack = vec![start];
        while let Some(rel) = stack.pop() {
            if std::mem::replace(&mut seen[rel], true) {
                continue;
            }
            order.push(rel);
            stack.extend(self.neighbours(rel).rev().filter(|n| !seen[*n]));
        }
        order
    }

    /// Relations not reachable from `start`, ascending
    pub fn unreachable_from(&self, start: usize) -> Vec<usize> {
        let reached: BTreeSet<usize> = self.dfs_order(start).into_iter().collect();
        (0..self.adjacency.len())
            .filter(|rel| !reached.contains(rel))
            .collect()
    }
}
