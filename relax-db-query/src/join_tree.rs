//! Join-tree compilation
//!
//! Turns a flat list of relation streams into a left-deep tree of
//! [`RankJoin`]s. Relations are added in depth-first order over the join
//! graph starting at relation 0, so every relation joins onto a tree that
//! already binds one of its variables. A relation sharing several variables
//! with the tree is hashed on the first one and unified on the rest.

use crate::answer::Answer;
use crate::context::ExecutionContext;
use crate::error::{QueryError, Result};
use crate::join_graph::{JoinGraph, JoinInfo};
use crate::operator::{close_all, BoxedOperator, Operator};
use crate::rank_join::RankJoin;
use crate::var_registry::VarId;
use async_trait::async_trait;

/// A relation stream and the variables it exposes
pub struct JoinInput {
    pub operator: BoxedOperator,
    pub vars: Vec<VarId>,
}

impl JoinInput {
    pub fn new(operator: BoxedOperator, vars: Vec<VarId>) -> Self {
        Self { operator, vars }
    }
}

/// One step of a compiled join tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    /// Relation joined onto the tree
    pub relation: usize,
    /// Hashed join variable
    pub join_var: VarId,
    /// Further shared variables checked for equality
    pub unify_vars: Vec<VarId>,
}

/// Root of a compiled join tree
pub struct JoinTree {
    root: BoxedOperator,
    order: Vec<usize>,
    steps: Vec<JoinStep>,
}

impl JoinTree {
    /// Relations in the order they were added, the root relation first
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn steps(&self) -> &[JoinStep] {
        &self.steps
    }
}

#[async_trait]
impl Operator for JoinTree {
    fn part_query(&self) -> String {
        self.root.part_query()
    }

    async fn open(&mut self, ctx: &ExecutionContext<'_>) -> Result<()> {
        self.root.open(ctx).await
    }

    async fn has_next(&mut self, ctx: &ExecutionContext<'_>) -> Result<bool> {
        self.root.has_next(ctx).await
    }

    async fn next(&mut self, ctx: &ExecutionContext<'_>) -> Result<Answer> {
        self.root.next(ctx).await
    }

    fn close(&mut self) -> Result<()> {
        self.root.close()
    }
}

/// Compile relation streams into a rank-join tree
///
/// Fails with `InvalidPlan` for fewer than two inputs and with
/// `DisconnectedJoinGraph` when some relation shares no variable, directly or
/// transitively, with relation 0. On failure every input is closed.
pub fn compile_join_tree(inputs: Vec<JoinInput>) -> Result<JoinTree> {
    let span = tracing::debug_span!("join_tree_build", relations = inputs.len());
    let _guard = span.enter();

    let (mut operators, relation_vars): (Vec<BoxedOperator>, Vec<Vec<VarId>>) =
        inputs.into_iter().map(|i| (i.operator, i.vars)).unzip();

    if operators.len() < 2 {
        // Close failures are logged by close_all; the plan error wins.
        let _ = close_all(operators.iter_mut());
        return Err(QueryError::invalid_plan(format!(
            "a join tree needs at least two relations, got {}",
            operators.len()
        )));
    }

    let info = JoinInfo::new(relation_vars);
    let graph = JoinGraph::from_info(&info);

    let unreachable = graph.unreachable_from(0);
    if !unreachable.is_empty() {
        tracing::debug!(?unreachable, "join graph disconnected");
        let _ = close_all(operators.iter_mut());
        return Err(QueryError::DisconnectedJoinGraph { unreachable });
    }

    let order = graph.dfs_order(0);
    let (root, steps) = assemble(operators, &info, &order)?;
    Ok(JoinTree { root, order, steps })
}

/// Chain `operators` into a left-deep rank-join tree, adding relations in
/// `order`
///
/// Each relation after the first must share a variable with the ones added
/// before it. On failure the partial tree and every operator not yet joined
/// are closed.
fn assemble(
    operators: Vec<BoxedOperator>,
    info: &JoinInfo,
    order: &[usize],
) -> Result<(BoxedOperator, Vec<JoinStep>)> {
    let mut slots: Vec<Option<BoxedOperator>> = operators.into_iter().map(Some).collect();

    let Some((&first, rest)) = order.split_first() else {
        abandon(None, &mut slots);
        return Err(QueryError::Internal("empty join order".to_string()));
    };
    let Some(mut root) = slots.get_mut(first).and_then(Option::take) else {
        abandon(None, &mut slots);
        return Err(QueryError::Internal(format!(
            "root relation {} unavailable",
            first
        )));
    };

    let mut available: Vec<VarId> = info.vars_of(first).to_vec();
    let mut steps = Vec::with_capacity(rest.len());

    for &rel in rest {
        let vars = info.vars_of(rel);
        let shared: Vec<VarId> = vars
            .iter()
            .copied()
            .filter(|v| available.contains(v))
            .collect();
        let Some((&join_var, unify)) = shared.split_first() else {
            abandon(Some(&mut root), &mut slots);
            return Err(QueryError::Internal(format!(
                "relation {} reached without a shared variable",
                rel
            )));
        };
        let Some(right) = slots.get_mut(rel).and_then(Option::take) else {
            abandon(Some(&mut root), &mut slots);
            return Err(QueryError::Internal(format!(
                "relation {} visited twice",
                rel
            )));
        };

        tracing::debug!(
            relation = rel,
            join_var = join_var.0,
            unify_vars = unify.len(),
            "join step"
        );
        root = Box::new(RankJoin::new(root, right, join_var).with_unify_vars(unify.to_vec()));
        steps.push(JoinStep {
            relation: rel,
            join_var,
            unify_vars: unify.to_vec(),
        });

        for &v in vars {
            if !available.contains(&v) {
                available.push(v);
            }
        }
    }

    Ok((root, steps))
}

/// Close a partial tree and the operators still waiting to be joined
fn abandon<'a>(root: Option<&'a mut BoxedOperator>, slots: &'a mut [Option<BoxedOperator>]) {
    // Close failures are logged by close_all; the caller's error wins.
    let _ = close_all(root.into_iter().chain(slots.iter_mut().flatten()));
}
