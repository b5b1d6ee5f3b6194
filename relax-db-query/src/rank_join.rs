//! Binary rank join
//!
//! Hash rank join over two score-descending inputs (Ilyas et al., 2003).
//! Each step reads one tuple from one side, files it in that side's
//! [`JoinIndex`] and probes the other side's index. Joined tuples wait in a
//! max-heap until their score reaches the bound on anything not yet
//! computed:
//!
//! ```text
//! unseen_upper_bound = max(bottom_left + top_right, top_left + bottom_right)
//! ```
//!
//! The bound starts at +∞ and is only computed once both sides have read, so
//! nothing is emitted before then unless both inputs run dry.

use crate::answer::Answer;
use crate::context::ExecutionContext;
use crate::error::{QueryError, Result};
use crate::join_index::JoinIndex;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::options::DEFAULT_JOIN_SEED;
use crate::var_registry::VarId;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A computed join result waiting to be emitted
#[derive(Debug)]
struct Queued {
    /// Score at insertion
    score: f64,
    /// Insertion order; earlier wins ties
    seq: u64,
    answer: Answer,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Top-k join of two ranked streams on one variable
///
/// `unify_vars` are further variables both sides bind; a probe match is kept
/// only when they agree.
pub struct RankJoin {
    left: JoinIndex,
    right: JoinIndex,
    join_var: VarId,
    unify_vars: Vec<VarId>,
    queue: BinaryHeap<Queued>,
    next_seq: u64,
    unseen_upper_bound: f64,
    rng: StdRng,
    current: Option<Answer>,
    state: OperatorState,
}

impl RankJoin {
    pub fn new(left: BoxedOperator, right: BoxedOperator, join_var: VarId) -> Self {
        Self {
            left: JoinIndex::new(left, join_var),
            right: JoinIndex::new(right, join_var),
            join_var,
            unify_vars: Vec::new(),
            queue: BinaryHeap::new(),
            next_seq: 0,
            unseen_upper_bound: f64::INFINITY,
            rng: StdRng::seed_from_u64(DEFAULT_JOIN_SEED),
            current: None,
            state: OperatorState::Created,
        }
    }

    pub fn with_unify_vars(mut self, vars: Vec<VarId>) -> Self {
        self.unify_vars = vars;
        self
    }

    pub fn join_var(&self) -> VarId {
        self.join_var
    }

    pub fn unify_vars(&self) -> &[VarId] {
        &self.unify_vars
    }

    /// Bound on the score of any join result not yet computed
    pub fn unseen_upper_bound(&self) -> f64 {
        self.unseen_upper_bound
    }

    /// Tuples read from (left, right)
    pub fn reads(&self) -> (usize, usize) {
        (self.left.read_count(), self.right.read_count())
    }

    /// Pick the side to read; `None` when both are consumed
    async fn choose_side(&mut self, ctx: &ExecutionContext<'_>) -> Result<Option<Side>> {
        let left_open = !self.left.is_consumed(ctx).await?;
        let right_open = !self.right.is_consumed(ctx).await?;
        Ok(match (left_open, right_open) {
            (true, true) if self.rng.gen_bool(0.5) => Some(Side::Left),
            (true, true) => Some(Side::Right),
            (true, false) => Some(Side::Left),
            (false, true) => Some(Side::Right),
            (false, false) => None,
        })
    }

    /// Read one tuple from `side` and queue every join it completes
    async fn read_side(&mut self, side: Side, ctx: &ExecutionContext<'_>) -> Result<()> {
        let tuple = match side {
            Side::Left => self.left.read_next(ctx).await?,
            Side::Right => self.right.read_next(ctx).await?,
        };
        ctx.record_tuple_read();

        let other = match side {
            Side::Left => &self.right,
            Side::Right => &self.left,
        };
        if !other.has_read() {
            return Ok(());
        }

        let bound = (self.left.bottom() + self.right.top())
            .max(self.left.top() + self.right.bottom());
        if bound < self.unseen_upper_bound {
            tracing::trace!(
                from = self.unseen_upper_bound,
                to = bound,
                "unseen upper bound lowered"
            );
        }
        self.unseen_upper_bound = bound;

        let key = tuple.require(self.join_var)?;
        let mut joined = Vec::new();
        for matched in other.matches(key) {
            if unifies(&self.unify_vars, &tuple, matched)? {
                joined.push(Answer::joined(&tuple, matched)?);
            }
        }

        for answer in joined {
            ctx.record_answer();
            self.queue.push(Queued {
                score: answer.score(),
                seq: self.next_seq,
                answer,
            });
            self.next_seq += 1;
        }
        Ok(())
    }
}

/// Whether `a` and `b` bind every variable of `vars` to the same constant
fn unifies(vars: &[VarId], a: &Answer, b: &Answer) -> Result<bool> {
    for &var in vars {
        if a.require(var)? != b.require(var)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[async_trait]
impl Operator for RankJoin {
    fn part_query(&self) -> String {
        format!("{},{}", self.left.part_query(), self.right.part_query())
    }

    async fn open(&mut self, ctx: &ExecutionContext<'_>) -> Result<()> {
        if !self.state.begin_open()? {
            return Ok(());
        }
        self.left.open(ctx).await?;
        self.right.open(ctx).await?;

        self.rng = StdRng::seed_from_u64(ctx.join_seed);
        self.unseen_upper_bound = f64::INFINITY;
        self.state = OperatorState::Open;

        tracing::debug!(
            join_var = %ctx.var_name(self.join_var),
            unify_vars = ?self.unify_vars.iter().map(|v| ctx.var_name(*v)).collect::<Vec<_>>(),
            seed = ctx.join_seed,
            "rank join opened"
        );
        Ok(())
    }

    async fn has_next(&mut self, ctx: &ExecutionContext<'_>) -> Result<bool> {
        if !self.state.check_pull()? {
            return Ok(false);
        }

        loop {
            if self.current.is_some() {
                return Ok(true);
            }

            let drained =
                self.left.is_consumed(ctx).await? && self.right.is_consumed(ctx).await?;
            let head_ready = match self.queue.peek() {
                Some(head) => drained || head.score >= self.unseen_upper_bound,
                None => false,
            };

            if head_ready {
                self.current = self.queue.pop().map(|q| q.answer);
                continue;
            }

            match self.choose_side(ctx).await? {
                Some(side) => self.read_side(side, ctx).await?,
                None => {
                    let (left_reads, right_reads) = self.reads();
                    tracing::debug!(
                        part_query = %self.part_query(),
                        join_var = %ctx.var_name(self.join_var),
                        left_reads,
                        right_reads,
                        "rank join exhausted"
                    );
                    self.state = OperatorState::Exhausted;
                    return Ok(false);
                }
            }
        }
    }

    async fn next(&mut self, ctx: &ExecutionContext<'_>) -> Result<Answer> {
        if !self.has_next(ctx).await? {
            return Err(QueryError::NoElement);
        }
        self.current.take().ok_or(QueryError::NoElement)
    }

    fn close(&mut self) -> Result<()> {
        if self.state.is_closed() {
            return Ok(());
        }
        self.state = OperatorState::Closed;
        self.queue.clear();
        self.current = None;

        let left = self.left.close();
        let right = self.right.close();
        left.and(right)
    }
}
