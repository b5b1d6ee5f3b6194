//! Limit operator for top-k retrieval
//!
//! The `LimitOperator` stops producing answers after a specified number have
//! been emitted. Since every stream is ranked, the first k answers are the
//! top k.

use crate::answer::Answer;
use crate::context::ExecutionContext;
use crate::error::{QueryError, Result};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use async_trait::async_trait;

/// Limit operator - stops after emitting N answers
///
/// Wraps a child operator and emits at most N answers, even if the child
/// produces more. The child is not pulled once the limit is reached.
pub struct LimitOperator {
    /// Child operator
    child: BoxedOperator,
    /// Maximum answers to emit
    limit: usize,
    /// Answers emitted so far
    emitted: usize,
    /// Operator state
    state: OperatorState,
}

impl LimitOperator {
    /// Create a new limit operator
    ///
    /// # Arguments
    ///
    /// * `child` - The child operator to limit
    /// * `limit` - Maximum number of answers to emit
    pub fn new(child: BoxedOperator, limit: usize) -> Self {
        Self {
            child,
            limit,
            emitted: 0,
            state: OperatorState::Created,
        }
    }

    /// Get the limit value
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Get the number of answers emitted so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

#[async_trait]
impl Operator for LimitOperator {
    fn part_query(&self) -> String {
        self.child.part_query()
    }

    async fn open(&mut self, ctx: &ExecutionContext<'_>) -> Result<()> {
        if !self.state.begin_open()? {
            return Ok(());
        }
        self.child.open(ctx).await?;
        self.emitted = 0;
        self.state = OperatorState::Open;
        Ok(())
    }

    async fn has_next(&mut self, ctx: &ExecutionContext<'_>) -> Result<bool> {
        if !self.state.check_pull()? {
            return Ok(false);
        }

        // Already hit limit
        if self.emitted >= self.limit {
            self.state = OperatorState::Exhausted;
            return Ok(false);
        }

        if !self.child.has_next(ctx).await? {
            self.state = OperatorState::Exhausted;
            return Ok(false);
        }
        Ok(true)
    }

    async fn next(&mut self, ctx: &ExecutionContext<'_>) -> Result<Answer> {
        if !self.has_next(ctx).await? {
            return Err(QueryError::NoElement);
        }
        let answer = self.child.next(ctx).await?;
        self.emitted += 1;
        Ok(answer)
    }

    fn close(&mut self) -> Result<()> {
        if self.state.is_closed() {
            return Ok(());
        }
        self.state = OperatorState::Closed;
        self.child.close()
    }
}
