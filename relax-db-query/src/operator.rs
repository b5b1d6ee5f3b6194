//! Operator trait and base types for query execution
//!
//! Operators form a tree that produces scored answers one at a time through
//! the `open/has_next/next/close` lifecycle. Every operator yields answers in
//! non-increasing score order; consumers rely on this to bound unread input.

use crate::answer::Answer;
use crate::context::ExecutionContext;
use crate::error::{QueryError, Result};
use async_trait::async_trait;

/// Pull-based scored stream
///
/// Lifecycle:
/// 1. `open()` - Initialize state, open children. Idempotent while open.
/// 2. `has_next()` / `next()` - Pull answers until `has_next()` is false
/// 3. `close()` - Release resources. Idempotent, safe before `open()`.
///
/// `has_next()` may read from the source, but calling it repeatedly without
/// an intervening `next()` has no further effect. `next()` once the stream
/// has nothing left fails with `QueryError::NoElement`.
#[async_trait]
pub trait Operator: Send + Sync {
    /// The sub-query this stream answers, for diagnostics
    fn part_query(&self) -> String;

    /// Initialize operator state
    async fn open(&mut self, ctx: &ExecutionContext<'_>) -> Result<()>;

    /// Whether another answer is available
    async fn has_next(&mut self, ctx: &ExecutionContext<'_>) -> Result<bool>;

    /// Consume the answer confirmed by `has_next()`
    async fn next(&mut self, ctx: &ExecutionContext<'_>) -> Result<Answer>;

    /// Release resources
    ///
    /// Closes every child even if one of them fails; the first failure is
    /// returned once all children were attempted.
    fn close(&mut self) -> Result<()>;

    /// Pull the next answer, or `None` once exhausted
    async fn next_answer(&mut self, ctx: &ExecutionContext<'_>) -> Result<Option<Answer>> {
        if self.has_next(ctx).await? {
            Ok(Some(self.next(ctx).await?))
        } else {
            Ok(None)
        }
    }
}

/// Boxed operator for dynamic dispatch
pub type BoxedOperator = Box<dyn Operator + Send + Sync>;

/// Operator state for lifecycle tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    /// Not yet opened
    Created,
    /// Opened and ready to produce answers
    Open,
    /// Exhausted (has_next returned false)
    Exhausted,
    /// Closed
    Closed,
}

impl OperatorState {
    /// Check if operator can be opened
    pub fn can_open(&self) -> bool {
        matches!(self, OperatorState::Created)
    }

    /// Check if operator is closed
    pub fn is_closed(&self) -> bool {
        matches!(self, OperatorState::Closed)
    }

    /// Decide what `open()` should do in this state.
    ///
    /// Returns `Ok(true)` when the caller must perform the actual open,
    /// `Ok(false)` when already open.
    pub fn begin_open(&self) -> Result<bool> {
        match self {
            OperatorState::Created => Ok(true),
            OperatorState::Open | OperatorState::Exhausted => Ok(false),
            OperatorState::Closed => Err(QueryError::OperatorClosed),
        }
    }

    /// Guard for `has_next()`/`next()`.
    ///
    /// Returns `Ok(false)` when the operator cannot produce anything more
    /// (exhausted), `Ok(true)` when it is open and may produce.
    pub fn check_pull(&self) -> Result<bool> {
        match self {
            OperatorState::Created => Err(QueryError::OperatorNotOpened),
            OperatorState::Open => Ok(true),
            OperatorState::Exhausted => Ok(false),
            OperatorState::Closed => Err(QueryError::OperatorClosed),
        }
    }
}

/// Close every operator, returning the first failure after all were attempted.
pub fn close_all<'a, I>(operators: I) -> Result<()>
where
    I: IntoIterator<Item = &'a mut BoxedOperator>,
{
    let mut first_err = None;
    for op in operators {
        if let Err(e) = op.close() {
            tracing::debug!(error = %e, part_query = %op.part_query(), "close failed");
            first_err.get_or_insert(e);
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
