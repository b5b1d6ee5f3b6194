//! Weighted stream
//!
//! Wraps a scored stream and multiplies every score by a fixed weight. The
//! stream advertises an upper bound (`high`) on the score of anything it may
//! still produce, which the weighted merge uses to decide which stream to
//! read next.

use crate::answer::Answer;
use crate::context::ExecutionContext;
use crate::error::{QueryError, Result};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use async_trait::async_trait;

/// Stream rescored by `weight`, with one answer of look-ahead
pub struct WeightedStream {
    inner: BoxedOperator,
    weight: f64,
    initial_bound: f64,
    /// First unconsumed answer of `inner`, already rescored
    buffered: Option<Answer>,
    high: f64,
    state: OperatorState,
}

impl WeightedStream {
    /// `initial_bound` bounds the raw scores of `inner` before anything was read
    pub fn new(inner: BoxedOperator, initial_bound: f64, weight: f64) -> Self {
        Self {
            inner,
            weight,
            initial_bound,
            buffered: None,
            high: weight * initial_bound,
            state: OperatorState::Created,
        }
    }

    /// Upper bound on the score of the next answer
    ///
    /// `weight × initial_bound` before `open`, `weight × score` of the
    /// buffered answer while one exists, `-∞` once exhausted.
    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn initial_bound(&self) -> f64 {
        self.initial_bound
    }

    pub fn is_opened(&self) -> bool {
        !self.state.can_open()
    }

    /// Pull the next inner answer into the buffer and update `high`
    async fn fill(&mut self, ctx: &ExecutionContext<'_>) -> Result<()> {
        match self.inner.next_answer(ctx).await? {
            Some(answer) => {
                let score = answer.score() * self.weight;
                let mut answer = answer.with_score(score);
                if self.weight != 1.0 {
                    answer = answer.marked_relaxed();
                }
                self.high = score;
                self.buffered = Some(answer);
            }
            None => {
                self.high = f64::NEG_INFINITY;
                self.buffered = None;
                self.state = OperatorState::Exhausted;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Operator for WeightedStream {
    fn part_query(&self) -> String {
        self.inner.part_query()
    }

    async fn open(&mut self, ctx: &ExecutionContext<'_>) -> Result<()> {
        if !self.state.begin_open()? {
            return Ok(());
        }
        self.inner.open(ctx).await?;
        self.state = OperatorState::Open;
        self.fill(ctx).await
    }

    async fn has_next(&mut self, _ctx: &ExecutionContext<'_>) -> Result<bool> {
        if !self.state.check_pull()? {
            return Ok(false);
        }
        Ok(self.buffered.is_some())
    }

    async fn next(&mut self, ctx: &ExecutionContext<'_>) -> Result<Answer> {
        self.state.check_pull()?;
        let answer = self.buffered.take().ok_or(QueryError::NoElement)?;
        self.fill(ctx).await?;
        Ok(answer)
    }

    fn close(&mut self) -> Result<()> {
        if self.state.is_closed() {
            return Ok(());
        }
        self.buffered = None;
        self.high = f64::NEG_INFINITY;
        self.state = OperatorState::Closed;
        self.inner.close()
    }
}
