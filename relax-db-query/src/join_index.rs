//! Per-side hash index of a rank join
//!
//! A `JoinIndex` owns one input of a binary rank join. Every tuple read from
//! the input is filed under its binding of the join variable before it is
//! used to probe the other side, and the index remembers the first and most
//! recent scores read, which bound what the side can still produce.

use crate::answer::Answer;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::operator::BoxedOperator;
use crate::var_registry::VarId;
use std::collections::HashMap;
use std::sync::Arc;

pub struct JoinIndex {
    input: BoxedOperator,
    join_var: VarId,
    table: HashMap<Arc<str>, Vec<Answer>>,
    /// Score of the first tuple read
    top: f64,
    /// Score of the most recent tuple read
    bottom: f64,
    has_read: bool,
    read_count: usize,
}

impl JoinIndex {
    pub fn new(input: BoxedOperator, join_var: VarId) -> Self {
        Self {
            input,
            join_var,
            table: HashMap::new(),
            top: 0.0,
            bottom: 0.0,
            has_read: false,
            read_count: 0,
        }
    }

    pub async fn open(&mut self, ctx: &ExecutionContext<'_>) -> Result<()> {
        self.input.open(ctx).await
    }

    /// True once the wrapped input has nothing left
    pub async fn is_consumed(&mut self, ctx: &ExecutionContext<'_>) -> Result<bool> {
        Ok(!self.input.has_next(ctx).await?)
    }

    /// Read the next tuple, index it, and return it
    ///
    /// A tuple without a binding for the join variable is an invariant
    /// violation: the input does not expose the variable it is joined on.
    pub async fn read_next(&mut self, ctx: &ExecutionContext<'_>) -> Result<Answer> {
        let tuple = self.input.next(ctx).await?;
        let key = Arc::clone(tuple.require(self.join_var)?);

        let score = tuple.score();
        if !self.has_read {
            self.top = score;
            self.has_read = true;
        }
        self.bottom = score;
        self.read_count += 1;

        self.table.entry(key).or_default().push(tuple.clone());
        Ok(tuple)
    }

    /// Tuples read so far whose join variable is bound to `value`
    pub fn matches(&self, value: &str) -> &[Answer] {
        self.table.get(value).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    pub fn has_read(&self) -> bool {
        self.has_read
    }

    pub fn read_count(&self) -> usize {
        self.read_count
    }

    pub fn join_var(&self) -> VarId {
        self.join_var
    }

    pub fn part_query(&self) -> String {
        self.input.part_query()
    }

    /// Drop indexed tuples and close the input
    pub fn close(&mut self) -> Result<()> {
        self.table = HashMap::new();
        self.input.close()
    }
}
