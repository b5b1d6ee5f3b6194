//! Weighted merge of an atom's original scan with its relaxations
//!
//! The merge yields the union of its inputs in non-increasing score order,
//! emitting each binding set once. Streams are kept in two max-heaps keyed by
//! a snapshot of their `high` bound:
//!
//! - *parked*: streams not currently competing, including every stream that
//!   was never opened
//! - *active*: opened streams whose `high` is exact
//!
//! plus a single look-ahead slot holding the best parked stream. A step pops
//! the best active stream; if its bound falls below the look-ahead bound, it
//! is parked and the look-ahead stream is promoted (and opened, if needed).
//! The original is always read, so `open` advances it eagerly and it competes
//! with its exact bound from the start; scores need not be normalised.
//! Relaxations whose bound never becomes competitive are never opened.

use crate::answer::Answer;
use crate::context::ExecutionContext;
use crate::error::{QueryError, Result};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::weighted::WeightedStream;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Weight of the original (unrelaxed) stream
pub const ORIGINAL_WEIGHT: f64 = 1.0;

/// Score bound of the original stream until `open` reads its first answer
pub const ORIGINAL_INITIAL_BOUND: f64 = 1.0;

/// Heap entry: a stream slot and its `high` at insertion time
#[derive(Debug, Clone, Copy)]
struct Candidate {
    high: f64,
    slot: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    /// Higher bound first; on ties the lower slot (the original is slot 0)
    fn cmp(&self, other: &Self) -> Ordering {
        self.high
            .total_cmp(&other.high)
            .then_with(|| other.slot.cmp(&self.slot))
    }
}

/// A relaxation input of the merge
pub struct MergeInput {
    pub operator: BoxedOperator,
    pub weight: f64,
    pub initial_bound: f64,
}

impl MergeInput {
    pub fn new(operator: BoxedOperator, weight: f64, initial_bound: f64) -> Self {
        Self {
            operator,
            weight,
            initial_bound,
        }
    }
}

/// Ranked, deduplicated union of an original stream and its relaxations
pub struct WeightedMerge {
    /// Slot 0 is the original
    streams: Vec<WeightedStream>,
    parked: BinaryHeap<Candidate>,
    active: BinaryHeap<Candidate>,
    next_best: Option<Candidate>,
    /// Answer confirmed by `has_next`, not yet consumed
    current: Option<Answer>,
    seen: HashSet<Answer>,
    state: OperatorState,
}

impl WeightedMerge {
    pub fn new(original: BoxedOperator, relaxations: Vec<MergeInput>) -> Self {
        let mut streams = Vec::with_capacity(relaxations.len() + 1);
        streams.push(WeightedStream::new(
            original,
            ORIGINAL_INITIAL_BOUND,
            ORIGINAL_WEIGHT,
        ));
        streams.extend(
            relaxations
                .into_iter()
                .map(|r| WeightedStream::new(r.operator, r.initial_bound, r.weight)),
        );

        Self {
            streams,
            parked: BinaryHeap::new(),
            active: BinaryHeap::new(),
            next_best: None,
            current: None,
            seen: HashSet::new(),
            state: OperatorState::Created,
        }
    }

    /// Number of merged streams, the original included
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Number of streams opened so far
    pub fn opened_count(&self) -> usize {
        self.streams.iter().filter(|s| s.is_opened()).count()
    }

    fn next_best_high(&self) -> f64 {
        self.next_best.map_or(f64::NEG_INFINITY, |c| c.high)
    }

    fn refill_look_ahead(&mut self) {
        self.next_best = self.parked.pop();
    }

    /// Choose the stream to read next, or `None` when every stream is done
    fn select(&mut self) -> Option<usize> {
        match self.active.pop() {
            Some(best) if best.high < self.next_best_high() => {
                let promoted = self.next_best.take()?;
                self.parked.push(best);
                self.refill_look_ahead();
                Some(promoted.slot)
            }
            Some(best) => Some(best.slot),
            None => {
                let promoted = self.next_best.take()?;
                self.refill_look_ahead();
                Some(promoted.slot)
            }
        }
    }
}

#[async_trait]
impl Operator for WeightedMerge {
    fn part_query(&self) -> String {
        self.streams
            .first()
            .map(|s| s.part_query())
            .unwrap_or_default()
    }

    async fn open(&mut self, ctx: &ExecutionContext<'_>) -> Result<()> {
        if !self.state.begin_open()? {
            return Ok(());
        }
        if let Some(original) = self.streams.first_mut() {
            original.open(ctx).await?;
        }

        self.parked = self
            .streams
            .iter()
            .enumerate()
            .map(|(slot, s)| Candidate {
                high: s.high(),
                slot,
            })
            .collect();
        self.active.extend(self.parked.pop());
        self.refill_look_ahead();
        self.state = OperatorState::Open;

        tracing::debug!(
            part_query = %self.part_query(),
            streams = self.streams.len(),
            "weighted merge opened"
        );
        Ok(())
    }

    async fn has_next(&mut self, ctx: &ExecutionContext<'_>) -> Result<bool> {
        if !self.state.check_pull()? {
            return Ok(false);
        }

        // Each pass either emits, drops a duplicate, opens a stream, or
        // retires an exhausted one.
        loop {
            if self.current.is_some() {
                return Ok(true);
            }

            let Some(slot) = self.select() else {
                self.state = OperatorState::Exhausted;
                return Ok(false);
            };
            let stream = &mut self.streams[slot];

            if !stream.is_opened() {
                stream.open(ctx).await?;
                // The bound is exact now; compete again with it.
                self.active.push(Candidate {
                    high: stream.high(),
                    slot,
                });
                continue;
            }

            if !stream.has_next(ctx).await? {
                tracing::trace!(slot, "merge input exhausted");
                stream.close()?;
                continue;
            }

            let answer = stream.next(ctx).await?;
            self.active.push(Candidate {
                high: stream.high(),
                slot,
            });

            if self.seen.contains(&answer) {
                tracing::trace!(slot, score = answer.score(), "duplicate dropped");
                continue;
            }
            self.seen.insert(answer.clone());
            self.current = Some(answer);
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
        self.parked.clear();
        self.active.clear();
        self.next_best = None;
        self.current = None;
        self.seen.clear();

        let mut first_err = None;
        for stream in &mut self.streams {
            if let Err(e) = stream.close() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
