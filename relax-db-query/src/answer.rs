//! Scored answers
//!
//! An `Answer` maps variables to bound constants and carries the score used
//! for ranking. Equality and hashing look only at the bindings, so two
//! answers with the same bindings but different scores are "the same
//! answer" for deduplication.

use crate::error::{QueryError, Result};
use crate::var_registry::VarId;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A set of variable bindings with a ranking score
///
/// Built by scans, rescored by weighted streams and combined by joins. Each
/// of those produces a new value; an answer handed to a consumer is never
/// changed afterwards.
#[derive(Debug, Clone)]
pub struct Answer {
    bindings: BTreeMap<VarId, Arc<str>>,
    score: f64,
    /// Score of the join that produced this answer, if any input defined one
    join_score: Option<f64>,
    from_relaxation: bool,
    /// Sub-query text of the operator(s) that produced this answer
    query: Arc<str>,
}

impl Answer {
    /// Create an empty answer for the given sub-query, scored 0.
    pub fn new(query: impl Into<Arc<str>>) -> Self {
        Self {
            bindings: BTreeMap::new(),
            score: 0.0,
            join_score: None,
            from_relaxation: false,
            query: query.into(),
        }
    }

    /// Bind `var` to `value`.
    ///
    /// Binding a variable again to the same constant is a no-op; binding it
    /// to a different constant fails with `BindingConflict`.
    pub fn bind(&mut self, var: VarId, value: impl Into<Arc<str>>) -> Result<()> {
        let value = value.into();
        if let Some(existing) = self.bindings.get(&var) {
            if *existing == value {
                return Ok(());
            }
            return Err(QueryError::BindingConflict {
                var,
                existing: existing.to_string(),
                attempted: value.to_string(),
            });
        }
        self.bindings.insert(var, value);
        Ok(())
    }

    /// Builder form of [`Answer::bind`].
    pub fn with_binding(mut self, var: VarId, value: impl Into<Arc<str>>) -> Result<Self> {
        self.bind(var, value)?;
        Ok(self)
    }

    pub fn get(&self, var: VarId) -> Option<&Arc<str>> {
        self.bindings.get(&var)
    }

    /// Get the binding for `var`, treating a missing binding as a join
    /// invariant violation.
    pub fn require(&self, var: VarId) -> Result<&Arc<str>> {
        self.bindings
            .get(&var)
            .ok_or_else(|| QueryError::UnboundJoinVariable {
                var,
                query: self.query.to_string(),
            })
    }

    /// Bound variables, in VarId order
    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.bindings.keys().copied()
    }

    pub fn bindings(&self) -> &BTreeMap<VarId, Arc<str>> {
        &self.bindings
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn join_score(&self) -> Option<f64> {
        self.join_score
    }

    pub fn with_join_score(mut self, join_score: f64) -> Self {
        self.join_score = Some(join_score);
        self
    }

    /// True if a relaxation contributed to this answer
    pub fn comes_from_relaxation(&self) -> bool {
        self.from_relaxation
    }

    pub fn marked_relaxed(mut self) -> Self {
        self.from_relaxation = true;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Combine a newly read tuple with a tuple matched from the other join side.
    ///
    /// Bindings are unioned, scores summed, and the join score is taken from
    /// `new` when it defines one, otherwise from `matched`.
    pub fn joined(new: &Answer, matched: &Answer) -> Result<Answer> {
        let mut bindings = new.bindings.clone();
        for (var, value) in &matched.bindings {
            match bindings.get(var) {
                Some(existing) if existing != value => {
                    return Err(QueryError::BindingConflict {
                        var: *var,
                        existing: existing.to_string(),
                        attempted: value.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    bindings.insert(*var, value.clone());
                }
            }
        }

        Ok(Answer {
            bindings,
            score: new.score + matched.score,
            join_score: new.join_score.or(matched.join_score),
            from_relaxation: new.from_relaxation || matched.from_relaxation,
            query: Arc::from(format!("{},{}", new.query, matched.query)),
        })
    }
}

impl PartialEq for Answer {
    fn eq(&self, other: &Self) -> bool {
        self.bindings == other.bindings
    }
}

impl Eq for Answer {}

impl Hash for Answer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bindings.hash(state);
    }
}
