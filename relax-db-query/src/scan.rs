//! Scan operators
//!
//! Scans are the leaves of every plan. The [`ScanProvider`] trait is the
//! factory the plan compiler asks for one stream per triple pattern, whether
//! the pattern is an original atom or a relaxation of one.
//!
//! Two implementations live here:
//! - [`MemoryStore`] / [`MemoryScan`]: scored triples held in memory, matched
//!   against a pattern and normalised so the best match scores 1
//! - [`ListScan`]: a fixed list of answers, for callers that already hold
//!   their results

use crate::answer::Answer;
use crate::context::ExecutionContext;
use crate::error::{QueryError, Result};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::pattern::{Term, TriplePattern};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;

/// Factory for pattern scans
pub trait ScanProvider: Send + Sync {
    /// Create an unopened stream over the matches of `pattern`, in
    /// non-increasing score order
    fn scan(&self, pattern: &TriplePattern) -> Result<BoxedOperator>;
}

/// A triple with a popularity score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTriple {
    pub s: Arc<str>,
    pub p: Arc<str>,
    pub o: Arc<str>,
    pub score: f64,
}

/// In-memory triple store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    triples: Arc<Vec<ScoredTriple>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a triple; scores must be finite and non-negative
    pub fn insert(
        &mut self,
        s: impl Into<Arc<str>>,
        p: impl Into<Arc<str>>,
        o: impl Into<Arc<str>>,
        score: f64,
    ) -> Result<()> {
        if !score.is_finite() || score < 0.0 {
            return Err(QueryError::source(format!(
                "triple score {} is not a finite non-negative number",
                score
            )));
        }
        Arc::make_mut(&mut self.triples).push(ScoredTriple {
            s: s.into(),
            p: p.into(),
            o: o.into(),
            score,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
}

impl ScanProvider for MemoryStore {
    fn scan(&self, pattern: &TriplePattern) -> Result<BoxedOperator> {
        Ok(Box::new(MemoryScan::new(
            Arc::clone(&self.triples),
            pattern.clone(),
        )))
    }
}

/// Scan of one pattern over a [`MemoryStore`] snapshot
///
/// Matches are found and ordered on `open`; answers are materialised one at a
/// time as they are pulled.
pub struct MemoryScan {
    triples: Arc<Vec<ScoredTriple>>,
    pattern: TriplePattern,
    /// (triple index, raw score), best first
    matches: Vec<(usize, f64)>,
    pos: usize,
    /// 1 / best raw score
    multiplier: f64,
    current: Option<Answer>,
    state: OperatorState,
}

impl MemoryScan {
    fn new(triples: Arc<Vec<ScoredTriple>>, pattern: TriplePattern) -> Self {
        Self {
            triples,
            pattern,
            matches: Vec::new(),
            pos: 0,
            multiplier: 1.0,
            current: None,
            state: OperatorState::Created,
        }
    }

    /// Bind the pattern against a triple; `None` if a constant differs or a
    /// repeated variable would bind to two values.
    fn bind(&self, triple: &ScoredTriple) -> Option<Answer> {
        let mut answer = Answer::new(self.pattern.text());
        for (term, value) in [
            (&self.pattern.s, &triple.s),
            (&self.pattern.p, &triple.p),
            (&self.pattern.o, &triple.o),
        ] {
            match term {
                Term::Var(v) => answer.bind(*v, Arc::clone(value)).ok()?,
                Term::Iri(c) | Term::Literal(c) if c == value => {}
                Term::Iri(_) | Term::Literal(_) => return None,
            }
        }
        Some(answer)
    }
}

#[async_trait]
impl Operator for MemoryScan {
    fn part_query(&self) -> String {
        self.pattern.text().to_string()
    }

    async fn open(&mut self, _ctx: &ExecutionContext<'_>) -> Result<()> {
        if !self.state.begin_open()? {
            return Ok(());
        }

        let mut matches: Vec<(usize, f64)> = self
            .triples
            .iter()
            .enumerate()
            .filter(|(_, t)| self.bind(t).is_some())
            .map(|(i, t)| (i, t.score))
            .collect();
        // Stable: equal scores keep insertion order.
        matches.sort_by(|a, b| b.1.total_cmp(&a.1));

        let best = matches.first().map(|m| m.1).unwrap_or(0.0);
        self.multiplier = if best > 0.0 { 1.0 / best } else { 1.0 };
        tracing::trace!(
            pattern = %self.pattern,
            matches = matches.len(),
            best,
            "memory scan opened"
        );

        self.matches = matches;
        self.pos = 0;
        self.state = OperatorState::Open;
        Ok(())
    }

    async fn has_next(&mut self, ctx: &ExecutionContext<'_>) -> Result<bool> {
        if !self.state.check_pull()? {
            return Ok(false);
        }
        if self.current.is_some() {
            return Ok(true);
        }

        while let Some(&(idx, raw)) = self.matches.get(self.pos) {
            self.pos += 1;
            if let Some(answer) = self.bind(&self.triples[idx]) {
                ctx.record_answer();
                self.current = Some(answer.with_score(raw * self.multiplier));
                return Ok(true);
            }
        }

        self.state = OperatorState::Exhausted;
        Ok(false)
    }

    async fn next(&mut self, ctx: &ExecutionContext<'_>) -> Result<Answer> {
        if !self.has_next(ctx).await? {
            return Err(QueryError::NoElement);
        }
        self.current.take().ok_or(QueryError::NoElement)
    }

    fn close(&mut self) -> Result<()> {
        self.matches = Vec::new();
        self.current = None;
        self.state = OperatorState::Closed;
        Ok(())
    }
}

/// Stream over a fixed set of answers, in non-increasing score order
pub struct ListScan {
    label: String,
    answers: VecDeque<Answer>,
    state: OperatorState,
}

impl ListScan {
    pub fn new(label: impl Into<String>, mut answers: Vec<Answer>) -> Self {
        answers.sort_by(|a, b| b.score().total_cmp(&a.score()));
        Self {
            label: label.into(),
            answers: answers.into(),
            state: OperatorState::Created,
        }
    }
}

#[async_trait]
impl Operator for ListScan {
    fn part_query(&self) -> String {
        self.label.clone()
    }

    async fn open(&mut self, _ctx: &ExecutionContext<'_>) -> Result<()> {
        if self.state.begin_open()? {
            self.state = OperatorState::Open;
        }
        Ok(())
    }

    async fn has_next(&mut self, _ctx: &ExecutionContext<'_>) -> Result<bool> {
        if !self.state.check_pull()? {
            return Ok(false);
        }
        if self.answers.is_empty() {
            self.state = OperatorState::Exhausted;
            return Ok(false);
        }
        Ok(true)
    }

    async fn next(&mut self, ctx: &ExecutionContext<'_>) -> Result<Answer> {
        if !self.has_next(ctx).await? {
            return Err(QueryError::NoElement);
        }
        self.answers.pop_front().ok_or(QueryError::NoElement)
    }

    fn close(&mut self) -> Result<()> {
        self.answers.clear();
        self.state = OperatorState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecStats;
    use crate::var_registry::VarRegistry;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert("<alice>", "<type>", "<singer>", 40.0).unwrap();
        store.insert("<bob>", "<type>", "<singer>", 80.0).unwrap();
        store.insert("<carol>", "<type>", "<actor>", 100.0).unwrap();
        store.insert("<dave>", "<type>", "<singer>", 20.0).unwrap();
        store.insert("<eve>", "<knows>", "<eve>", 5.0).unwrap();
        store.insert("<eve>", "<knows>", "<bob>", 9.0).unwrap();
        store
    }

    async fn drain(op: &mut BoxedOperator, ctx: &ExecutionContext<'_>) -> Vec<Answer> {
        let mut out = Vec::new();
        while let Some(a) = op.next_answer(ctx).await.unwrap() {
            out.push(a);
        }
        out
    }

    #[tokio::test]
    async fn test_memory_scan_orders_and_normalises() {
        let mut vars = VarRegistry::new();
        let x = vars.get_or_insert("?x");
        let tp = TriplePattern::named(
            Term::Var(x),
            Term::Iri(Arc::from("<type>")),
            Term::Iri(Arc::from("<singer>")),
            &vars,
        );
        let stats = ExecStats::new();
        let ctx = ExecutionContext::new().with_stats(&stats);

        let mut scan = store().scan(&tp).unwrap();
        scan.open(&ctx).await.unwrap();
        let answers = drain(&mut scan, &ctx).await;

        let names: Vec<&str> = answers.iter().map(|a| a.get(x).unwrap().as_ref()).collect();
        assert_eq!(names, vec!["<bob>", "<alice>", "<dave>"]);
        let scores: Vec<f64> = answers.iter().map(Answer::score).collect();
        assert_eq!(scores, vec![1.0, 0.5, 0.25]);
        assert!(answers.iter().all(|a| a.query() == "?x <type> <singer>"));
        assert_eq!(stats.answers_created(), 3);
        scan.close().unwrap();
    }

    #[tokio::test]
    async fn test_memory_scan_repeated_variable() {
        let mut vars = VarRegistry::new();
        let x = vars.get_or_insert("?x");
        let tp = TriplePattern::named(Term::Var(x), Term::Iri(Arc::from("<knows>")), Term::Var(x), &vars);
        let ctx = ExecutionContext::new();

        let mut scan = store().scan(&tp).unwrap();
        scan.open(&ctx).await.unwrap();
        let answers = drain(&mut scan, &ctx).await;
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].get(x).unwrap().as_ref(), "<eve>");
        // Normalised against matching triples only.
        assert_eq!(answers[0].score(), 1.0);
    }

    #[tokio::test]
    async fn test_memory_scan_no_match() {
        let tp = TriplePattern::new(
            Term::Var(crate::var_registry::VarId(0)),
            Term::Iri(Arc::from("<missing>")),
            Term::Var(crate::var_registry::VarId(1)),
        );
        let ctx = ExecutionContext::new();
        let mut scan = store().scan(&tp).unwrap();
        scan.open(&ctx).await.unwrap();
        assert!(!scan.has_next(&ctx).await.unwrap());
        assert!(!scan.has_next(&ctx).await.unwrap());
        assert_eq!(scan.next(&ctx).await.unwrap_err(), QueryError::NoElement);
    }

    #[tokio::test]
    async fn test_scan_protocol_errors() {
        let ctx = ExecutionContext::new();
        let mut scan = ListScan::new("empty", Vec::new());
        assert_eq!(
            scan.has_next(&ctx).await.unwrap_err(),
            QueryError::OperatorNotOpened
        );
        scan.open(&ctx).await.unwrap();
        scan.open(&ctx).await.unwrap();
        scan.close().unwrap();
        scan.close().unwrap();
        assert_eq!(scan.open(&ctx).await.unwrap_err(), QueryError::OperatorClosed);
    }

    #[tokio::test]
    async fn test_list_scan_sorts_descending() {
        let ctx = ExecutionContext::new();
        let answers = vec![
            Answer::new("l").with_score(0.2),
            Answer::new("l").with_score(0.9),
            Answer::new("l").with_score(0.5),
        ];
        let mut scan: BoxedOperator = Box::new(ListScan::new("l", answers));
        scan.open(&ctx).await.unwrap();
        let scores: Vec<f64> = drain(&mut scan, &ctx).await.iter().map(Answer::score).collect();
        assert_eq!(scores, vec![0.9, 0.5, 0.2]);
    }

    #[test]
    fn test_store_rejects_bad_scores() {
        let mut store = MemoryStore::new();
        assert!(store.insert("a", "b", "c", f64::NAN).is_err());
        assert!(store.insert("a", "b", "c", -1.0).is_err());
        assert!(store.is_empty());
    }
}
