//! Logical query plans
//!
//! A logical plan partitions the atoms of a query into groups. A *relaxed*
//! group is a single atom answered by merging the atom's own scan with scans
//! of its relaxations; an *unrelaxed* group is answered by plain scans of
//! each of its atoms. The [`PlanCompiler`](crate::compile::PlanCompiler)
//! turns a plan into an operator tree.

use crate::error::{QueryError, Result};
use crate::parse::Query;
use crate::pattern::TriplePattern;
use std::collections::HashMap;

/// An alternative pattern for an atom, with its weight in (0, 1] and an upper
/// bound on the raw scores of its scan
#[derive(Debug, Clone, PartialEq)]
pub struct Relaxation {
    pub pattern: TriplePattern,
    pub weight: f64,
    pub initial_bound: f64,
}

impl Relaxation {
    /// Relaxation with the default initial bound of 1 (normalised scans)
    pub fn new(pattern: TriplePattern, weight: f64) -> Self {
        Self {
            pattern,
            weight,
            initial_bound: 1.0,
        }
    }

    pub fn with_initial_bound(mut self, bound: f64) -> Self {
        self.initial_bound = bound;
        self
    }

    /// Check the weight is finite and in (0, 1] and the initial bound is
    /// finite and non-negative
    pub fn validate(&self) -> Result<()> {
        if !self.weight.is_finite() || self.weight <= 0.0 || self.weight > 1.0 {
            return Err(QueryError::invalid_plan(format!(
                "relaxation '{}' has weight {} outside (0, 1]",
                self.pattern, self.weight
            )));
        }
        if !self.initial_bound.is_finite() || self.initial_bound < 0.0 {
            return Err(QueryError::invalid_plan(format!(
                "relaxation '{}' has initial bound {}, expected a finite non-negative score",
                self.pattern, self.initial_bound
            )));
        }
        Ok(())
    }
}

/// One partition of a plan
#[derive(Debug, Clone, PartialEq)]
pub enum AtomGroup {
    /// A single atom merged with its relaxations
    Relaxed {
        atom: TriplePattern,
        relaxations: Vec<Relaxation>,
    },
    /// Atoms scanned as-is
    Unrelaxed(Vec<TriplePattern>),
}

impl AtomGroup {
    /// Atoms of this group (the original atom only, for a relaxed group)
    pub fn atoms(&self) -> &[TriplePattern] {
        match self {
            AtomGroup::Relaxed { atom, .. } => std::slice::from_ref(atom),
            AtomGroup::Unrelaxed(atoms) => atoms,
        }
    }

    pub fn is_relaxed(&self) -> bool {
        matches!(self, AtomGroup::Relaxed { .. })
    }
}

/// How a plan was derived from its query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    /// No relaxation at all
    Original,
    /// Every atom merged with its relaxations
    NonSpeculative,
    /// Only atoms expected to need relaxation are merged
    Speculative,
}

/// A partition of a query's atoms into groups
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalPlan {
    pub groups: Vec<AtomGroup>,
    pub kind: PlanKind,
}

/// Relaxations per atom index of the query
pub type RelaxationMap = HashMap<usize, Vec<Relaxation>>;

impl LogicalPlan {
    pub fn new(groups: Vec<AtomGroup>, kind: PlanKind) -> Self {
        Self { groups, kind }
    }

    /// All atoms in one unrelaxed group
    pub fn original(query: &Query) -> Self {
        Self::new(
            vec![AtomGroup::Unrelaxed(query.patterns.clone())],
            PlanKind::Original,
        )
    }

    /// Every atom as its own relaxed group
    ///
    /// Atoms without relaxations still get a merge, of just the original scan.
    pub fn non_speculative(query: &Query, relaxations: &RelaxationMap) -> Self {
        let groups = query
            .patterns
            .iter()
            .enumerate()
            .map(|(i, tp)| AtomGroup::Relaxed {
                atom: tp.clone(),
                relaxations: relaxations.get(&i).cloned().unwrap_or_default(),
            })
            .collect();
        Self::new(groups, PlanKind::NonSpeculative)
    }

    /// Atoms with relaxations as relaxed groups, the rest in one unrelaxed group
    pub fn speculative(query: &Query, relaxations: &RelaxationMap) -> Self {
        let mut groups = Vec::new();
        let mut unrelaxed = Vec::new();

        for (i, tp) in query.patterns.iter().enumerate() {
            match relaxations.get(&i) {
                Some(list) if !list.is_empty() => groups.push(AtomGroup::Relaxed {
                    atom: tp.clone(),
                    relaxations: list.clone(),
                }),
                _ => unrelaxed.push(tp.clone()),
            }
        }
        if !unrelaxed.is_empty() {
            groups.push(AtomGroup::Unrelaxed(unrelaxed));
        }
        Self::new(groups, PlanKind::Speculative)
    }

    /// Number of atoms across all groups
    pub fn atom_count(&self) -> usize {
        self.groups.iter().map(|g| g.atoms().len()).sum()
    }

    /// Reject empty plans, empty groups and out-of-range relaxation weights
    pub fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            return Err(QueryError::invalid_plan("plan has no atom groups"));
        }
        for group in &self.groups {
            match group {
                AtomGroup::Relaxed { relaxations, .. } => {
                    for r in relaxations {
                        r.validate()?;
                    }
                }
                AtomGroup::Unrelaxed(atoms) if atoms.is_empty() => {
                    return Err(QueryError::invalid_plan("unrelaxed group has no atoms"));
                }
                AtomGroup::Unrelaxed(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_query;
    use crate::pattern::Term;
    use crate::var_registry::VarRegistry;
    use std::sync::Arc;

    fn query(vars: &mut VarRegistry) -> Query {
        parse_query("?x <type> <singer>; ?x <bornIn> ?c; ?c <in> <Europe>", vars).unwrap()
    }

    fn relax_object(query: &Query, atom: usize, object: &str, weight: f64, vars: &VarRegistry) -> Relaxation {
        let tp = query.patterns[atom].with_object(Term::Iri(Arc::from(object)), vars);
        Relaxation::new(tp, weight)
    }

    #[test]
    fn test_original_plan() {
        let mut vars = VarRegistry::new();
        let q = query(&mut vars);
        let plan = LogicalPlan::original(&q);
        assert_eq!(plan.kind, PlanKind::Original);
        assert_eq!(plan.groups.len(), 1);
        assert!(!plan.groups[0].is_relaxed());
        assert_eq!(plan.atom_count(), 3);
        plan.validate().unwrap();
    }

    #[test]
    fn test_non_speculative_plan() {
        let mut vars = VarRegistry::new();
        let q = query(&mut vars);
        let mut map = RelaxationMap::new();
        map.insert(0, vec![relax_object(&q, 0, "<musician>", 0.8, &vars)]);

        let plan = LogicalPlan::non_speculative(&q, &map);
        assert_eq!(plan.groups.len(), 3);
        assert!(plan.groups.iter().all(AtomGroup::is_relaxed));
        match &plan.groups[1] {
            AtomGroup::Relaxed { relaxations, .. } => assert!(relaxations.is_empty()),
            other => panic!("expected relaxed group, got {:?}", other),
        }
    }

    #[test]
    fn test_speculative_plan() {
        let mut vars = VarRegistry::new();
        let q = query(&mut vars);
        let mut map = RelaxationMap::new();
        map.insert(2, vec![relax_object(&q, 2, "<World>", 0.5, &vars)]);

        let plan = LogicalPlan::speculative(&q, &map);
        assert_eq!(plan.kind, PlanKind::Speculative);
        assert_eq!(plan.groups.len(), 2);
        assert!(plan.groups[0].is_relaxed());
        assert_eq!(plan.groups[0].atoms()[0], q.patterns[2]);
        assert_eq!(plan.groups[1].atoms(), &q.patterns[..2]);
        assert_eq!(plan.atom_count(), 3);
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let mut vars = VarRegistry::new();
        let q = query(&mut vars);
        for weight in [0.0, -0.5, 1.5, f64::NAN, f64::INFINITY] {
            let mut map = RelaxationMap::new();
            map.insert(0, vec![relax_object(&q, 0, "<musician>", weight, &vars)]);
            let plan = LogicalPlan::speculative(&q, &map);
            assert!(
                matches!(plan.validate(), Err(QueryError::InvalidPlan(_))),
                "weight {} accepted",
                weight
            );
        }
    }

    #[test]
    fn test_validate_rejects_bad_initial_bounds() {
        let mut vars = VarRegistry::new();
        let q = query(&mut vars);
        for bound in [-1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let r = relax_object(&q, 0, "<musician>", 0.5, &vars).with_initial_bound(bound);
            assert!(
                matches!(r.validate(), Err(QueryError::InvalidPlan(_))),
                "bound {} accepted",
                bound
            );
        }
        for bound in [0.0, 1.0, 9.0] {
            relax_object(&q, 0, "<musician>", 0.5, &vars)
                .with_initial_bound(bound)
                .validate()
                .unwrap();
        }
    }

    #[test]
    fn test_validate_rejects_empty_plan() {
        let plan = LogicalPlan::new(Vec::new(), PlanKind::Original);
        assert!(matches!(plan.validate(), Err(QueryError::InvalidPlan(_))));
    }
}
