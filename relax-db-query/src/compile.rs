//! Plan compilation
//!
//! Turns a [`LogicalPlan`] into an operator tree. Relaxed groups become a
//! [`WeightedMerge`] of the atom's scan with its relaxation scans; unrelaxed
//! groups contribute one plain scan per atom. A single resulting stream is
//! returned as-is; several go to [`compile_join_tree`].

use crate::error::{QueryError, Result};
use crate::join_tree::{compile_join_tree, JoinInput};
use crate::merge::{MergeInput, WeightedMerge};
use crate::operator::{close_all, BoxedOperator, Operator};
use crate::options::EngineConfig;
use crate::pattern::TriplePattern;
use crate::plan::{AtomGroup, LogicalPlan, Relaxation};
use crate::scan::ScanProvider;

/// Compiles logical plans against a scan provider
pub struct PlanCompiler<'a, P: ScanProvider + ?Sized> {
    provider: &'a P,
    /// Relaxations kept per relaxed atom (None = all)
    max_relaxations: Option<usize>,
}

impl<'a, P: ScanProvider + ?Sized> PlanCompiler<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            max_relaxations: None,
        }
    }

    /// Take the relaxation cap from an engine configuration
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.max_relaxations = config.max_relaxations;
        self
    }

    pub fn with_max_relaxations(mut self, max: usize) -> Self {
        self.max_relaxations = Some(max);
        self
    }

    /// Build the operator tree for `plan`
    pub fn compile(&self, plan: &LogicalPlan) -> Result<BoxedOperator> {
        let span = tracing::debug_span!(
            "plan_compile",
            kind = ?plan.kind,
            groups = plan.groups.len(),
            atoms = plan.atom_count()
        );
        let _guard = span.enter();

        plan.validate()?;

        let mut inputs: Vec<JoinInput> = Vec::with_capacity(plan.atom_count());
        for group in &plan.groups {
            if let Err(e) = self.compile_group(group, &mut inputs) {
                let _ = close_all(inputs.iter_mut().map(|i| &mut i.operator));
                return Err(e);
            }
        }

        if inputs.len() == 1 {
            let only = inputs.pop().ok_or_else(|| {
                QueryError::Internal("single compiled stream vanished".to_string())
            })?;
            tracing::debug!(part_query = %only.operator.part_query(), "single stream plan");
            return Ok(only.operator);
        }

        let tree = compile_join_tree(inputs)?;
        tracing::debug!(order = ?tree.order(), "join tree compiled");
        Ok(Box::new(tree))
    }

    fn compile_group(&self, group: &AtomGroup, inputs: &mut Vec<JoinInput>) -> Result<()> {
        match group {
            AtomGroup::Relaxed { atom, relaxations } => {
                let merge = self.compile_merge(atom, relaxations)?;
                inputs.push(JoinInput::new(merge, atom.variables()));
            }
            AtomGroup::Unrelaxed(atoms) => {
                for atom in atoms {
                    let scan = self.provider.scan(atom)?;
                    inputs.push(JoinInput::new(scan, atom.variables()));
                }
            }
        }
        Ok(())
    }

    fn compile_merge(
        &self,
        atom: &TriplePattern,
        relaxations: &[Relaxation],
    ) -> Result<BoxedOperator> {
        let keep = self
            .max_relaxations
            .map_or(relaxations.len(), |max| max.min(relaxations.len()));

        let original = self.provider.scan(atom)?;
        let mut merged = Vec::with_capacity(keep);
        for r in &relaxations[..keep] {
            match self.provider.scan(&r.pattern) {
                Ok(scan) => merged.push(MergeInput::new(scan, r.weight, r.initial_bound)),
                Err(e) => {
                    let mut abandoned = WeightedMerge::new(original, merged);
                    let _ = abandoned.close();
                    return Err(e);
                }
            }
        }

        tracing::debug!(
            atom = %atom,
            relaxations = keep,
            dropped = relaxations.len() - keep,
            "weighted merge built"
        );
        Ok(Box::new(WeightedMerge::new(original, merged)))
    }
}
