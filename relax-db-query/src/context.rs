//! Execution context for query operators
//!
//! The `ExecutionContext` is passed to every `open`/`has_next`/`next` call.
//! It carries the variable registry (for diagnostics), the rank-join seed,
//! and an optional statistics sink owned by the caller.

use crate::options::{EngineConfig, DEFAULT_JOIN_SEED};
use crate::var_registry::VarRegistry;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one query run
///
/// Owned by whoever drives the plan (a test, a benchmark, a server request)
/// and lent to operators through the context; there is no global counter.
#[derive(Debug, Default)]
pub struct ExecStats {
    answers_created: AtomicU64,
    tuples_read: AtomicU64,
}

impl ExecStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an answer materialized by a scan or a join
    pub fn record_answer(&self) {
        self.answers_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tuple pulled into a rank join
    pub fn record_tuple_read(&self) {
        self.tuples_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn answers_created(&self) -> u64 {
        self.answers_created.load(Ordering::Relaxed)
    }

    pub fn tuples_read(&self) -> u64 {
        self.tuples_read.load(Ordering::Relaxed)
    }
}

/// Execution context providing per-run state to operators
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'a> {
    /// Variable registry for rendering variable names in logs
    pub vars: Option<&'a VarRegistry>,
    /// Optional statistics sink
    pub stats: Option<&'a ExecStats>,
    /// Seed for the rank-join side choice
    pub join_seed: u64,
}

impl Default for ExecutionContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ExecutionContext<'a> {
    /// Create a context with no registry, no statistics and the default seed
    pub fn new() -> Self {
        Self {
            vars: None,
            stats: None,
            join_seed: DEFAULT_JOIN_SEED,
        }
    }

    /// Create a context from an engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new().with_join_seed(config.join_seed)
    }

    pub fn with_vars(mut self, vars: &'a VarRegistry) -> Self {
        self.vars = Some(vars);
        self
    }

    pub fn with_stats(mut self, stats: &'a ExecStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_join_seed(mut self, seed: u64) -> Self {
        self.join_seed = seed;
        self
    }

    pub(crate) fn record_answer(&self) {
        if let Some(stats) = self.stats {
            stats.record_answer();
        }
    }

    pub(crate) fn record_tuple_read(&self) {
        if let Some(stats) = self.stats {
            stats.record_tuple_read();
        }
    }

    /// Render a variable for log output
    pub fn var_name(&self, var: crate::var_registry::VarId) -> String {
        match self.vars {
            Some(vars) => vars.display(var),
            None => format!("?_{}", var.0),
        }
    }
}
