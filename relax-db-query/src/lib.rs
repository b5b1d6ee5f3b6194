//! # Relax DB Query
//!
//! Top-k evaluation of triple-pattern queries with weighted relaxations.
//!
//! This crate provides:
//! - Pull-based scored operators (`Operator`) that yield answers in
//!   non-increasing score order
//! - `WeightedMerge`: an atom's scan merged with its weighted relaxations,
//!   opening relaxation scans only once their bound is competitive
//! - `RankJoin`: hash rank join with upper-bound pruning
//! - Join-tree and plan compilation from a logical partition of the query
//!
//! ## Design Principles
//!
//! 1. **Ranked streams**: every operator emits in descending score order, so
//!    the first k answers of the root are the top k
//! 2. **Lazy relaxation**: a relaxation is never read while the original (or
//!    a better relaxation) can still produce a higher score
//! 3. **Explicit ownership**: each compiled plan owns its operator tree;
//!    statistics belong to the caller
//!
//! ## Example
//!
//! ```ignore
//! use relax_db_query::{execute_plan, parse_query, EngineConfig, ExecutionContext};
//! use relax_db_query::{LogicalPlan, MemoryStore, VarRegistry};
//!
//! let mut vars = VarRegistry::new();
//! let query = parse_query("SELECT ?x; ?x <type> <singer>; ?x <bornIn> ?c", &mut vars)?;
//! let plan = LogicalPlan::original(&query);
//! let config = EngineConfig::new().with_k(5);
//! let ctx = ExecutionContext::from_config(&config).with_vars(&vars);
//! let answers = execute_plan(&store, &plan, &config, &ctx).await?;
//! ```

pub mod answer;
pub mod compile;
pub mod context;
pub mod error;
pub mod execute;
pub mod join_graph;
pub mod join_index;
pub mod join_tree;
pub mod limit;
pub mod merge;
pub mod operator;
pub mod options;
pub mod parse;
pub mod pattern;
pub mod plan;
pub mod rank_join;
pub mod scan;
pub mod var_registry;
pub mod weighted;

// Re-export main types
pub use answer::Answer;
pub use compile::PlanCompiler;
pub use context::{ExecStats, ExecutionContext};
pub use error::{QueryError, Result};
pub use execute::{execute_plan, execute_top_k};
pub use join_graph::{JoinCondition, JoinGraph, JoinInfo};
pub use join_index::JoinIndex;
pub use join_tree::{compile_join_tree, JoinInput, JoinStep, JoinTree};
pub use limit::LimitOperator;
pub use merge::{MergeInput, WeightedMerge};
pub use operator::{BoxedOperator, Operator, OperatorState};
pub use options::EngineConfig;
pub use parse::{parse_query, Query};
pub use pattern::{Term, TriplePattern};
pub use plan::{AtomGroup, LogicalPlan, PlanKind, Relaxation, RelaxationMap};
pub use rank_join::RankJoin;
pub use scan::{ListScan, MemoryScan, MemoryStore, ScanProvider, ScoredTriple};
pub use var_registry::{VarId, VarRegistry};
pub use weighted::WeightedStream;
