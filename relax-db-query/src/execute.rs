//! Top-k query execution
//!
//! Drives a compiled operator tree: open, pull up to k answers, close. The
//! tree is closed on every path, including after a failed open or pull.

use crate::answer::Answer;
use crate::compile::PlanCompiler;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::limit::LimitOperator;
use crate::operator::BoxedOperator;
use crate::options::EngineConfig;
use crate::plan::LogicalPlan;
use crate::scan::ScanProvider;
use tracing::Instrument;

/// Pull the top `k` answers from `root`, then close it
///
/// A failure while opening or pulling takes precedence over a failure while
/// closing; the latter is only logged in that case.
pub async fn execute_top_k(
    root: &mut BoxedOperator,
    ctx: &ExecutionContext<'_>,
    k: usize,
) -> Result<Vec<Answer>> {
    let span = tracing::debug_span!(
        "top_k_execute",
        k,
        emitted = tracing::field::Empty
    );
    async {
        let pulled = pull(root, ctx, k).await;
        let closed = root.close();

        match pulled {
            Ok(answers) => {
                if let Err(close_err) = closed {
                    return Err(close_err);
                }
                tracing::Span::current().record("emitted", answers.len());
                tracing::debug!(part_query = %root.part_query(), "top-k complete");
                Ok(answers)
            }
            Err(e) => {
                if let Err(close_err) = closed {
                    tracing::debug!(error = %close_err, "close failed after pull error");
                }
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}

async fn pull(
    root: &mut BoxedOperator,
    ctx: &ExecutionContext<'_>,
    k: usize,
) -> Result<Vec<Answer>> {
    root.open(ctx).await?;
    let mut answers = Vec::with_capacity(k.min(1024));
    while answers.len() < k {
        match root.next_answer(ctx).await? {
            Some(answer) => answers.push(answer),
            None => break,
        }
    }
    Ok(answers)
}

/// Compile `plan` against `provider` and return its top `config.k` answers
///
/// The compiled tree is capped with a [`LimitOperator`] so nothing past the
/// k-th answer is pulled from it.
pub async fn execute_plan<P: ScanProvider + ?Sized>(
    provider: &P,
    plan: &LogicalPlan,
    config: &EngineConfig,
    ctx: &ExecutionContext<'_>,
) -> Result<Vec<Answer>> {
    config.validate()?;
    let compiled = PlanCompiler::new(provider).with_config(config).compile(plan)?;
    let mut root: BoxedOperator = Box::new(LimitOperator::new(compiled, config.k));
    execute_top_k(&mut root, ctx, config.k).await
}
