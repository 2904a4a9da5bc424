//! Instruction pipeline: snapshot, extract intent, execute, refresh.

pub mod compile;
pub mod dedupe;
pub mod execute;
pub mod extract;
pub mod reconcile;
pub mod repair;
pub mod resolve;

use tracing::{info, warn};

use crate::error::PipelineError;
use crate::model::mutation::{MutationBatch, MutationResult};
use crate::model::work_item::WorkItem;
use crate::session::Session;
use crate::store::{fetch_snapshot, ItemQuery};
use execute::MutationExecutor;
use extract::IntentExtractor;

/// Everything one instruction produced.
#[derive(Debug, Clone)]
pub struct InstructionOutcome {
    pub batch: MutationBatch,
    pub results: Vec<MutationResult>,
    /// Post-mutation snapshot for the view. `None` when nothing was applied
    /// or the refresh failed.
    pub snapshot: Option<Vec<WorkItem>>,
}

impl InstructionOutcome {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }
}

/// Run one natural-language instruction against a project.
///
/// The model always sees the whole project so references resolve, while the
/// returned snapshot honors `view_query`.
pub async fn run_instruction(
    session: &Session,
    project: &str,
    instruction: &str,
    view_query: &ItemQuery,
) -> Result<InstructionOutcome, PipelineError> {
    let context = fetch_snapshot(session.store.as_ref(), project, &ItemQuery::default()).await?;
    run_instruction_with_context(session, project, instruction, &context, view_query).await
}

/// Like [`run_instruction`], with a whole-project snapshot the caller already holds.
pub async fn run_instruction_with_context(
    session: &Session,
    project: &str,
    instruction: &str,
    context: &[WorkItem],
    view_query: &ItemQuery,
) -> Result<InstructionOutcome, PipelineError> {
    let batch = IntentExtractor::new(session.completion.as_ref())
        .extract_intent(instruction, project, context)
        .await?;
    Ok(run_batch(session, project, batch, context, view_query).await)
}

/// Execute an already validated batch and refresh the view snapshot.
pub async fn run_batch(
    session: &Session,
    project: &str,
    batch: MutationBatch,
    context: &[WorkItem],
    view_query: &ItemQuery,
) -> InstructionOutcome {
    if batch.is_none() {
        info!(project, "instruction needs no changes");
        return InstructionOutcome {
            batch,
            results: Vec::new(),
            snapshot: None,
        };
    }

    let results = MutationExecutor::new(session.store.as_ref(), session.execution)
        .execute(&batch, project, context)
        .await;

    let snapshot = match fetch_snapshot(session.store.as_ref(), project, view_query).await {
        Ok(items) => Some(items),
        Err(err) => {
            warn!(project, error = %err, "refresh after mutation failed");
            None
        }
    };

    InstructionOutcome {
        batch,
        results,
        snapshot,
    }
}

#[cfg(test)]
mod tests;
