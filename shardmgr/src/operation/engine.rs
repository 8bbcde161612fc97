use tracing::{info, instrument, warn};

use crate::store::{Payload, StoredProcedure, TransactionKind};

use super::context::{OperationContext, OperationSteps};
use super::error::OperationError;
use super::state::OperationState;
use super::steps::{StepTable, MAPPING_STEP_TABLE, SHARD_STEP_TABLE};

/// Drives one [`OperationContext`] through the do/undo state machine
/// (spec.md §4.E). Stateless: every run re-derives where to resume from
/// the operation log, so the same `OperationEngine` instance can drive
/// any number of operations, including retrying one a previous process
/// crashed partway through (keyed by `op_id`, spec.md §3 invariant 2).
#[derive(Default)]
pub struct OperationEngine;

impl OperationEngine {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, ctx), fields(op_id = %ctx.op_id, code = ctx.code.as_str()))]
    pub async fn run(&self, ctx: OperationContext) -> Result<(), OperationError> {
        let table: &StepTable = match &ctx.steps {
            OperationSteps::Mapping { .. } => &MAPPING_STEP_TABLE,
            OperationSteps::Shard { .. } => &SHARD_STEP_TABLE,
        };

        let resume_from = self.resume_point(&ctx).await?;
        if resume_from.is_undo() {
            warn!(?resume_from, "resuming an operation left mid-undo by a prior crash");
            return self.undo_from(&ctx, table, resume_from).await;
        }

        let run_forward = async {
            if resume_from <= OperationState::DoGlobalPreLocal {
                (table.do_global_pre_local)(&ctx).await?;
            }
            if resume_from <= OperationState::DoLocalSource {
                if let Some(step) = table.do_local_source {
                    step(&ctx).await?;
                }
            }
            if resume_from <= OperationState::DoLocalTarget && ctx.has_target_phase() {
                if let Some(step) = table.do_local_target {
                    step(&ctx).await?;
                }
            }
            if resume_from <= OperationState::DoGlobalPostLocal {
                (table.do_global_post_local)(&ctx).await?;
            }
            Ok::<(), OperationError>(())
        };

        match run_forward.await {
            Ok(()) => {
                info!("operation committed");
                Ok(())
            }
            Err(err) => {
                let failed_in = state_of(&err);
                warn!(?failed_in, error = %err, "operation failed, unwinding");
                self.undo_from(&ctx, table, failed_in).await.map_err(|undo_err| {
                    OperationError::UndoFailed {
                        op_id: ctx.op_id,
                        failed_in,
                        undo_failed_in: state_of(&undo_err),
                        source: match undo_err {
                            OperationError::Store { source, .. } => source,
                            other => crate::store::StoreError::Fatal(other.to_string()),
                        },
                    }
                })?;
                Err(err)
            }
        }
    }

    /// Reads the operation log to find where a previous, crashed attempt
    /// left off. No entry means this `op_id` has never been attempted
    /// (or already completed and was cleaned up) — start from the top.
    async fn resume_point(&self, ctx: &OperationContext) -> Result<OperationState, OperationError> {
        let result = ctx
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::FindAndUpdateOperationLogEntryByIdGlobal,
                Payload {
                    operation_id: Some(ctx.op_id),
                    ..Payload::empty()
                },
            )
            .await
            .map_err(|source| OperationError::Store {
                op_id: ctx.op_id,
                state: OperationState::Init,
                source,
            })?;

        Ok(result
            .results
            .operations
            .first()
            .and_then(|entry| OperationState::from_code(entry.undo_start_state))
            .unwrap_or(OperationState::Init))
    }

    /// Records that undo has begun at `failed_in` before running any
    /// undo step, so a crash mid-undo resumes in the undo chain rather
    /// than re-attempting the forward path (spec.md §4.E, §9 "Crash
    /// during undo" open question — resolved by always persisting the
    /// undo entry point first).
    async fn mark_undo_started(&self, ctx: &OperationContext, failed_in: OperationState) -> Result<(), OperationError> {
        let undo_state = match failed_in {
            OperationState::DoLocalTarget | OperationState::DoGlobalPostLocal => OperationState::UndoLocalTarget,
            OperationState::DoLocalSource => OperationState::UndoLocalSource,
            OperationState::DoGlobalPreLocal | OperationState::Init => OperationState::UndoGlobalPreLocal,
            already_undo => already_undo,
        };
        ctx.gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::FindAndUpdateOperationLogEntryByIdGlobal,
                Payload {
                    operation_id: Some(ctx.op_id),
                    log_entry: Some(crate::store::OperationLogPayload {
                        operation_id: ctx.op_id,
                        code: ctx.code.as_str().to_string(),
                        data: serde_json::Value::Null,
                        undo_start_state: undo_state as u8,
                        shard_version_removes: Vec::new(),
                        shard_version_adds: Vec::new(),
                    }),
                    ..Payload::empty()
                },
            )
            .await
            .map_err(|source| OperationError::Store {
                op_id: ctx.op_id,
                state: undo_state,
                source,
            })?;
        Ok(())
    }

    async fn undo_from(
        &self,
        ctx: &OperationContext,
        table: &StepTable,
        failed_in: OperationState,
    ) -> Result<(), OperationError> {
        if !failed_in.is_undo() {
            self.mark_undo_started(ctx, failed_in).await?;
        }

        let ran_local_target = matches!(
            failed_in,
            OperationState::DoLocalTarget | OperationState::DoGlobalPostLocal | OperationState::UndoLocalTarget
        );
        let ran_local_source = ran_local_target
            || matches!(
                failed_in,
                OperationState::DoLocalSource | OperationState::UndoLocalSource
            );
        let ran_pre_local = ran_local_source || failed_in != OperationState::Init;

        if ran_local_target && failed_in != OperationState::UndoLocalSource && failed_in != OperationState::UndoGlobalPreLocal {
            if let Some(step) = table.undo_local_target {
                step(ctx).await?;
            }
        }
        if ran_local_source && failed_in != OperationState::UndoGlobalPreLocal {
            if let Some(step) = table.undo_local_source {
                step(ctx).await?;
            }
        }
        if ran_pre_local {
            (table.undo_global_pre_local)(ctx).await?;
        }

        Ok(())
    }
}

fn state_of(err: &OperationError) -> OperationState {
    match err {
        OperationError::Store { state, .. } | OperationError::Rejected { state, .. } => *state,
        OperationError::UndoFailed { undo_failed_in, .. } => *undo_failed_in,
    }
}
