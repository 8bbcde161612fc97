use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::store::{Payload, ResultCode, StoredProcedure, TransactionKind};

use super::context::{OperationContext, OperationSteps};
use super::error::OperationError;
use super::state::OperationState;

type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<(), OperationError>> + Send + 'a>>;

/// A single phase of the do/undo state machine. Plain function pointers
/// rather than a trait-object hierarchy (spec.md §9 "Dynamic dispatch" —
/// the redesign flag this directly answers): picking the right phase is
/// a table lookup keyed on [`super::kinds::OperationCode`], not a
/// virtual call through a chain of operation subclasses.
pub type StepFn = for<'a> fn(&'a OperationContext) -> StepFuture<'a>;

/// The phases one kind of operation runs, looked up once per
/// [`super::engine::OperationEngine::run`] call. `do_local_target`/
/// `undo_local_target` are `None` for operations that never touch a
/// second shard (add/remove/update mapping; add/remove shard).
pub struct StepTable {
    pub do_global_pre_local: StepFn,
    pub do_local_source: Option<StepFn>,
    pub do_local_target: Option<StepFn>,
    pub do_global_post_local: StepFn,
    pub undo_local_target: Option<StepFn>,
    pub undo_local_source: Option<StepFn>,
    pub undo_global_pre_local: StepFn,
}

pub const MAPPING_STEP_TABLE: StepTable = StepTable {
    do_global_pre_local: do_global_pre_local_mapping,
    do_local_source: Some(do_local_source_mapping),
    do_local_target: Some(do_local_target_mapping),
    do_global_post_local: do_global_post_local_mapping,
    undo_local_target: Some(undo_local_target_mapping),
    undo_local_source: Some(undo_local_source_mapping),
    undo_global_pre_local: undo_global_pre_local_mapping,
};

pub const SHARD_STEP_TABLE: StepTable = StepTable {
    do_global_pre_local: do_global_pre_local_shard,
    do_local_source: None,
    do_local_target: None,
    do_global_post_local: do_global_post_local_shard,
    undo_local_target: None,
    undo_local_source: None,
    undo_global_pre_local: undo_global_pre_local_shard,
};

fn mapping_steps(ctx: &OperationContext) -> (&[crate::store::BulkStep], &[crate::store::BulkStep]) {
    match &ctx.steps {
        OperationSteps::Mapping { forward, undo } => (forward, undo),
        OperationSteps::Shard { .. } => unreachable!("mapping step fn invoked on a shard operation"),
    }
}

fn shard_steps(ctx: &OperationContext) -> (&[crate::store::ShardBulkStep], &[crate::store::ShardBulkStep]) {
    match &ctx.steps {
        OperationSteps::Shard { forward, undo } => (forward, undo),
        OperationSteps::Mapping { .. } => unreachable!("shard step fn invoked on a mapping operation"),
    }
}

fn reject_unless_success(
    code: ResultCode,
    op_id: uuid::Uuid,
    state: OperationState,
) -> Result<(), OperationError> {
    if code.is_success() {
        Ok(())
    } else {
        Err(OperationError::Rejected { op_id, state, code })
    }
}

fn do_global_pre_local_mapping(ctx: &OperationContext) -> StepFuture<'_> {
    Box::pin(async move {
        let (forward, _) = mapping_steps(ctx);
        debug!(op_id = %ctx.op_id, steps = forward.len(), "do_global_pre_local");
        let log_entry = crate::store::OperationLogPayload {
            operation_id: ctx.op_id,
            code: ctx.code.as_str().to_string(),
            data: serde_json::Value::Null,
            undo_start_state: OperationState::DoGlobalPreLocal as u8,
            shard_version_removes: Vec::new(),
            shard_version_adds: Vec::new(),
        };
        let result = ctx
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::BulkOperationShardMappingsGlobalBegin,
                Payload {
                    operation_id: Some(ctx.op_id),
                    bulk_steps: forward.to_vec(),
                    validate: true,
                    log_entry: Some(log_entry),
                    ..Payload::empty()
                },
            )
            .await
            .map_err(|source| OperationError::Store {
                op_id: ctx.op_id,
                state: OperationState::DoGlobalPreLocal,
                source,
            })?;
        reject_unless_success(result.code, ctx.op_id, OperationState::DoGlobalPreLocal)
    })
}

fn do_local_source_mapping(ctx: &OperationContext) -> StepFuture<'_> {
    Box::pin(async move {
        let (forward, _) = mapping_steps(ctx);
        let lsm = ctx.lsm_source.as_ref().expect("mapping operation always has a source LSM");
        let result = lsm
            .execute(
                TransactionKind::LocalSource,
                StoredProcedure::BulkOperationShardMappingsLocal,
                Payload {
                    operation_id: Some(ctx.op_id),
                    bulk_steps: forward.to_vec(),
                    ..Payload::empty()
                },
            )
            .await
            .map_err(|source| OperationError::Store {
                op_id: ctx.op_id,
                state: OperationState::DoLocalSource,
                source,
            })?;
        reject_unless_success(result.code, ctx.op_id, OperationState::DoLocalSource)
    })
}

fn do_local_target_mapping(ctx: &OperationContext) -> StepFuture<'_> {
    Box::pin(async move {
        let (forward, _) = mapping_steps(ctx);
        let Some(lsm) = ctx.lsm_target.as_ref() else {
            return Ok(());
        };
        let result = lsm
            .execute(
                TransactionKind::LocalTarget,
                StoredProcedure::BulkOperationShardMappingsLocal,
                Payload {
                    operation_id: Some(ctx.op_id),
                    bulk_steps: forward.to_vec(),
                    ..Payload::empty()
                },
            )
            .await
            .map_err(|source| OperationError::Store {
                op_id: ctx.op_id,
                state: OperationState::DoLocalTarget,
                source,
            })?;
        reject_unless_success(result.code, ctx.op_id, OperationState::DoLocalTarget)
    })
}

fn do_global_post_local_mapping(ctx: &OperationContext) -> StepFuture<'_> {
    Box::pin(async move {
        let (forward, _) = mapping_steps(ctx);
        let result = ctx
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::BulkOperationShardMappingsGlobalEnd,
                Payload {
                    operation_id: Some(ctx.op_id),
                    bulk_steps: forward.to_vec(),
                    ..Payload::empty()
                },
            )
            .await
            .map_err(|source| OperationError::Store {
                op_id: ctx.op_id,
                state: OperationState::DoGlobalPostLocal,
                source,
            })?;
        reject_unless_success(result.code, ctx.op_id, OperationState::DoGlobalPostLocal)
    })
}

fn undo_local_target_mapping(ctx: &OperationContext) -> StepFuture<'_> {
    Box::pin(async move {
        let (_, undo) = mapping_steps(ctx);
        let Some(lsm) = ctx.lsm_target.as_ref() else {
            return Ok(());
        };
        lsm.execute(
            TransactionKind::LocalTarget,
            StoredProcedure::BulkOperationShardMappingsLocal,
            Payload {
                operation_id: Some(ctx.op_id),
                bulk_steps: undo.to_vec(),
                ..Payload::empty()
            },
        )
        .await
        .map_err(|source| OperationError::Store {
            op_id: ctx.op_id,
            state: OperationState::UndoLocalTarget,
            source,
        })?;
        Ok(())
    })
}

fn undo_local_source_mapping(ctx: &OperationContext) -> StepFuture<'_> {
    Box::pin(async move {
        let (_, undo) = mapping_steps(ctx);
        let lsm = ctx.lsm_source.as_ref().expect("mapping operation always has a source LSM");
        lsm.execute(
            TransactionKind::LocalSource,
            StoredProcedure::BulkOperationShardMappingsLocal,
            Payload {
                operation_id: Some(ctx.op_id),
                bulk_steps: undo.to_vec(),
                ..Payload::empty()
            },
        )
        .await
        .map_err(|source| OperationError::Store {
            op_id: ctx.op_id,
            state: OperationState::UndoLocalSource,
            source,
        })?;
        Ok(())
    })
}

/// Undoing the GSM pre-local phase is a compensating forward call, not a
/// distinct rollback procedure: `BulkOperationShardMappingsGlobalEnd`
/// with the inverse steps both clears the pending row (deleting what an
/// add inserted, restoring visibility on what a remove tagged, or
/// writing back the prior value of an update) and deletes the operation
/// log entry in the same call the forward path would have used to
/// commit.
fn undo_global_pre_local_mapping(ctx: &OperationContext) -> StepFuture<'_> {
    Box::pin(async move {
        let (_, undo) = mapping_steps(ctx);
        ctx.gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::BulkOperationShardMappingsGlobalEnd,
                Payload {
                    operation_id: Some(ctx.op_id),
                    bulk_steps: undo.to_vec(),
                    ..Payload::empty()
                },
            )
            .await
            .map_err(|source| OperationError::Store {
                op_id: ctx.op_id,
                state: OperationState::UndoGlobalPreLocal,
                source,
            })?;
        Ok(())
    })
}

fn do_global_pre_local_shard(ctx: &OperationContext) -> StepFuture<'_> {
    Box::pin(async move {
        let (forward, _) = shard_steps(ctx);
        let log_entry = crate::store::OperationLogPayload {
            operation_id: ctx.op_id,
            code: ctx.code.as_str().to_string(),
            data: serde_json::Value::Null,
            undo_start_state: OperationState::DoGlobalPreLocal as u8,
            shard_version_removes: Vec::new(),
            shard_version_adds: Vec::new(),
        };
        let result = ctx
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::BulkOperationShardsGlobalBegin,
                Payload {
                    operation_id: Some(ctx.op_id),
                    shard_bulk_steps: forward.to_vec(),
                    log_entry: Some(log_entry),
                    ..Payload::empty()
                },
            )
            .await
            .map_err(|source| OperationError::Store {
                op_id: ctx.op_id,
                state: OperationState::DoGlobalPreLocal,
                source,
            })?;
        reject_unless_success(result.code, ctx.op_id, OperationState::DoGlobalPreLocal)
    })
}

fn do_global_post_local_shard(ctx: &OperationContext) -> StepFuture<'_> {
    Box::pin(async move {
        let (forward, _) = shard_steps(ctx);
        let result = ctx
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::BulkOperationShardsGlobalEnd,
                Payload {
                    operation_id: Some(ctx.op_id),
                    shard_bulk_steps: forward.to_vec(),
                    ..Payload::empty()
                },
            )
            .await
            .map_err(|source| OperationError::Store {
                op_id: ctx.op_id,
                state: OperationState::DoGlobalPostLocal,
                source,
            })?;
        reject_unless_success(result.code, ctx.op_id, OperationState::DoGlobalPostLocal)
    })
}

fn undo_global_pre_local_shard(ctx: &OperationContext) -> StepFuture<'_> {
    Box::pin(async move {
        let (_, undo) = shard_steps(ctx);
        ctx.gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::BulkOperationShardsGlobalEnd,
                Payload {
                    operation_id: Some(ctx.op_id),
                    shard_bulk_steps: undo.to_vec(),
                    ..Payload::empty()
                },
            )
            .await
            .map_err(|source| OperationError::Store {
                op_id: ctx.op_id,
                state: OperationState::UndoGlobalPreLocal,
                source,
            })?;
        Ok(())
    })
}
