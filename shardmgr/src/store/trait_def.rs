use async_trait::async_trait;

use super::error::StoreError;
use super::payload::Payload;
use super::procedure::{StoredProcedure, TransactionKind};
use super::rowset::StoreCallResult;

/// A GSM or LSM backend. One call equals one stored-procedure
/// invocation, atomic by itself: a [`TransactionKind`]-appropriate SQL
/// transaction is opened and committed (or rolled back) entirely inside
/// the implementation. A bulk mutation that needs several row changes to
/// land together is expressed as one call carrying several
/// [`super::payload::BulkStep`]s in its [`Payload`], not as several
/// calls sharing one open transaction (spec.md §4.B, §4.E).
#[async_trait]
pub trait Store: Send + Sync {
    /// Runs a single stored procedure and returns its result code plus
    /// any populated rowsets.
    async fn execute_operation(
        &self,
        kind: TransactionKind,
        procedure: StoredProcedure,
        payload: Payload,
    ) -> Result<StoreCallResult, StoreError>;

    /// Runs a batch of procedures back to back inside one transaction,
    /// stopping at (and returning) the first non-success result. Used by
    /// the schema upgrade pipeline to apply several DDL statements
    /// atomically (spec.md §4.C).
    async fn execute_command_batch(
        &self,
        kind: TransactionKind,
        commands: Vec<(StoredProcedure, Payload)>,
    ) -> Result<Vec<StoreCallResult>, StoreError>;
}
