//! Transactional mutation helper
//!
//! Wraps multi-entity mutations in a single atomic unit. Store calls join
//! the unit by carrying the [`TxHandle`] in their options; independent steps
//! may run concurrently against the same handle, and the whole unit either
//! commits or rolls back. Step failures surface uniformly as
//! [`OperationFailedError`] with the original failure attached as cause.

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::error::{OperationFailedError, StoreError};

/// Opaque handle identifying one open transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHandle(Uuid);

impl TxHandle {
    pub fn new() -> Self {
        TxHandle(Uuid::new_v4())
    }
}

impl Default for TxHandle {
    fn default() -> Self {
        TxHandle::new()
    }
}

/// A store that can open atomic transaction scopes.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn begin(&self) -> Result<TxHandle, StoreError>;
    async fn commit(&self, tx: TxHandle) -> Result<(), StoreError>;
    async fn rollback(&self, tx: TxHandle) -> Result<(), StoreError>;
}

/// Run `work` inside one atomic unit.
///
/// Begins a transaction, passes the handle to `work`, and commits on
/// success. Any failure (inside `work` or at commit) rolls the unit back
/// and surfaces as an [`OperationFailedError`] named after `operation`.
pub async fn with_transaction<'a, S, T, F>(
    source: &S,
    operation: &str,
    work: F,
) -> Result<T, OperationFailedError>
where
    S: TransactionSource + ?Sized,
    F: FnOnce(TxHandle) -> BoxFuture<'a, Result<T, StoreError>>,
{
    let tx = source
        .begin()
        .await
        .map_err(|err| OperationFailedError::with_cause(operation, err))?;

    match work(tx).await {
        Ok(value) => match source.commit(tx).await {
            Ok(()) => {
                debug!(operation, "transaction committed");
                Ok(value)
            }
            Err(err) => {
                warn!(operation, %err, "transaction commit failed");
                Err(OperationFailedError::with_cause(operation, err))
            }
        },
        Err(err) => {
            warn!(operation, %err, "transaction step failed, rolling back");
            if let Err(rollback_err) = source.rollback(tx).await {
                warn!(operation, %rollback_err, "transaction rollback failed");
            }
            Err(OperationFailedError::with_cause(operation, err))
        }
    }
}
