//! Compensation scope for multi-system mutations
//!
//! A lifecycle operation touches two systems of record (the local store and
//! the network backend) that cannot share a transaction. Each step that
//! succeeds registers an undo action; if a later step fails the scope runs
//! the registered actions, most recent first, before the error reaches the
//! caller.
//!
//! ```ignore
//! let mut scope = CompensationScope::new("release_address");
//! let outcome = async {
//!     store.delete(address.id).await?;
//!     scope.on_failure("restore address record", move || async move {
//!         store.restore_record(&address).await
//!     });
//!     backend.delete_floating_ip(&os_id).await?;
//!     Ok::<_, ApiError>(())
//! }
//! .await;
//! scope.exit(outcome).await?;
//! ```

use cloudgate_cloud::Result as CloudResult;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::fmt::Display;
use std::future::Future;

type UndoFn = Box<dyn FnOnce() -> BoxFuture<'static, CloudResult<()>> + Send>;

struct UndoAction {
    label: String,
    run: UndoFn,
}

/// Outcome of a rollback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Undo actions that completed
    pub undone: usize,

    /// Labels of undo actions that failed; their side effects may persist
    pub failed: Vec<String>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Saga-style rollback boundary
///
/// Exit exactly once through [`exit`](Self::exit). Undo actions never run on
/// a successful exit.
pub struct CompensationScope {
    operation: &'static str,
    actions: Vec<UndoAction>,
    exited: bool,
}

impl CompensationScope {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            actions: Vec::new(),
            exited: false,
        }
    }

    /// Register an undo action to run if the scope exits with an error
    pub fn on_failure<F, Fut>(&mut self, label: impl Into<String>, undo: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CloudResult<()>> + Send + 'static,
    {
        self.actions.push(UndoAction {
            label: label.into(),
            run: Box::new(move || undo().boxed()),
        });
    }

    /// Number of registered undo actions
    pub fn pending(&self) -> usize {
        self.actions.len()
    }

    /// Leave the scope with the body's outcome
    ///
    /// On `Err`, every registered undo action runs in reverse registration
    /// order; failures of undo actions are logged and do not stop the
    /// remaining ones. The body's error is returned unchanged either way.
    pub async fn exit<T, E: Display>(mut self, outcome: Result<T, E>) -> Result<T, E> {
        self.exited = true;
        match outcome {
            Ok(value) => {
                self.actions.clear();
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(
                    "{} failed, rolling back {} step(s): {}",
                    self.operation,
                    self.pending(),
                    err
                );
                let report = self.rollback().await;
                if !report.is_clean() {
                    tracing::error!(
                        "{} rollback incomplete, backend and local state may diverge: {}",
                        self.operation,
                        report.failed.join(", ")
                    );
                }
                Err(err)
            }
        }
    }

    async fn rollback(&mut self) -> RollbackReport {
        let mut report = RollbackReport::default();
        while let Some(action) = self.actions.pop() {
            match (action.run)().await {
                Ok(()) => {
                    tracing::debug!("{}: undone '{}'", self.operation, action.label);
                    report.undone += 1;
                }
                Err(e) => {
                    tracing::error!("{}: undo '{}' failed: {}", self.operation, action.label, e);
                    report.failed.push(action.label);
                }
            }
        }
        report
    }
}

impl Drop for CompensationScope {
    fn drop(&mut self) {
        if !self.exited && self.pending() > 0 {
            tracing::warn!(
                "{}: scope dropped without exit, {} undo action(s) discarded",
                self.operation,
                self.pending()
            );
        }
    }
}
