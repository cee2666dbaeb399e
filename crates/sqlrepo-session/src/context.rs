//! Transaction context: one connection bound to one unit of work.
//!
//! A [`TransactionContext`] is inactive until [`run_in_transaction`] binds a
//! freshly acquired connection to it. While the block runs, every repository
//! call made with the context uses that connection; when the block returns the
//! context commits or rolls back, releases the connection and becomes
//! inactive again.
//!
//! The context is `!Sync`, so a binding can never be observed from another
//! thread. At most one transaction is in progress per thread, whichever
//! context or entry point started it.
//!
//! [`run_in_transaction`]: TransactionContext::run_in_transaction

use sqlrepo_core::{Connection, DataSource, Error, Result, StateErrorKind};
use std::cell::{Cell, RefCell};
use std::fmt;

type Slot = RefCell<Option<Box<dyn Connection>>>;

thread_local! {
    static ACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// Whether any context on the current thread has a transaction in progress.
pub fn transaction_active() -> bool {
    ACTIVE.with(Cell::get)
}

/// Unit-of-work-local connection binding.
#[derive(Default)]
pub struct TransactionContext {
    binding: Slot,
}

impl TransactionContext {
    /// An inactive context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a connection is currently bound.
    pub fn is_active(&self) -> bool {
        self.binding.borrow().is_some()
    }

    /// Run `f` with the bound connection.
    ///
    /// Fails with the "no connection available" state error when no
    /// transaction is active.
    pub fn with_connection<R>(&self, f: impl FnOnce(&dyn Connection) -> Result<R>) -> Result<R> {
        let binding = self.binding.borrow();
        match binding.as_deref() {
            Some(connection) => f(connection),
            None => Err(Error::no_connection()),
        }
    }

    /// Run `block` inside a transaction on a connection from `data_source`.
    ///
    /// Auto-commit is disabled for the duration of the block. If the block
    /// succeeds the transaction is committed; if it fails the transaction is
    /// rolled back and the block's error is returned with any rollback failure
    /// attached as a suppressed error. The connection is released exactly once
    /// on every path, after the commit or rollback.
    ///
    /// Fails with the nested-transaction state error, without acquiring a
    /// connection, when a transaction is already in progress on this thread.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn run_in_transaction<D, T, F>(&self, data_source: &D, block: F) -> Result<T>
    where
        D: DataSource + ?Sized,
        F: FnOnce(&TransactionContext) -> Result<T>,
    {
        if self.is_active() || transaction_active() {
            return Err(Error::state(
                StateErrorKind::NestedTransaction,
                "a transaction is already active on this thread",
            ));
        }

        let connection = data_source.connection()?;
        if let Err(e) = connection.set_auto_commit(false) {
            return Err(release_after_failure(connection, e));
        }

        tracing::debug!("Transaction started");
        let binding = Binding::bind(&self.binding, connection);
        let outcome = match block(self) {
            Ok(value) => self
                .with_connection(|connection| connection.commit())
                .inspect_err(|e| tracing::warn!(error = %e, "Commit failed"))
                .map(|()| value),
            Err(err) => {
                let mut err = err.unwrap_repository();
                tracing::debug!(error = %err, "Rolling back transaction");
                let rolled_back = self.with_connection(|connection| connection.rollback());
                if let Err(rollback_err) = rolled_back {
                    tracing::warn!(error = %rollback_err, "Rollback failed");
                    err.add_suppressed(rollback_err);
                }
                Err(err)
            }
        };
        let Some(connection) = binding.release() else {
            return Err(Error::no_connection());
        };

        match outcome {
            Ok(value) => {
                tracing::debug!("Transaction committed");
                connection.close().inspect_err(|e| {
                    tracing::warn!(error = %e, "Failed to release connection");
                })?;
                Ok(value)
            }
            Err(err) => Err(release_after_failure(connection, err)),
        }
    }
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Run `block` in a transaction on a fresh context.
pub fn run_in_transaction<D, T, F>(data_source: &D, block: F) -> Result<T>
where
    D: DataSource + ?Sized,
    F: FnOnce(&TransactionContext) -> Result<T>,
{
    TransactionContext::new().run_in_transaction(data_source, block)
}

/// Release `connection` after `err`, recording a release failure on `err`.
fn release_after_failure(connection: Box<dyn Connection>, mut err: Error) -> Error {
    if let Err(close_err) = connection.close() {
        tracing::warn!(error = %close_err, "Failed to release connection");
        err.add_suppressed(close_err);
    }
    err
}

/// Keeps a connection in the context's slot and marks the thread as inside a
/// transaction. Both are cleared when dropped, including during unwinding.
struct Binding<'a> {
    slot: &'a Slot,
}

impl<'a> Binding<'a> {
    fn bind(slot: &'a Slot, connection: Box<dyn Connection>) -> Self {
        *slot.borrow_mut() = Some(connection);
        ACTIVE.with(|active| active.set(true));
        Self { slot }
    }

    fn release(self) -> Option<Box<dyn Connection>> {
        self.slot.borrow_mut().take()
    }
}

impl Drop for Binding<'_> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.try_borrow_mut() {
            slot.take();
        }
        ACTIVE.with(|active| active.set(false));
    }
}
