//! Database connection traits.
//!
//! - [`Connection`] - one live database session
//! - [`DataSource`] - hands out connections
//!
//! Connections follow the JDBC model the rest of the crate assumes: auto-commit
//! is on by default, turning it off opens an implicit transaction that ends at
//! the next [`Connection::commit`] or [`Connection::rollback`].

use crate::dialect::Dialect;
use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// A database connection.
///
/// Connections are `Send` so a data source may hand them to any thread, but a
/// connection is only ever used by one unit of work at a time.
pub trait Connection: Send {
    /// SQL dialect this connection speaks.
    fn dialect(&self) -> Dialect {
        Dialect::Standard
    }

    /// Enable or disable auto-commit.
    fn set_auto_commit(&self, auto_commit: bool) -> Result<()>;

    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute a write and report the value generated for `key_column`.
    ///
    /// Returns `None` when the driver reports no generated key.
    fn insert(&self, sql: &str, params: &[Value], key_column: &str) -> Result<Option<Value>>;

    /// Commit the current transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the current transaction.
    fn rollback(&self) -> Result<()>;

    /// Release the connection.
    fn close(self: Box<Self>) -> Result<()>;
}

/// A source of database connections.
pub trait DataSource: Send + Sync {
    /// Acquire a fresh connection.
    fn connection(&self) -> Result<Box<dyn Connection>>;
}

impl<D: DataSource + ?Sized> DataSource for std::sync::Arc<D> {
    fn connection(&self) -> Result<Box<dyn Connection>> {
        (**self).connection()
    }
}

impl<D: DataSource + ?Sized> DataSource for &D {
    fn connection(&self) -> Result<Box<dyn Connection>> {
        (**self).connection()
    }
}
