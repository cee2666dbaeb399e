//! SQLite driver for sqlrepo.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! Implements the core [`Connection`](sqlrepo_core::Connection) and
//! [`DataSource`](sqlrepo_core::DataSource) traits over libsqlite3, which is
//! compiled from the bundled amalgamation.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlrepo_core::{Connection, Value};
//! use sqlrepo_sqlite::SqliteConnection;
//!
//! let conn = SqliteConnection::open_memory()?;
//! conn.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//! let id = conn.insert("INSERT INTO users (name) VALUES (?)", &[Value::from("Alice")], "id")?;
//! ```
//!
//! # Type Mapping
//!
//! | Value | SQLite storage |
//! |-------|----------------|
//! | `Bool` | INTEGER (0/1) |
//! | `Int`, `BigInt` | INTEGER |
//! | `Double` | REAL |
//! | `Text` | TEXT |
//! | `Bytes` | BLOB |
//! | `Null` | NULL |
//!
//! # Transactions
//!
//! SQLite has no auto-commit switch, so connections emulate one: after
//! `set_auto_commit(false)` the next statement issues `BEGIN`, and `commit`
//! or `rollback` end that transaction. Generated keys are read back with a
//! `RETURNING` clause.

pub mod connection;
pub mod ffi;
pub mod source;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};
pub use source::SqliteDataSource;

/// SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
