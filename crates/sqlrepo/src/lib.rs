//! sqlrepo - entities and repositories over SQL, configured by attributes.
//!
//! sqlrepo maps plain structs to tables and implements repository traits
//! from their method names:
//!
//! - `#[derive(Entity)]` records a struct's properties and mapping markers
//! - table specs and CREATE TABLE statements are derived from those markers
//! - `#[repository]` turns a trait extending [`Repository`] into a working
//!   implementation; `find_all`, `find_by_id`, `save` and
//!   `find_by_<property>` are answered by convention, `#[query("...")]`
//!   methods run literal SQL
//! - every call runs on the connection of the surrounding
//!   [`run_in_transaction`] block, which commits on success and rolls back
//!   on failure
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlrepo::prelude::*;
//!
//! #[derive(Entity, Debug, Default, Clone)]
//! struct Person {
//!     #[sqlrepo(id, generated)]
//!     id: Option<i64>,
//!     name: String,
//!     age: i32,
//! }
//!
//! #[repository]
//! trait PersonRepository: Repository<Person, i64> {
//!     fn find_by_age(&self, cx: &TransactionContext, age: i32) -> Result<Option<Person>>;
//! }
//!
//! let ds = SqliteDataSource::file("people.db");
//! let people = PersonRepositoryImpl::shared()?;
//! let ada = run_in_transaction(&ds, |cx| {
//!     create_table::<Person>(cx)?;
//!     people.save(cx, Person { name: "Ada".into(), age: 36, ..Default::default() })
//! })?;
//! assert!(ada.id.is_some());
//! ```
//!
//! # Errors
//!
//! Every failure is a [`Error`] in one of three families: configuration
//! (invalid entity or contract, fatal at build time), state (no active
//! transaction, nested transaction, unsupported method) and data access
//! (anything the database reports).

pub use sqlrepo_core::{
    Annotation, Annotations, ConfigErrorKind, Connection, DataSource, Dialect, Entity, Error,
    ErrorCategory, ErrorKind, FromValue, PropertyDescriptor, PropertyType, Result, Row, SqlType,
    StateErrorKind, Value,
};

pub use sqlrepo_macros::{Entity, repository};

pub use sqlrepo_schema::{ColumnSpec, TableSpec, create_table_sql, table_spec_of};

pub use sqlrepo_session::{TransactionContext, run_in_transaction, transaction_active};

pub use sqlrepo_query::{Repository, RepositoryContract, build_repository, create_table};

pub use sqlrepo_sqlite::{SqliteConfig, SqliteConnection, SqliteDataSource};

/// Common imports.
pub mod prelude {
    pub use crate::{
        Connection, DataSource, Entity, Error, ErrorCategory, Repository, Result,
        SqliteDataSource, TransactionContext, Value, create_table, repository,
        run_in_transaction, table_spec_of,
    };
}
