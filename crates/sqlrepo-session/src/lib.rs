//! Transaction scoping for sqlrepo.
//!
//! `sqlrepo-session` is the unit-of-work layer: it acquires a connection,
//! disables auto-commit, exposes the connection to repository calls made with
//! the same [`TransactionContext`], and finishes with exactly one commit or
//! rollback.
//!
//! # Example
//!
//! ```ignore
//! let people = PersonRepositoryImpl::shared()?;
//! run_in_transaction(&data_source, |cx| {
//!     create_table::<Person>(cx)?;
//!     people.save(cx, Person { name: "Ada".into(), ..Default::default() })
//! })?;
//! ```

pub mod context;

pub use context::{TransactionContext, run_in_transaction, transaction_active};
