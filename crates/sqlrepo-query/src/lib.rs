//! Entity mapping and repository dispatch for sqlrepo.
//!
//! `sqlrepo-query` turns repository method calls into SQL:
//!
//! - **Mapper**: rows to entities and entities to statement parameters.
//! - **Dispatcher**: per-contract strategy table resolved from method names
//!   (`find_all`, `find_by_id`, `save`, `find_by_<property>`) or literal
//!   `#[query]` SQL.
//! - **Repository**: the base `Repository` trait, the `RepositoryContract`
//!   implemented by `#[repository]`, and the process-wide repository cache.
//!
//! Every call runs on the connection bound to the caller's
//! `TransactionContext`.

pub mod dispatcher;
pub mod intent;
pub mod mapper;
pub mod repository;
pub mod sql;

pub use dispatcher::{Argument, Dispatched, Dispatcher, MethodSpec, Strategy};
pub use intent::{Intent, parse_intent};
pub use mapper::{entity_to_parameters, propagate_generated_key, query_entities, row_to_entity};
pub use repository::{Repository, RepositoryContract, build_repository, create_table};
pub use sql::SqlTemplates;
