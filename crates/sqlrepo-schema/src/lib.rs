//! Schema derivation for sqlrepo.
//!
//! This crate provides:
//! - The fixed Rust-to-SQL type mapping
//! - Table and column specs derived from entity introspection, cached per type
//! - CREATE TABLE generation for the standard and SQLite dialects

pub mod ddl;
pub mod derive;
pub mod mapping;
pub mod table;

pub use ddl::create_table_sql;
pub use derive::{column_spec_of, derive_table_spec, table_name_of, table_spec_of};
pub use mapping::{TypeMapping, VARCHAR_LENGTH, mapping_for};
pub use table::{ColumnSpec, TableSpec};
