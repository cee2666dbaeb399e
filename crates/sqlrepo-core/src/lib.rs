//! Core types and traits for sqlrepo.
//!
//! - `Entity` trait and property descriptors for introspected types
//! - `Connection` / `DataSource` traits for database access
//! - `Value` / `Row` for dynamic values and result rows
//! - `Error` with configuration, state and data-access categories

pub mod connection;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod row;
pub mod types;
pub mod value;

pub use connection::{Connection, DataSource};
pub use dialect::Dialect;
pub use entity::{
    Annotation, Annotations, Entity, Getter, PropertyDescriptor, PropertyType, Setter,
    convert_property,
};
pub use error::{
    ConfigError, ConfigErrorKind, ConnectionError, ConnectionErrorKind, Error, ErrorCategory,
    ErrorKind, QueryError, QueryErrorKind, RepositoryError, Result, StateError, StateErrorKind,
    TypeError,
};
pub use row::{ColumnInfo, FromValue, Row};
pub use types::SqlType;
pub use value::Value;
