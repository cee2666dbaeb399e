//! Rust type to SQL type mapping.

use sqlrepo_core::{ConfigErrorKind, Error, PropertyType, Result, SqlType};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Width of every mapped string column.
pub const VARCHAR_LENGTH: u32 = 255;

/// SQL rendering of one supported property type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMapping {
    pub sql_type: SqlType,
    pub nullable: bool,
}

static MAPPINGS: LazyLock<HashMap<TypeId, TypeMapping>> = LazyLock::new(|| {
    fn entry<T: 'static>(sql_type: SqlType, nullable: bool) -> (TypeId, TypeMapping) {
        (TypeId::of::<T>(), TypeMapping { sql_type, nullable })
    }

    HashMap::from([
        entry::<i32>(SqlType::Integer, false),
        entry::<Option<i32>>(SqlType::Integer, true),
        entry::<i64>(SqlType::BigInt, false),
        entry::<Option<i64>>(SqlType::BigInt, true),
        entry::<String>(SqlType::VarChar(VARCHAR_LENGTH), false),
        entry::<Option<String>>(SqlType::VarChar(VARCHAR_LENGTH), true),
    ])
});

/// Look up the SQL mapping for a property type.
///
/// Types outside the table are a configuration error.
pub fn mapping_for(value_type: PropertyType) -> Result<TypeMapping> {
    MAPPINGS.get(&value_type.id()).copied().ok_or_else(|| {
        Error::config(
            ConfigErrorKind::UnmappedType,
            format!("no SQL type mapping for {}", value_type.name()),
        )
    })
}
