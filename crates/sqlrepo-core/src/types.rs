//! SQL type definitions.

use serde::{Deserialize, Serialize};

/// SQL column types produced by the schema deriver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Integer,
    BigInt,
    VarChar(u32),
}

impl SqlType {
    /// Get the SQL type name for this type.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::VarChar(len) => format!("VARCHAR({})", len),
        }
    }

    /// Check if this is an integer type.
    pub const fn is_integer(&self) -> bool {
        matches!(self, SqlType::Integer | SqlType::BigInt)
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_names() {
        assert_eq!(SqlType::Integer.sql_name(), "INTEGER");
        assert_eq!(SqlType::BigInt.to_string(), "BIGINT");
        assert_eq!(SqlType::VarChar(255).sql_name(), "VARCHAR(255)");
        assert!(SqlType::BigInt.is_integer());
        assert!(!SqlType::VarChar(1).is_integer());
    }
}
