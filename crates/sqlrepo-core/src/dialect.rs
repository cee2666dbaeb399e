//! SQL dialects understood by the schema deriver and the dispatcher.

use serde::{Deserialize, Serialize};

/// The SQL flavor a connection speaks.
///
/// `Standard` renders the ANSI-ish forms (`AUTO_INCREMENT`, `MERGE INTO`).
/// `Sqlite` swaps in the forms SQLite accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dialect {
    #[default]
    Standard,
    Sqlite,
}

impl Dialect {
    /// Keyword that starts an upsert statement.
    pub const fn upsert_keyword(self) -> &'static str {
        match self {
            Dialect::Standard => "MERGE INTO",
            Dialect::Sqlite => "INSERT OR REPLACE INTO",
        }
    }

    /// Column suffix marking an auto-increment column, if the dialect has one.
    pub const fn auto_increment_keyword(self) -> Option<&'static str> {
        match self {
            Dialect::Standard => Some("AUTO_INCREMENT"),
            Dialect::Sqlite => None,
        }
    }
}
