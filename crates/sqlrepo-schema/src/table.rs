//! Derived table and column metadata.

use serde::{Deserialize, Serialize};
use sqlrepo_core::SqlType;

/// How one property is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub property_name: String,
    pub column_name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub auto_increment: bool,
    pub primary_key: bool,
}

/// How one entity type is stored.
///
/// Columns keep property declaration order; row values and statement
/// parameters use the same order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    table_name: String,
    columns: Vec<ColumnSpec>,
    id: Option<usize>,
}

impl TableSpec {
    /// Assemble a table spec; `id` indexes into `columns`.
    pub(crate) fn new(table_name: String, columns: Vec<ColumnSpec>, id: Option<usize>) -> Self {
        Self {
            table_name,
            columns,
            id,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// The primary-key column, if the entity declares one.
    pub fn id_column(&self) -> Option<&ColumnSpec> {
        self.id.and_then(|i| self.columns.get(i))
    }

    /// Look up a column by column name, ignoring ASCII case.
    pub fn column(&self, column_name: &str) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|c| c.column_name.eq_ignore_ascii_case(column_name))
    }

    /// Look up the column storing `property_name`.
    pub fn column_for_property(&self, property_name: &str) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|c| c.property_name == property_name)
    }

    /// Position of the column storing `property_name`.
    pub fn position_of_property(&self, property_name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.property_name == property_name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column_name.as_str()).collect()
    }
}
