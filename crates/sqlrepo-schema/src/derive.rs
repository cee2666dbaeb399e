//! Schema derivation from entity introspection.
//!
//! Specs are derived once per entity type and cached for the process
//! lifetime. Failed derivations are not cached, so a misconfigured entity
//! reports the same error on every call.

use crate::mapping::mapping_for;
use crate::table::{ColumnSpec, TableSpec};
use sqlrepo_core::{ConfigErrorKind, Entity, Error, PropertyDescriptor, Result};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

static TABLE_SPECS: LazyLock<RwLock<HashMap<TypeId, Arc<TableSpec>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Derive the column spec for one property.
pub fn column_spec_of<E>(property: &PropertyDescriptor<E>) -> Result<ColumnSpec> {
    let annotations = property.annotations();
    let mapping = mapping_for(property.value_type())?;
    let column_name = annotations
        .column()
        .map_or_else(|| property.name().to_uppercase(), str::to_string);

    Ok(ColumnSpec {
        property_name: property.name().to_string(),
        column_name,
        sql_type: mapping.sql_type,
        nullable: mapping.nullable,
        auto_increment: annotations.is_generated(),
        primary_key: annotations.is_id(),
    })
}

/// Table name for `E`: the `Table` annotation, else the upper-cased type name.
pub fn table_name_of<E: Entity>() -> String {
    E::type_annotations()
        .table()
        .map_or_else(|| E::TYPE_NAME.to_uppercase(), str::to_string)
}

/// Derive the table spec for `E` without consulting the cache.
pub fn derive_table_spec<E: Entity>() -> Result<TableSpec> {
    let table_name = table_name_of::<E>();
    let properties = E::properties();

    let mut columns = Vec::with_capacity(properties.len());
    let mut id = None;
    for property in &properties {
        let column = column_spec_of(property)?;
        if column.primary_key {
            if let Some(first) = id {
                let first: &ColumnSpec = &columns[first];
                return Err(Error::config(
                    ConfigErrorKind::MultiplePrimaryKeys,
                    format!(
                        "{} declares more than one id property: {} and {}",
                        E::TYPE_NAME,
                        first.property_name,
                        column.property_name
                    ),
                ));
            }
            id = Some(columns.len());
        }
        columns.push(column);
    }

    tracing::debug!(
        entity = E::TYPE_NAME,
        table = %table_name,
        columns = columns.len(),
        "Derived table spec"
    );

    Ok(TableSpec::new(table_name, columns, id))
}

/// The cached table spec for `E`, deriving it on first use.
///
/// Concurrent first calls may each derive the spec; the first one stored wins
/// and every caller receives that same `Arc`.
#[tracing::instrument(level = "trace", fields(entity = E::TYPE_NAME))]
pub fn table_spec_of<E: Entity>() -> Result<Arc<TableSpec>> {
    let key = TypeId::of::<E>();
    {
        let cache = TABLE_SPECS.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(spec) = cache.get(&key) {
            return Ok(Arc::clone(spec));
        }
    }

    let spec = Arc::new(derive_table_spec::<E>()?);
    let mut cache = TABLE_SPECS.write().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(cache.entry(key).or_insert(spec)))
}
