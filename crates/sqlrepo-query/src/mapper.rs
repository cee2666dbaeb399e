//! Conversion between rows and entities.

use sqlrepo_core::{Connection, Error, PropertyDescriptor, Result, Row, TypeError, Value};
use sqlrepo_schema::TableSpec;

fn property<'p, E>(
    properties: &'p [PropertyDescriptor<E>],
    name: &str,
) -> Option<&'p PropertyDescriptor<E>> {
    properties.iter().find(|p| p.name() == name)
}

/// Build an entity from a row.
///
/// The entity is created with `constructor`, then every writable property is
/// assigned the row value at its column's position in the table.
pub fn row_to_entity<E>(
    row: &Row,
    table: &TableSpec,
    properties: &[PropertyDescriptor<E>],
    constructor: impl Fn() -> E,
) -> Result<E> {
    let mut entity = constructor();
    for (index, column) in table.columns().iter().enumerate() {
        let Some(prop) = property(properties, &column.property_name) else {
            continue;
        };
        if !prop.has_setter() {
            continue;
        }
        let value = row.get(index).ok_or_else(|| {
            Error::from(TypeError {
                expected: prop.value_type().name(),
                actual: format!("no value at index {} (row has {} columns)", index, row.len()),
                column: Some(column.column_name.clone()),
            })
        })?;
        prop.set(&mut entity, value)?;
    }
    Ok(entity)
}

/// Every column's property value, in schema order.
pub fn entity_to_parameters<E>(
    entity: &E,
    table: &TableSpec,
    properties: &[PropertyDescriptor<E>],
) -> Vec<Value> {
    table
        .columns()
        .iter()
        .map(|column| {
            property(properties, &column.property_name).map_or(Value::Null, |p| p.get(entity))
        })
        .collect()
}

/// Write a database-generated key into the entity's id property.
///
/// Nothing happens when the table has no id column or no key was reported.
pub fn propagate_generated_key<E>(
    entity: &mut E,
    table: &TableSpec,
    properties: &[PropertyDescriptor<E>],
    key: Option<Value>,
) -> Result<()> {
    let Some(key) = key.filter(|k| !k.is_null()) else {
        return Ok(());
    };
    let Some(id) = table.id_column() else {
        return Ok(());
    };
    match property(properties, &id.property_name) {
        Some(prop) if prop.has_setter() => prop.set(entity, &key),
        _ => Ok(()),
    }
}

/// Run `sql` and map every returned row.
pub fn query_entities<E>(
    connection: &dyn Connection,
    sql: &str,
    params: &[Value],
    table: &TableSpec,
    properties: &[PropertyDescriptor<E>],
    constructor: impl Fn() -> E,
) -> Result<Vec<E>> {
    tracing::trace!(sql = %sql, params = params.len(), "Executing query");
    connection
        .query(sql, params)?
        .iter()
        .map(|row| row_to_entity(row, table, properties, &constructor))
        .collect()
}
