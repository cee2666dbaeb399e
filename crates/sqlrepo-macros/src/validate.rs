//! Compile-time validation for the Entity derive macro.
//!
//! Problems that can be seen in the struct definition are reported here with
//! spans; problems that depend on type identity (unmapped types, more than one
//! identifier) surface as configuration errors when the schema is derived.

use std::collections::HashSet;

use proc_macro2::Span;
use syn::{Error, Type};

use crate::parse::{EntityDef, FieldDef};

/// Validate a parsed entity, combining every problem into one error.
pub fn validate_entity(entity: &EntityDef) -> Result<(), Error> {
    let mut errors = Vec::new();

    if entity.properties().next().is_none() {
        errors.push(Error::new(
            entity.name.span(),
            "Entity struct must have at least one non-skipped field",
        ));
    }
    if let Some(table) = &entity.table {
        validate_identifier("table", table, entity.name.span(), &mut errors);
    }
    validate_no_duplicate_columns(entity, &mut errors);

    for field in &entity.fields {
        validate_field(field, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        let mut combined = errors.remove(0);
        for err in errors {
            combined.combine(err);
        }
        Err(combined)
    }
}

/// Reject identifiers that would break the generated SQL text.
fn validate_identifier(what: &str, name: &str, span: Span, errors: &mut Vec<Error>) {
    const DANGEROUS_CHARS: &[char] = &[';', '\'', '"', '`', '-', '/', '*', '\\', '\0', '\n', '\r'];

    if name.trim().is_empty() {
        errors.push(Error::new(span, format!("{what} name cannot be empty")));
        return;
    }
    if let Some(ch) = name.chars().find(|c| DANGEROUS_CHARS.contains(c)) {
        errors.push(Error::new(
            span,
            format!(
                "{what} name contains invalid character '{ch}'; \
                 use alphanumeric characters and underscores"
            ),
        ));
        return;
    }
    if let Some(first) = name.chars().next() {
        if !first.is_alphabetic() && first != '_' {
            errors.push(Error::new(
                span,
                format!("{what} name must start with a letter or underscore, got '{first}'"),
            ));
        }
    }
}

fn validate_no_duplicate_columns(entity: &EntityDef, errors: &mut Vec<Error>) {
    let mut seen: HashSet<String> = HashSet::new();

    for field in entity.properties() {
        let column = field.effective_column();
        if !seen.insert(column.to_uppercase()) {
            errors.push(Error::new(
                field.name.span(),
                format!(
                    "duplicate column name '{column}'; another field already maps to this column"
                ),
            ));
        }
    }
}

fn validate_field(field: &FieldDef, errors: &mut Vec<Error>) {
    if let Some(column) = &field.column {
        validate_identifier("column", column, field.name.span(), errors);
    }

    if field.skip && (field.id || field.generated || field.column.is_some()) {
        errors.push(Error::new(
            field.name.span(),
            "#[sqlrepo(skip)] cannot be combined with column, id or generated; \
             skipped fields are not properties",
        ));
    }

    if matches!(field.ty, Type::Reference(_) | Type::Ptr(_)) {
        errors.push(Error::new(
            field.name.span(),
            "reference and pointer fields are not supported; use owned types instead",
        ));
    }
}
