//! Parsing logic for the Entity derive macro.
//!
//! Extracts struct-level and field-level `#[sqlrepo(...)]` attributes into
//! `EntityDef` and `FieldDef` used for code generation.

use proc_macro2::Span;
use syn::{Attribute, Data, DeriveInput, Error, Field, Fields, Generics, Ident, Lit, Result, Type};

/// Parsed entity definition from a struct with `#[derive(Entity)]`.
#[derive(Debug)]
pub struct EntityDef {
    /// The struct name (e.g., `Person`).
    pub name: Ident,
    /// Explicit table name from `#[sqlrepo(table = "...")]`.
    pub table: Option<String>,
    pub fields: Vec<FieldDef>,
    pub generics: Generics,
}

/// Parsed definition of one struct field.
#[derive(Debug)]
pub struct FieldDef {
    pub name: Ident,
    /// Explicit column name from `#[sqlrepo(column = "...")]`.
    pub column: Option<String>,
    pub ty: Type,
    pub id: bool,
    pub generated: bool,
    /// No setter is generated, so the field is never populated from rows.
    pub read_only: bool,
    /// Field is not a property at all.
    pub skip: bool,
}

impl EntityDef {
    /// Fields that become properties, in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.skip)
    }
}

impl FieldDef {
    /// Column name as the schema deriver will resolve it.
    pub fn effective_column(&self) -> String {
        self.column
            .clone()
            .unwrap_or_else(|| self.name.to_string().to_uppercase())
    }
}

/// Parse a `DeriveInput` into an `EntityDef`.
pub fn parse_entity(input: &DeriveInput) -> Result<EntityDef> {
    let name = input.ident.clone();
    let generics = input.generics.clone();
    let table = parse_struct_attrs(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not unions",
            ));
        }
    };

    Ok(EntityDef {
        name,
        table,
        fields,
        generics,
    })
}

/// Parse struct-level `#[sqlrepo(...)]` attributes.
///
/// Supported keys:
/// - `table = "name"` (overrides the upper-cased struct name)
fn parse_struct_attrs(attrs: &[Attribute]) -> Result<Option<String>> {
    let mut table: Option<String> = None;

    for attr in attrs {
        if !attr.path().is_ident("sqlrepo") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: Lit = meta.value()?.parse()?;
                let Lit::Str(lit_str) = value else {
                    return Err(Error::new_spanned(
                        value,
                        "expected string literal for table name",
                    ));
                };
                if table.is_some() {
                    return Err(Error::new_spanned(
                        meta.path,
                        "duplicate sqlrepo attribute: table",
                    ));
                }
                table = Some(lit_str.value());
                Ok(())
            } else {
                let name = meta
                    .path
                    .get_ident()
                    .map_or_else(|| "?".to_string(), ToString::to_string);
                Err(meta.error(format!(
                    "unknown sqlrepo struct attribute `{name}`. Valid attributes are: table"
                )))
            }
        })?;
    }

    Ok(table)
}

fn parse_fields(fields: &Fields) -> Result<Vec<FieldDef>> {
    match fields {
        Fields::Named(named) => named.named.iter().map(parse_field).collect(),
        Fields::Unnamed(_) => Err(Error::new(
            Span::call_site(),
            "Entity requires a struct with named fields, not a tuple struct",
        )),
        Fields::Unit => Err(Error::new(
            Span::call_site(),
            "Entity requires a struct with fields, not a unit struct",
        )),
    }
}

fn parse_field(field: &Field) -> Result<FieldDef> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let mut def = FieldDef {
        name,
        column: None,
        ty: field.ty.clone(),
        id: false,
        generated: false,
        read_only: false,
        skip: false,
    };

    for attr in &field.attrs {
        if !attr.path().is_ident("sqlrepo") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;
            if path.is_ident("id") {
                def.id = true;
            } else if path.is_ident("generated") {
                def.generated = true;
            } else if path.is_ident("read_only") {
                def.read_only = true;
            } else if path.is_ident("skip") {
                def.skip = true;
            } else if path.is_ident("column") {
                let value: Lit = meta.value()?.parse()?;
                let Lit::Str(lit_str) = value else {
                    return Err(Error::new_spanned(
                        value,
                        "expected string literal for column name",
                    ));
                };
                def.column = Some(lit_str.value());
            } else {
                let name = path
                    .get_ident()
                    .map_or_else(|| "?".to_string(), ToString::to_string);
                return Err(meta.error(format!(
                    "unknown sqlrepo field attribute `{name}`. \
                     Valid attributes are: column, id, generated, read_only, skip"
                )));
            }
            Ok(())
        })?;
    }

    Ok(def)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_parse_entity_defaults() {
        let input: DeriveInput = parse_quote! {
            struct Person {
                #[sqlrepo(id, generated)]
                id: Option<i64>,
                name: String,
                age: i32,
            }
        };

        let def = parse_entity(&input).unwrap();
        assert_eq!(def.name, "Person");
        assert_eq!(def.table, None);
        assert_eq!(def.fields.len(), 3);
        assert!(def.fields[0].id);
        assert!(def.fields[0].generated);
        assert!(!def.fields[1].id);
        assert_eq!(def.fields[2].effective_column(), "AGE");
    }

    #[test]
    fn test_parse_table_and_column_override() {
        let input: DeriveInput = parse_quote! {
            #[sqlrepo(table = "PEOPLE")]
            struct Person {
                #[sqlrepo(column = "FULL_NAME")]
                name: String,
                #[sqlrepo(read_only)]
                nickname: Option<String>,
            }
        };

        let def = parse_entity(&input).unwrap();
        assert_eq!(def.table.as_deref(), Some("PEOPLE"));
        assert_eq!(def.fields[0].effective_column(), "FULL_NAME");
        assert!(def.fields[1].read_only);
    }

    #[test]
    fn test_skip_excludes_property() {
        let input: DeriveInput = parse_quote! {
            struct Person {
                name: String,
                #[sqlrepo(skip)]
                cache: Vec<u8>,
            }
        };

        let def = parse_entity(&input).unwrap();
        let names: Vec<String> = def.properties().map(|f| f.name.to_string()).collect();
        assert_eq!(names, vec!["name"]);
    }

    #[test]
    fn test_unknown_field_attribute_errors() {
        let input: DeriveInput = parse_quote! {
            struct Person {
                #[sqlrepo(primary_key)]
                id: i64,
            }
        };

        let err = parse_entity(&input).unwrap_err();
        assert!(err.to_string().contains("unknown sqlrepo field attribute"));
    }

    #[test]
    fn test_duplicate_table_attribute_errors() {
        let input: DeriveInput = parse_quote! {
            #[sqlrepo(table = "A", table = "B")]
            struct Person {
                id: i64,
            }
        };

        assert!(parse_entity(&input).is_err());
    }

    #[test]
    fn test_rejects_enum_and_tuple_struct() {
        let input: DeriveInput = parse_quote! {
            enum Kind { A, B }
        };
        assert!(parse_entity(&input).is_err());

        let input: DeriveInput = parse_quote! {
            struct Pair(i64, String);
        };
        assert!(parse_entity(&input).is_err());
    }
}
