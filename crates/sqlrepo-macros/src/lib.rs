//! Procedural macros for sqlrepo.
//!
//! `sqlrepo-macros` is the compile-time introspection layer:
//!
//! - `#[derive(Entity)]` turns a struct into an ordered list of property
//!   descriptors (name, declared type, getter, setter, annotations).
//! - `#[repository]` turns a contract trait into a concrete implementation
//!   whose methods are routed through the runtime dispatcher.
//!
//! These macros are used by application crates via the `sqlrepo` facade.

use proc_macro::TokenStream;
use quote::quote;

mod parse;
mod repository;
mod validate;

use parse::{EntityDef, FieldDef, parse_entity};

/// Derive macro for the `Entity` trait.
///
/// # Attributes
///
/// - `#[sqlrepo(table = "NAME")]` - Override the table name (defaults to the upper-cased struct name)
/// - `#[sqlrepo(column = "NAME")]` - Override the column name (defaults to the upper-cased field name)
/// - `#[sqlrepo(id)]` - Mark the field as the primary key
/// - `#[sqlrepo(generated)]` - The database generates the value
/// - `#[sqlrepo(read_only)]` - Generate no setter; the field is never populated from rows
/// - `#[sqlrepo(skip)]` - The field is not a property
///
/// # Example
///
/// ```ignore
/// use sqlrepo::prelude::*;
///
/// #[derive(Entity, Debug, Default, Clone, PartialEq)]
/// struct Person {
///     #[sqlrepo(id, generated)]
///     id: Option<i64>,
///     name: String,
///     age: i32,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(sqlrepo))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let entity = match parse_entity(&input) {
        Ok(e) => e,
        Err(e) => return e.to_compile_error().into(),
    };

    if let Err(e) = validate::validate_entity(&entity) {
        return e.to_compile_error().into();
    }

    generate_entity_impl(&entity).into()
}

/// Generate the Entity trait implementation.
fn generate_entity_impl(entity: &EntityDef) -> proc_macro2::TokenStream {
    let name = &entity.name;
    let type_name = name.to_string();
    let (impl_generics, ty_generics, where_clause) = entity.generics.split_for_impl();

    let type_annotations = entity.table.as_ref().map(|table| {
        quote! {
            fn type_annotations() -> ::sqlrepo_core::Annotations {
                ::sqlrepo_core::Annotations::new(&[::sqlrepo_core::Annotation::Table(#table)])
            }
        }
    });

    let descriptors = entity.properties().map(generate_descriptor);

    quote! {
        impl #impl_generics ::sqlrepo_core::Entity for #name #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;

            #type_annotations

            fn properties() -> ::std::vec::Vec<::sqlrepo_core::PropertyDescriptor<Self>> {
                ::std::vec![#(#descriptors),*]
            }
        }
    }
}

fn generate_descriptor(field: &FieldDef) -> proc_macro2::TokenStream {
    let ident = &field.name;
    let prop = ident.to_string();
    let ty = &field.ty;

    let mut annotations = Vec::new();
    if let Some(column) = &field.column {
        annotations.push(quote! { ::sqlrepo_core::Annotation::Column(#column) });
    }
    if field.id {
        annotations.push(quote! { ::sqlrepo_core::Annotation::Id });
    }
    if field.generated {
        annotations.push(quote! { ::sqlrepo_core::Annotation::GeneratedValue });
    }

    let setter = (!field.read_only).then(|| {
        quote! {
            .with_setter(|entity: &mut Self, value: &::sqlrepo_core::Value| {
                entity.#ident = ::sqlrepo_core::convert_property::<#ty>(#prop, value)?;
                ::core::result::Result::Ok(())
            })
        }
    });

    let with_annotations = (!annotations.is_empty()).then(|| {
        quote! { .with_annotations(&[#(#annotations),*]) }
    });

    quote! {
        ::sqlrepo_core::PropertyDescriptor::new(
            #prop,
            ::sqlrepo_core::PropertyType::of::<#ty>(),
            |entity: &Self| ::sqlrepo_core::Value::from(::core::clone::Clone::clone(&entity.#ident)),
        )
        #setter
        #with_annotations
    }
}

/// Attribute macro for repository contracts.
///
/// Generates `<Trait>Impl`, a dispatcher-backed implementation. Methods may
/// carry `#[query("SQL")]` to run literal SQL with the arguments bound
/// positionally; all other methods are dispatched by name.
///
/// # Example
///
/// ```ignore
/// #[repository]
/// trait PersonRepository: Repository<Person, i64> {
///     fn find_by_age(&self, cx: &TransactionContext, age: i32) -> Result<Option<Person>>;
///
///     #[query("SELECT * FROM PERSON WHERE AGE > ?")]
///     fn older_than(&self, cx: &TransactionContext, age: i32) -> Result<Vec<Person>>;
/// }
///
/// let people = PersonRepositoryImpl::shared()?;
/// ```
#[proc_macro_attribute]
pub fn repository(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        let attr = proc_macro2::TokenStream::from(attr);
        return syn::Error::new_spanned(attr, "#[repository] takes no arguments")
            .to_compile_error()
            .into();
    }

    let item = syn::parse_macro_input!(item as syn::ItemTrait);
    match repository::parse_contract(item) {
        Ok(contract) => repository::generate(&contract).into(),
        Err(e) => e.to_compile_error().into(),
    }
}
