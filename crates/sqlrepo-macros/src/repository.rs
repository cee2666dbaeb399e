//! Parsing and code generation for `#[repository]` traits.
//!
//! A repository contract is a trait extending `Repository<Entity, Id>`. Every
//! method without a default body must take `&self` and a transaction context,
//! followed by any number of arguments. The macro emits the trait unchanged
//! (minus `#[query]` markers) and a `<Trait>Impl` struct whose methods route
//! through the runtime dispatcher.

use proc_macro2::TokenStream;
use quote::{ToTokens, format_ident, quote};
use syn::{
    Error, FnArg, GenericArgument, Ident, ItemTrait, LitStr, Pat, PathArguments, Result,
    ReturnType, Signature, TraitItem, Type, TypeParamBound,
};

/// Parsed repository contract.
pub struct ContractDef {
    pub item: ItemTrait,
    pub entity: Type,
    pub id: Type,
    pub methods: Vec<MethodDef>,
}

/// One dispatched method of a contract.
pub struct MethodDef {
    pub sig: Signature,
    pub query: Option<String>,
    pub context: Ident,
    pub args: Vec<(Ident, ArgKind)>,
    pub returns: ReturnShape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Value,
    Entity,
    EntityRef,
}

/// What the `Ok` side of a method's `Result` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    List,
    Optional,
    Entity,
}

/// Parse a trait annotated with `#[repository]`.
pub fn parse_contract(mut item: ItemTrait) -> Result<ContractDef> {
    let (entity, id) = find_repository_bound(&item)?;
    let mut methods = Vec::new();

    for trait_item in &mut item.items {
        let TraitItem::Fn(method) = trait_item else {
            continue;
        };

        let mut query = None;
        let mut kept = Vec::with_capacity(method.attrs.len());
        for attr in method.attrs.drain(..) {
            if attr.path().is_ident("query") {
                if query.is_some() {
                    return Err(Error::new_spanned(attr, "duplicate #[query] attribute"));
                }
                let sql: LitStr = attr.parse_args()?;
                if sql.value().trim().is_empty() {
                    return Err(Error::new_spanned(sql, "#[query] SQL cannot be empty"));
                }
                query = Some(sql.value());
            } else {
                kept.push(attr);
            }
        }
        method.attrs = kept;

        if method.default.is_some() {
            if query.is_some() {
                return Err(Error::new_spanned(
                    &method.sig,
                    "#[query] methods cannot have a default body",
                ));
            }
            continue;
        }

        methods.push(parse_method(&method.sig, query, &entity)?);
    }

    Ok(ContractDef {
        item,
        entity,
        id,
        methods,
    })
}

/// Find `Repository<E, ID>` among the supertraits.
fn find_repository_bound(item: &ItemTrait) -> Result<(Type, Type)> {
    for bound in &item.supertraits {
        let TypeParamBound::Trait(trait_bound) = bound else {
            continue;
        };
        let Some(segment) = trait_bound.path.segments.last() else {
            continue;
        };
        if segment.ident != "Repository" {
            continue;
        }
        if let PathArguments::AngleBracketed(args) = &segment.arguments {
            let types: Vec<&Type> = args
                .args
                .iter()
                .filter_map(|arg| match arg {
                    GenericArgument::Type(ty) => Some(ty),
                    _ => None,
                })
                .collect();
            if let [entity, id] = types.as_slice() {
                return Ok(((*entity).clone(), (*id).clone()));
            }
        }
        return Err(Error::new_spanned(
            bound,
            "expected `Repository<Entity, Id>` with exactly two type arguments",
        ));
    }

    Err(Error::new_spanned(
        &item.ident,
        "repository contract must extend `Repository<Entity, Id>`",
    ))
}

fn parse_method(sig: &Signature, query: Option<String>, entity: &Type) -> Result<MethodDef> {
    let mut inputs = sig.inputs.iter();

    match inputs.next() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(Error::new_spanned(
                sig,
                "repository methods must take `&self` as their receiver",
            ));
        }
    }

    let context = match inputs.next() {
        Some(FnArg::Typed(arg)) => pat_ident(&arg.pat)?,
        _ => {
            return Err(Error::new_spanned(
                sig,
                "repository methods take a transaction context as their first argument",
            ));
        }
    };

    let entity_tokens = normalized(entity);
    let mut args = Vec::new();
    for input in inputs {
        let FnArg::Typed(arg) = input else {
            return Err(Error::new_spanned(input, "unexpected receiver"));
        };
        let kind = match arg.ty.as_ref() {
            Type::Reference(r) if normalized(&r.elem) == entity_tokens => ArgKind::EntityRef,
            ty if normalized(ty) == entity_tokens => ArgKind::Entity,
            _ => ArgKind::Value,
        };
        args.push((pat_ident(&arg.pat)?, kind));
    }

    Ok(MethodDef {
        returns: return_shape(sig)?,
        sig: sig.clone(),
        query,
        context,
        args,
    })
}

/// Classify `Result<Vec<_>>`, `Result<Option<_>>` and `Result<_>`.
fn return_shape(sig: &Signature) -> Result<ReturnShape> {
    let ok_type = match &sig.output {
        ReturnType::Type(_, ty) => last_segment_argument(ty, "Result"),
        ReturnType::Default => None,
    };
    let Some(ok_type) = ok_type else {
        return Err(Error::new_spanned(
            &sig.output,
            "repository methods must return `Result<...>`",
        ));
    };
    Ok(if last_segment_argument(ok_type, "Vec").is_some() {
        ReturnShape::List
    } else if last_segment_argument(ok_type, "Option").is_some() {
        ReturnShape::Optional
    } else {
        ReturnShape::Entity
    })
}

/// The first type argument of `ty` when its last path segment is `name`.
fn last_segment_argument<'a>(ty: &'a Type, name: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != name {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

fn pat_ident(pat: &Pat) -> Result<Ident> {
    match pat {
        Pat::Ident(p) => Ok(p.ident.clone()),
        other => Err(Error::new_spanned(
            other,
            "repository method arguments must be plain identifiers",
        )),
    }
}

fn normalized(ty: &Type) -> String {
    ty.to_token_stream().to_string().replace(' ', "")
}

/// Generate the trait and its dispatcher-backed implementation.
pub fn generate(contract: &ContractDef) -> TokenStream {
    let item = &contract.item;
    let vis = &item.vis;
    let trait_name = &item.ident;
    let trait_name_str = trait_name.to_string();
    let impl_name = format_ident!("{}Impl", trait_name);
    let entity = &contract.entity;
    let id = &contract.id;

    let specs = contract.methods.iter().map(|m| {
        let name = m.sig.ident.to_string();
        match &m.query {
            Some(sql) => quote! { ::sqlrepo_query::MethodSpec::with_query(#name, #sql) },
            None => quote! { ::sqlrepo_query::MethodSpec::new(#name) },
        }
    });

    let bodies = contract.methods.iter().map(|m| {
        let sig = &m.sig;
        let name = m.sig.ident.to_string();
        let cx = &m.context;
        let args = m.args.iter().map(|(arg, kind)| match kind {
            ArgKind::Value => quote! {
                ::sqlrepo_query::Argument::Value(::sqlrepo_core::Value::from(#arg))
            },
            ArgKind::Entity => quote! { ::sqlrepo_query::Argument::Entity(#arg) },
            ArgKind::EntityRef => quote! {
                ::sqlrepo_query::Argument::Entity(::core::clone::Clone::clone(#arg))
            },
        });
        let convert = match m.returns {
            ReturnShape::List => quote! { ::sqlrepo_query::Dispatched::into_list },
            ReturnShape::Optional => quote! { ::sqlrepo_query::Dispatched::into_optional },
            ReturnShape::Entity => quote! { ::sqlrepo_query::Dispatched::into_entity },
        };
        quote! {
            #sig {
                let args = ::std::vec![#(#args),*];
                self.dispatcher
                    .invoke(#cx, #name, args)
                    .and_then(#convert)
            }
        }
    });

    quote! {
        #item

        #[doc = concat!("Dispatcher-backed implementation of [`", #trait_name_str, "`].")]
        #[derive(Debug)]
        #vis struct #impl_name {
            dispatcher: ::sqlrepo_query::Dispatcher<#entity>,
        }

        impl #impl_name {
            /// Shared, process-wide instance of this repository.
            #vis fn shared() -> ::sqlrepo_core::Result<::std::sync::Arc<Self>> {
                ::sqlrepo_query::build_repository::<Self>()
            }
        }

        impl ::sqlrepo_query::RepositoryContract for #impl_name {
            type Entity = #entity;
            type Id = #id;

            const NAME: &'static str = #trait_name_str;

            fn methods() -> ::std::vec::Vec<::sqlrepo_query::MethodSpec> {
                ::std::vec![#(#specs),*]
            }

            fn from_dispatcher(dispatcher: ::sqlrepo_query::Dispatcher<#entity>) -> Self {
                Self { dispatcher }
            }

            fn dispatcher(&self) -> &::sqlrepo_query::Dispatcher<#entity> {
                &self.dispatcher
            }
        }

        impl #trait_name for #impl_name {
            #(#bodies)*
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn person_contract() -> ItemTrait {
        parse_quote! {
            pub trait PersonRepository: Repository<Person, i64> {
                fn find_by_age(&self, cx: &TransactionContext, age: i32) -> Result<Option<Person>>;

                #[query("SELECT * FROM PERSON WHERE NAME = ?")]
                fn named(&self, cx: &TransactionContext, name: &str) -> Result<Vec<Person>>;

                fn store(&self, cx: &TransactionContext, person: &Person) -> Result<Person>;

                fn describe(&self) -> String {
                    String::new()
                }
            }
        }
    }

    #[test]
    fn test_parse_contract_finds_entity_and_methods() {
        let contract = parse_contract(person_contract()).unwrap();
        assert_eq!(normalized(&contract.entity), "Person");
        assert_eq!(normalized(&contract.id), "i64");

        let names: Vec<String> = contract
            .methods
            .iter()
            .map(|m| m.sig.ident.to_string())
            .collect();
        assert_eq!(names, vec!["find_by_age", "named", "store"]);

        assert_eq!(contract.methods[0].context, "cx");
        assert_eq!(contract.methods[0].args[0].1, ArgKind::Value);
        assert_eq!(
            contract.methods[1].query.as_deref(),
            Some("SELECT * FROM PERSON WHERE NAME = ?")
        );
        assert_eq!(contract.methods[2].args[0].1, ArgKind::EntityRef);

        let shapes: Vec<ReturnShape> = contract.methods.iter().map(|m| m.returns).collect();
        assert_eq!(
            shapes,
            vec![ReturnShape::Optional, ReturnShape::List, ReturnShape::Entity]
        );
    }

    #[test]
    fn test_method_without_result_errors() {
        let item: ItemTrait = parse_quote! {
            trait PersonRepository: Repository<Person, i64> {
                fn find_by_age(&self, cx: &TransactionContext, age: i32) -> Option<Person>;
            }
        };
        let err = parse_contract(item).err().unwrap();
        assert!(err.to_string().contains("must return"));
    }

    #[test]
    fn test_query_attributes_are_stripped() {
        let contract = parse_contract(person_contract()).unwrap();
        let tokens = contract.item.to_token_stream().to_string();
        assert!(!tokens.contains("query"));
    }

    #[test]
    fn test_missing_repository_bound_errors() {
        let item: ItemTrait = parse_quote! {
            trait Loose {
                fn find_all(&self, cx: &TransactionContext) -> Result<Vec<Person>>;
            }
        };
        let err = parse_contract(item).err().unwrap();
        assert!(err.to_string().contains("must extend"));
    }

    #[test]
    fn test_method_without_context_errors() {
        let item: ItemTrait = parse_quote! {
            trait PersonRepository: Repository<Person, i64> {
                fn find_by_age(&self) -> Result<Option<Person>>;
            }
        };
        assert!(parse_contract(item).is_err());
    }

    #[test]
    fn test_generate_emits_impl_struct() {
        let contract = parse_contract(person_contract()).unwrap();
        let out = generate(&contract).to_string();
        assert!(out.contains("struct PersonRepositoryImpl"));
        assert!(out.contains("RepositoryContract for PersonRepositoryImpl"));
        assert!(out.contains("MethodSpec :: with_query"));
        assert!(out.contains("Dispatched :: into_optional"));
        assert!(out.contains("Dispatched :: into_list"));
    }
}
