//! Implementation of the `#[implementer::target]` attribute macro.
//!
//! The macro keeps the trait as written (minus accessor markers) and emits:
//!
//! - `impl Implementable for dyn Trait`, describing the trait as a target
//!   built once per process
//! - `impl Trait for Instance`, where each method dispatches to the member
//!   with the same position in that description
//! - `impl dyn Trait { fn as_instance(..) }`, recovering the instance behind
//!   a trait object
//!
//! Supertraits that are themselves targets are inherited: their members come
//! first in the description, followed by the trait's own.

use std::collections::HashMap;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    FnArg, ItemTrait, Pat, ReturnType, Signature, TraitBoundModifier, TraitItem, Type,
    TypeParamBound, parse_macro_input, spanned::Spanned,
};

use crate::attrs::{AccessorAttr, AccessorKind, TargetAttrs};

/// Parameter name reserved for custom data.
const DATA_KEY: &str = "__data";

/// Supertraits that never describe members.
const MARKER_TRAITS: &[&str] = &["Send", "Sync", "Sized", "Unpin", "Any", "Debug"];

pub fn target_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut attrs = TargetAttrs::default();
    let parser = syn::meta::parser(|meta| attrs.parse_meta(meta));
    parse_macro_input!(attr with parser);

    let input = parse_macro_input!(item as ItemTrait);

    match target_inner(&attrs, input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct MemberInfo {
    sig: Signature,
    params: Vec<(String, syn::Ident, Type)>,
    return_type: Type,
    accessor: Option<(AccessorKind, String)>,
}

struct PropertyInfo {
    data_type: Type,
    getter: Option<usize>,
    setter: Option<usize>,
}

fn target_inner(attrs: &TargetAttrs, mut input: ItemTrait) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "generic traits cannot be implementation targets",
        ));
    }

    let trait_name = input.ident.clone();
    let target_name = attrs.name.clone().unwrap_or_else(|| trait_name.to_string());

    let mut members = Vec::new();
    for item in input.items.iter_mut() {
        match item {
            TraitItem::Fn(method) => {
                let accessor = AccessorAttr::take(&mut method.attrs)?;
                if method.default.is_some() {
                    // Provided methods keep their body and are not members.
                    if let Some(accessor) = accessor {
                        return Err(syn::Error::new(
                            accessor.span,
                            "accessor methods cannot have a default body",
                        ));
                    }
                    continue;
                }
                members.push(collect_member(&method.sig, accessor)?);
            }
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "implementation targets may only contain methods",
                ));
            }
        }
    }

    let bases = inherited_targets(&input);
    let properties = collect_properties(&members)?;
    let (declarations, ids, own_count) = declare_members(&members, &properties);

    let methods = members.iter().zip(&ids).map(|(member, id)| {
        let sig = &member.sig;
        let return_type = &member.return_type;
        let args = member.params.iter().map(|(_, ident, _)| ident);
        quote! {
            #sig {
                ::implementer::__private::dispatch::<dyn #trait_name, #return_type>(
                    self,
                    #own_count,
                    #id,
                    &[#(::implementer::IntoValue::into_value(#args)),*],
                )
            }
        }
    });

    input.items.push(syn::parse_quote! {
        #[doc(hidden)]
        fn __implementer_instance(&self) -> ::core::option::Option<&::implementer::Instance> {
            ::core::option::Option::None
        }
    });
    input.items.push(syn::parse_quote! {
        #[doc(hidden)]
        fn __implementer_instance_mut(
            &mut self,
        ) -> ::core::option::Option<&mut ::implementer::Instance> {
            ::core::option::Option::None
        }
    });

    Ok(quote! {
        #input

        impl dyn #trait_name {
            /// The instance behind this trait object, when it was synthesized.
            pub fn as_instance(&self) -> ::core::option::Option<&::implementer::Instance> {
                <Self as #trait_name>::__implementer_instance(self)
            }

            pub fn as_instance_mut(
                &mut self,
            ) -> ::core::option::Option<&mut ::implementer::Instance> {
                <Self as #trait_name>::__implementer_instance_mut(self)
            }
        }

        impl ::implementer::Implementable for dyn #trait_name {
            fn target() -> ::core::result::Result<
                ::implementer::__private::Arc<::implementer::TargetType>,
                ::implementer::DeclarationError,
            > {
                static TARGET: ::implementer::__private::OnceLock<
                    ::core::result::Result<
                        ::implementer::__private::Arc<::implementer::TargetType>,
                        ::implementer::DeclarationError,
                    >,
                > = ::implementer::__private::OnceLock::new();

                TARGET
                    .get_or_init(|| {
                        let target = ::implementer::TargetType::interface(#target_name)
                            #(#bases)*
                            #(#declarations)*
                            .build();
                        ::core::result::Result::Ok(::implementer::__private::Arc::new(target))
                    })
                    .clone()
            }
        }

        impl #trait_name for ::implementer::Instance {
            #(#methods)*

            fn __implementer_instance(&self) -> ::core::option::Option<&::implementer::Instance> {
                ::core::option::Option::Some(self)
            }

            fn __implementer_instance_mut(
                &mut self,
            ) -> ::core::option::Option<&mut ::implementer::Instance> {
                ::core::option::Option::Some(self)
            }
        }
    })
}

/// `.inherit(..)` calls for every supertrait that is not a marker trait.
fn inherited_targets(input: &ItemTrait) -> Vec<TokenStream2> {
    input
        .supertraits
        .iter()
        .filter_map(|bound| match bound {
            TypeParamBound::Trait(bound) => Some(bound),
            _ => None,
        })
        .filter(|bound| !matches!(bound.modifier, TraitBoundModifier::Maybe(_)))
        .filter(|bound| {
            bound
                .path
                .segments
                .last()
                .is_some_and(|segment| !MARKER_TRAITS.contains(&segment.ident.to_string().as_str()))
        })
        .map(|bound| {
            let path = &bound.path;
            quote! {
                .inherit(<dyn #path as ::implementer::Implementable>::target()?)?
            }
        })
        .collect()
}

fn collect_member(sig: &Signature, accessor: Option<AccessorAttr>) -> syn::Result<MemberInfo> {
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            "target methods cannot be generic",
        ));
    }
    if let Some(token) = &sig.asyncness {
        return Err(syn::Error::new(token.span(), "target methods cannot be async"));
    }

    match sig.receiver() {
        Some(receiver) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(syn::Error::new(
                sig.span(),
                "target methods must take `&self`",
            ));
        }
    }

    let mut params = Vec::new();
    for input in &sig.inputs {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };
        let Pat::Ident(pat) = &*pat_type.pat else {
            return Err(syn::Error::new(
                pat_type.pat.span(),
                "target method parameters must be plain identifiers",
            ));
        };
        let name = pat.ident.to_string();
        if name == DATA_KEY {
            return Err(syn::Error::new(
                pat.ident.span(),
                "`__data` is reserved for custom data",
            ));
        }
        params.push((name, pat.ident.clone(), (*pat_type.ty).clone()));
    }

    let return_type: Type = match &sig.output {
        ReturnType::Default => syn::parse_quote!(()),
        ReturnType::Type(_, ty) => (**ty).clone(),
    };
    let returns_unit = matches!(&return_type, Type::Tuple(tuple) if tuple.elems.is_empty());

    let accessor = match accessor {
        None => None,
        Some(attr) => {
            let method = sig.ident.to_string();
            match attr.kind {
                AccessorKind::Get if !params.is_empty() || returns_unit => {
                    return Err(syn::Error::new(
                        attr.span,
                        "a getter takes no parameters and returns the property value",
                    ));
                }
                AccessorKind::Set if params.len() != 1 || !returns_unit => {
                    return Err(syn::Error::new(
                        attr.span,
                        "a setter takes exactly one parameter and returns nothing",
                    ));
                }
                _ => {}
            }
            Some((attr.kind, attr.property_name(&method)))
        }
    };

    Ok(MemberInfo {
        sig: sig.clone(),
        params,
        return_type,
        accessor,
    })
}

fn collect_properties(members: &[MemberInfo]) -> syn::Result<HashMap<String, PropertyInfo>> {
    let mut properties: HashMap<String, PropertyInfo> = HashMap::new();

    for (index, member) in members.iter().enumerate() {
        let Some((kind, name)) = &member.accessor else {
            continue;
        };
        let data_type = match kind {
            AccessorKind::Get => member.return_type.clone(),
            AccessorKind::Set => member.params[0].2.clone(),
        };

        let property = properties.entry(name.clone()).or_insert_with(|| PropertyInfo {
            data_type: data_type.clone(),
            getter: None,
            setter: None,
        });

        let existing = &property.data_type;
        if quote!(#data_type).to_string() != quote!(#existing).to_string() {
            return Err(syn::Error::new(
                member.sig.span(),
                format!("getter and setter of '{}' disagree on the property type", name),
            ));
        }

        let (slot, which) = match kind {
            AccessorKind::Get => (&mut property.getter, "get"),
            AccessorKind::Set => (&mut property.setter, "set"),
        };
        if slot.is_some() {
            return Err(syn::Error::new(
                member.sig.span(),
                format!("property '{}' has two {} accessors", name, which),
            ));
        }
        *slot = Some(index);
    }

    Ok(properties)
}

/// Emit builder calls in declaration order, the member id of each method
/// and the number of members declared.
///
/// A property is declared where its first accessor appears; its getter and
/// setter then take consecutive ids. Ids count from the first member the
/// trait declares itself, after any inherited ones.
fn declare_members(
    members: &[MemberInfo],
    properties: &HashMap<String, PropertyInfo>,
) -> (Vec<TokenStream2>, Vec<usize>, usize) {
    let mut declarations = Vec::new();
    let mut ids = vec![0usize; members.len()];
    let mut next = 0usize;
    let mut declared: Vec<&str> = Vec::new();

    for (index, member) in members.iter().enumerate() {
        match &member.accessor {
            None => {
                let name = member.sig.ident.to_string();
                let return_type = &member.return_type;
                let params = member.params.iter().map(|(name, _, ty)| {
                    quote! {
                        ::implementer::Param::new(#name, <#ty as ::implementer::Typed>::data_type())
                    }
                });
                declarations.push(quote! {
                    .method_sig(
                        #name,
                        ::std::vec![#(#params),*],
                        <#return_type as ::implementer::Typed>::data_type(),
                    )?
                });
                ids[index] = next;
                next += 1;
            }
            Some((_, name)) => {
                if declared.contains(&name.as_str()) {
                    continue;
                }
                declared.push(name);

                let Some(property) = properties.get(name) else {
                    continue;
                };
                let data_type = &property.data_type;
                let get = property.getter.is_some();
                let set = property.setter.is_some();
                declarations.push(quote! {
                    .property_sig(
                        #name,
                        <#data_type as ::implementer::Typed>::data_type(),
                        #get,
                        #set,
                    )?
                });
                for accessor in [property.getter, property.setter].into_iter().flatten() {
                    ids[accessor] = next;
                    next += 1;
                }
            }
        }
    }

    (declarations, ids, next)
}
