//! Attribute parsing utilities for the implementer macros.

use proc_macro2::Span;
use syn::{Attribute, LitStr, Meta, meta::ParseNestedMeta, spanned::Spanned};

/// Parsed `#[implementer::target(...)]` arguments.
#[derive(Debug, Default)]
pub struct TargetAttrs {
    /// Override the target name (default: the trait name)
    pub name: Option<String>,
}

impl TargetAttrs {
    pub fn parse_meta(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("name") {
            let value: LitStr = meta.value()?.parse()?;
            self.name = Some(value.value());
            Ok(())
        } else {
            Err(meta.error(format!(
                "unknown target attribute: {}",
                meta.path.get_ident().map(|i| i.to_string()).unwrap_or_default()
            )))
        }
    }
}

/// Which accessor of a property a trait method is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    Get,
    Set,
}

/// Parsed `#[get]`, `#[get("Name")]`, `#[set]` or `#[set("Name")]`.
#[derive(Debug, Clone)]
pub struct AccessorAttr {
    pub kind: AccessorKind,
    /// Explicit property name
    pub property: Option<String>,
    pub span: Span,
}

impl AccessorAttr {
    /// Remove the accessor attribute from a trait method, if present.
    ///
    /// The attributes are inert markers for this macro and must not reach
    /// the emitted trait.
    pub fn take(attrs: &mut Vec<Attribute>) -> syn::Result<Option<Self>> {
        let mut found: Option<Self> = None;
        let mut index = 0;

        while index < attrs.len() {
            let kind = if attrs[index].path().is_ident("get") {
                AccessorKind::Get
            } else if attrs[index].path().is_ident("set") {
                AccessorKind::Set
            } else {
                index += 1;
                continue;
            };

            let attr = attrs.remove(index);
            if found.is_some() {
                return Err(syn::Error::new(
                    attr.span(),
                    "a method can carry only one accessor attribute",
                ));
            }

            let property = match &attr.meta {
                Meta::Path(_) => None,
                Meta::List(_) => Some(attr.parse_args::<LitStr>()?.value()),
                Meta::NameValue(_) => {
                    return Err(syn::Error::new(
                        attr.span(),
                        "expected #[get], #[get(\"Name\")], #[set] or #[set(\"Name\")]",
                    ));
                }
            };

            found = Some(Self {
                kind,
                property,
                span: attr.span(),
            });
        }

        Ok(found)
    }

    /// Property name, explicit or derived from the method name.
    ///
    /// Derived names strip a leading `get_`/`set_`.
    pub fn property_name(&self, method: &str) -> String {
        if let Some(name) = &self.property {
            return name.clone();
        }
        let prefix = match self.kind {
            AccessorKind::Get => "get_",
            AccessorKind::Set => "set_",
        };
        method.strip_prefix(prefix).unwrap_or(method).to_string()
    }
}
