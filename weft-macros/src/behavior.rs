//! The `#[behavior]` attribute.
//!
//! Keeps the annotated function unchanged and submits a
//! `BehaviorRegistration` for it to `inventory`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemFn, LitStr, parse::Parse, parse_macro_input};

/// Arguments for the `#[behavior]` macro.
pub(crate) struct BehaviorArgs {
    /// Explicit `namespace/symbol`, split at the first `/`.
    pub name: Option<(String, String)>,
}

impl Parse for BehaviorArgs {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        if input.is_empty() {
            return Ok(BehaviorArgs { name: None });
        }

        let lit: LitStr = input.parse()?;
        let raw = lit.value();
        let raw = raw.trim();
        let raw = raw.strip_prefix("#'").unwrap_or(raw);
        match raw.split_once('/') {
            Some((namespace, symbol)) if !namespace.is_empty() && !symbol.is_empty() => {
                Ok(BehaviorArgs {
                    name: Some((namespace.to_string(), symbol.to_string())),
                })
            }
            _ => Err(syn::Error::new(
                lit.span(),
                "behavior name must be of the form \"namespace/symbol\"",
            )),
        }
    }
}

pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as BehaviorArgs);
    let input = parse_macro_input!(item as ItemFn);
    let fn_name = &input.sig.ident;

    if let Some(asyncness) = &input.sig.asyncness {
        return syn::Error::new_spanned(asyncness, "behavior functions must not be async")
            .to_compile_error()
            .into();
    }
    if !input.sig.generics.params.is_empty() {
        return syn::Error::new_spanned(
            &input.sig.generics,
            "behavior functions cannot be generic",
        )
        .to_compile_error()
        .into();
    }
    if input.sig.inputs.len() != 2 {
        return syn::Error::new_spanned(
            &input.sig.inputs,
            "behavior functions take `(conf: &Conf, options: Option<Value>)`",
        )
        .to_compile_error()
        .into();
    }

    let (namespace, symbol) = match &args.name {
        Some((namespace, symbol)) => (quote! { #namespace }, quote! { #symbol }),
        None => {
            let symbol = fn_name.to_string();
            (quote! { ::std::module_path!() }, quote! { #symbol })
        }
    };

    let expanded = quote! {
        #input

        ::weft::inventory::submit! {
            ::weft::registry::BehaviorRegistration::new(
                #namespace,
                #symbol,
                #fn_name as ::weft::registry::BehaviorFn,
            )
        }
    };

    TokenStream::from(expanded)
}
