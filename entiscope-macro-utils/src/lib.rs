//! Shared utilities for entiscope procedural macros
//!
//! Attribute parsing used by the `#[entity_scope]` attribute and the
//! `#[derive(Entity)]` macro in `entiscope-macros`.

use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{punctuated::Punctuated, Attribute, Expr, Meta, MetaNameValue, Token};

/// Parsed arguments of `#[entity_scope(...)]`
pub struct ScopeAttributes {
    pub mode: TokenStream2,
}

impl Default for ScopeAttributes {
    fn default() -> Self {
        Self {
            mode: quote! { ::entiscope::ScopeMode::Normal },
        }
    }
}

/// Parse the `mode` attribute and return the string value
pub fn parse_mode_attribute(nv: &MetaNameValue) -> Result<String, TokenStream2> {
    match &nv.value {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            syn::Lit::Str(s) => {
                let val = s.value();
                // Validate the mode value
                if val == "normal" || val == "force_new" || val == "force_new_sealed" {
                    Ok(val)
                } else {
                    Err(
                        quote! { compile_error!("Invalid mode: expected \"normal\", \"force_new\", or \"force_new_sealed\"") },
                    )
                }
            }
            _ => Err(quote! { compile_error!("Invalid literal for `mode`: expected string") }),
        },
        _ => Err(
            quote! { compile_error!("Invalid syntax for `mode`: expected `mode = \"normal\"|\"force_new\"|\"force_new_sealed\"`") },
        ),
    }
}

/// Map a validated mode string to the `ScopeMode` variant path
pub fn mode_tokens(mode: &str) -> TokenStream2 {
    match mode {
        "force_new" => quote! { ::entiscope::ScopeMode::ForceNew },
        "force_new_sealed" => quote! { ::entiscope::ScopeMode::ForceNewSealed },
        _ => quote! { ::entiscope::ScopeMode::Normal },
    }
}

/// Parse `#[entity_scope(...)]` arguments from a token stream
pub fn parse_scope_attributes(attr: TokenStream2) -> Result<ScopeAttributes, TokenStream2> {
    use syn::parse::Parser;

    let parser = Punctuated::<MetaNameValue, Token![,]>::parse_terminated;
    let parsed_args = parser.parse2(attr).map_err(|e| {
        let msg = format!("Failed to parse attributes: {}", e);
        quote! { compile_error!(#msg) }
    })?;

    let mut attrs = ScopeAttributes::default();

    for nv in parsed_args {
        if nv.path.is_ident("mode") {
            let mode = parse_mode_attribute(&nv)?;
            attrs.mode = mode_tokens(&mode);
        } else {
            let msg = format!(
                "Unknown `entity_scope` argument: `{}`",
                quote! { #nv }.to_string()
            );
            return Err(quote! { compile_error!(#msg) });
        }
    }

    Ok(attrs)
}

/// Whether `attrs` carries `#[entity(<flag>)]`, e.g. `#[entity(id)]`
pub fn has_entity_flag(attrs: &[Attribute], flag: &str) -> Result<bool, TokenStream2> {
    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }
        let nested = attr
            .parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)
            .map_err(|e| {
                let msg = format!("Failed to parse `entity` attribute: {}", e);
                quote! { compile_error!(#msg) }
            })?;
        for meta in nested {
            match meta {
                Meta::Path(path) if path.is_ident(flag) => return Ok(true),
                Meta::Path(_) => {}
                _ => {
                    return Err(
                        quote! { compile_error!("Invalid `entity` attribute: expected `#[entity(id)]` or `#[entity(default)]`") },
                    )
                }
            }
        }
    }
    Ok(false)
}
