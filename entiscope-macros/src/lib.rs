use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, ItemFn};

// Import shared utilities
use entiscope_macro_utils::{has_entity_flag, parse_scope_attributes};

/// Derives `entiscope::Entity` for a struct with named fields.
///
/// The primary key field is the one marked `#[entity(id)]`, or the field
/// named `id` when none is marked. It must have type `Option<PrimaryKey>`.
///
/// Adding `#[entity(default)]` on the struct uses its `Default`
/// implementation as the bare constructor, so the type can be built by
/// `entiscope::factory::construct`.
///
/// # Examples
///
/// ```ignore
/// use entiscope::{Entity, PrimaryKey};
///
/// #[derive(Entity, Default)]
/// #[entity(default)]
/// struct Invoice {
///     #[entity(id)]
///     number: Option<PrimaryKey>,
///     total: u64,
/// }
///
/// let invoice = entiscope::factory::construct::<Invoice>(10).unwrap();
/// assert_eq!(invoice.borrow().number, Some(PrimaryKey::Int(10)));
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.into(),
    }
}

fn expand_entity(input: &DeriveInput) -> Result<TokenStream2, TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(
                    quote! { compile_error!("`Entity` can only be derived for structs with named fields"); },
                )
            }
        },
        _ => return Err(quote! { compile_error!("`Entity` can only be derived for structs"); }),
    };

    let mut id_field = None;
    for field in fields {
        if has_entity_flag(&field.attrs, "id")? {
            if id_field.is_some() {
                return Err(
                    quote! { compile_error!("only one field can be marked `#[entity(id)]`"); },
                );
            }
            id_field = field.ident.clone();
        }
    }
    let id_field = match id_field.or_else(|| {
        fields
            .iter()
            .filter_map(|f| f.ident.clone())
            .find(|ident| ident == "id")
    }) {
        Some(ident) => ident,
        None => {
            return Err(
                quote! { compile_error!("`Entity` needs a field named `id` or marked `#[entity(id)]`"); },
            )
        }
    };

    let bare_constructor = if has_entity_flag(&input.attrs, "default")? {
        quote! {
            fn bare_constructor() -> ::std::option::Option<fn() -> Self> {
                ::std::option::Option::Some(<Self as ::std::default::Default>::default)
            }
        }
    } else {
        quote! {}
    };

    Ok(quote! {
        impl #impl_generics ::entiscope::Entity for #name #ty_generics #where_clause {
            fn id(&self) -> ::std::option::Option<&::entiscope::PrimaryKey> {
                self.#id_field.as_ref()
            }

            fn set_id(&mut self, id: ::entiscope::PrimaryKey) {
                self.#id_field = ::std::option::Option::Some(id);
            }

            #bare_constructor
        }
    })
}

/// Runs a function inside an entity scope.
///
/// The function body executes with a scope opened in the requested mode on
/// the calling thread. The scope is released when the function returns,
/// early returns and panics included.
///
/// # Macro Parameters
///
/// - `mode` (optional): How to treat an already active scope. Options:
///   - `"normal"` - Reuse the active scope, or open one if none is active (default)
///   - `"force_new"` - Always open a fresh scope
///   - `"force_new_sealed"` - Always open a fresh, sealed scope
///
/// Async functions are rejected: a scope belongs to one thread and must not
/// be held across `.await` points.
///
/// # Examples
///
/// ```ignore
/// use entiscope::entity_scope;
///
/// #[entity_scope(mode = "force_new")]
/// fn load_report(id: i64) -> usize {
///     // runs with a fresh identity map
///     entiscope::scope::with_map(|map| map.len()).unwrap()
/// }
/// ```
#[proc_macro_attribute]
pub fn entity_scope(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = match parse_scope_attributes(attr.into()) {
        Ok(attrs) => attrs,
        Err(err) => return err.into(),
    };
    let input = parse_macro_input!(item as ItemFn);

    if input.sig.asyncness.is_some() {
        return quote! {
            compile_error!("`entity_scope` cannot be used on async functions: scopes are confined to one thread");
        }
        .into();
    }

    let vis = &input.vis;
    let sig = &input.sig;
    let fn_attrs = &input.attrs;
    let block = &input.block;
    let mode = &attrs.mode;

    let expanded = quote! {
        #(#fn_attrs)*
        #vis #sig {
            let __entity_scope_guard = ::entiscope::scope::open(#mode);
            #block
        }
    };

    TokenStream::from(expanded)
}
