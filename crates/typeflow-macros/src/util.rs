use heck::{ToKebabCase, ToTitleCase};
use quote::ToTokens;

use super::*;

/// Custom keywords recognized inside `#[func(..)]`, `#[ty(..)]`, `#[elem(..)]`
/// attribute lists.
pub mod kw {
    syn::custom_keyword!(name);
    syn::custom_keyword!(title);
    syn::custom_keyword!(scope);
    syn::custom_keyword!(cast);
    syn::custom_keyword!(contextual);
    syn::custom_keyword!(constructor);
    syn::custom_keyword!(keywords);
    syn::custom_keyword!(parent);
    syn::custom_keyword!(span);
}

/// A bare `type Name;` item, used to refer to a type or element from within a
/// `#[scope]` impl block without redefining it.
pub struct BareType {
    pub attrs: Vec<syn::Attribute>,
    pub ident: Ident,
}

impl Parse for BareType {
    fn parse(input: ParseStream) -> Result<Self> {
        let attrs = input.call(syn::Attribute::parse_outer)?;
        input.parse::<Token![type]>()?;
        let ident = input.parse()?;
        input.parse::<Token![;]>()?;
        Ok(Self { attrs, ident })
    }
}

/// Parse a standalone flag keyword, e.g. `scope` in `#[func(scope)]`.
pub fn parse_flag<T: Parse>(input: ParseStream) -> Result<bool> {
    if input.is_empty() || input.fork().parse::<T>().is_err() {
        return Ok(false);
    }
    input.parse::<T>()?;
    let _ = input.parse::<syn::Token![,]>();
    Ok(true)
}

/// Parse a `keyword = value` pair, e.g. `name = "min"`.
pub fn parse_key_value<T: Parse, V: Parse>(input: ParseStream) -> Result<Option<V>> {
    if input.is_empty() || input.fork().parse::<T>().is_err() {
        return Ok(None);
    }
    input.parse::<T>()?;
    input.parse::<syn::Token![=]>()?;
    let value = input.parse::<V>()?;
    let _ = input.parse::<syn::Token![,]>();
    Ok(Some(value))
}

/// Parse a `keyword = "string"` pair, returning the string's value.
pub fn parse_string<T: Parse>(input: ParseStream) -> Result<Option<String>> {
    Ok(parse_key_value::<T, syn::LitStr>(input)?.map(|lit| lit.value()))
}

/// Parse a `keyword("a", "b", "c")` list of strings.
pub fn parse_string_array<T: Parse>(input: ParseStream) -> Result<Vec<String>> {
    if input.is_empty() || input.fork().parse::<T>().is_err() {
        return Ok(vec![]);
    }
    input.parse::<T>()?;
    let content;
    syn::parenthesized!(content in input);
    let list: Punctuated<syn::LitStr, syn::Token![,]> =
        Punctuated::parse_terminated(&content)?;
    let _ = input.parse::<syn::Token![,]>();
    Ok(list.into_iter().map(|lit| lit.value()).collect())
}

/// Determine the normal and title-case name of an item from its explicit
/// `name`/`title` overrides, falling back to its Rust identifier.
pub fn determine_name_and_title(
    name: Option<String>,
    title: Option<String>,
    ident: &Ident,
    strip_suffix: Option<&str>,
) -> Result<(String, String)> {
    let mut base = ident.to_string();
    if let Some(suffix) = strip_suffix {
        if let Some(stripped) = base.strip_suffix(suffix) {
            base = stripped.to_string();
        }
    }
    let name = name.unwrap_or_else(|| base.to_kebab_case());
    let title = title.unwrap_or_else(|| base.to_title_case());
    Ok((name, title))
}

/// Return an error at the given item.
macro_rules! bail {
    (callsite, $($tts:tt)*) => {
        return Err(syn::Error::new(
            proc_macro2::Span::call_site(),
            format!("typeflow: {}", format!($($tts)*))
        ))
    };
    ($item:expr, $($tts:tt)*) => {
        return Err(syn::Error::new_spanned(
            &$item,
            format!("typeflow: {}", format!($($tts)*))
        ))
    };
}

/// The path to the foundations module from wherever a macro expansion lands.
///
/// All native item macros expand inside the `typeflow-library` crate (either
/// directly in `foundations` or in a sibling module), so a crate-relative
/// path always resolves.
pub fn foundations() -> TokenStream {
    quote! { crate::foundations }
}

/// For parsing attributes of the form:
/// #[attr(
///   statement;
///   statement;
///   returned_expression
/// )]
pub struct BlockWithReturn {
    pub prefix: Vec<syn::Stmt>,
    pub expr: syn::Stmt,
}

impl Parse for BlockWithReturn {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut stmts = syn::Block::parse_within(input)?;
        let Some(expr) = stmts.pop() else {
            return Err(input.error("expected at least one expression"));
        };
        Ok(Self { prefix: stmts, expr })
    }
}

/// Whether an attribute list has a specified attribute.
pub fn has_attr(attrs: &mut Vec<syn::Attribute>, target: &str) -> bool {
    take_attr(attrs, target).is_some()
}

/// Whether an attribute list has a specified attribute.
pub fn parse_attr<T: Parse>(
    attrs: &mut Vec<syn::Attribute>,
    target: &str,
) -> Result<Option<Option<T>>> {
    take_attr(attrs, target)
        .map(|attr| {
            Ok(match attr.meta {
                syn::Meta::Path(_) => None,
                syn::Meta::List(list) => Some(list.parse_args()?),
                syn::Meta::NameValue(meta) => bail!(meta, "not valid here"),
            })
        })
        .transpose()
}

/// Whether an attribute list has a specified attribute.
pub fn take_attr(
    attrs: &mut Vec<syn::Attribute>,
    target: &str,
) -> Option<syn::Attribute> {
    attrs
        .iter()
        .position(|attr| attr.path().is_ident(target))
        .map(|i| attrs.remove(i))
}

/// Ensure that no unrecognized attributes remain.
pub fn validate_attrs(attrs: &[syn::Attribute]) -> Result<()> {
    for attr in attrs {
        if !attr.path().is_ident("doc") && !attr.path().is_ident("derive") {
            let ident = attr.path().get_ident().unwrap();
            bail!(ident, "unrecognized attribute: {ident}");
        }
    }
    Ok(())
}

/// Convert an identifier to a kebab-case string.
pub fn kebab_case(name: &Ident) -> String {
    name.to_string().to_kebab_case()
}

/// Extract documentation comments from an attribute list.
pub fn documentation(attrs: &[syn::Attribute]) -> String {
    let mut doc = String::new();

    // Parse doc comments.
    for attr in attrs {
        if let syn::Meta::NameValue(meta) = &attr.meta {
            if meta.path.is_ident("doc") {
                if let syn::Expr::Lit(lit) = &meta.value {
                    if let syn::Lit::Str(string) = &lit.lit {
                        let full = string.value();
                        let line = full.strip_prefix(' ').unwrap_or(&full);
                        doc.push_str(line);
                        doc.push('\n');
                    }
                }
            }
        }
    }

    doc.trim().into()
}

/// Extract a line of metadata from documentation.
pub fn meta_line<'a>(lines: &mut Vec<&'a str>, key: &str) -> Result<&'a str> {
    match lines.last().and_then(|line| line.strip_prefix(&format!("{key}:"))) {
        Some(value) => {
            lines.pop();
            Ok(value.trim())
        }
        None => bail!(callsite, "missing metadata key: {key}"),
    }
}

/// Creates a block responsible for building a `Scope`.
pub fn create_scope_builder(scope_block: Option<&BlockWithReturn>) -> TokenStream {
    let foundations = foundations();
    if let Some(BlockWithReturn { prefix, expr }) = scope_block {
        quote! { {
            let mut scope = #foundations::Scope::deduplicating();
            #(#prefix);*
            #expr
        } }
    } else {
        quote! { #foundations::Scope::new() }
    }
}

/// Quotes an option literally.
pub fn quote_option<T: ToTokens>(option: &Option<T>) -> TokenStream {
    if let Some(value) = option {
        quote! { Some(#value) }
    } else {
        quote! { None }
    }
}
