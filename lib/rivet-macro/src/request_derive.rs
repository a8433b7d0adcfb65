//! Request derive macro implementation.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{DeriveInput, Fields, parse2};

/// Struct-level options parsed from `#[field(...)]` attributes.
#[derive(Debug, Clone, Default)]
struct RequestStructOptions {
    /// Rename all fields using the given case convention.
    rename_all: Option<RenameRule>,
}

/// Case conversion rules for `rename_all`.
#[derive(Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
enum RenameRule {
    /// `lowercase`
    LowerCase,
    /// `UPPERCASE`
    UpperCase,
    /// `camelCase`
    CamelCase,
    /// `PascalCase`
    PascalCase,
    /// `snake_case`
    SnakeCase,
    /// `SCREAMING_SNAKE_CASE`
    ScreamingSnakeCase,
    /// `kebab-case`
    KebabCase,
    /// `SCREAMING-KEBAB-CASE`
    ScreamingKebabCase,
    /// `Train-Case`, the usual shape of header names
    TrainCase,
}

impl RenameRule {
    /// Parse a rename rule from a string.
    fn parse(s: &str) -> Option<Self> {
        match s {
            "lowercase" => Some(Self::LowerCase),
            "UPPERCASE" => Some(Self::UpperCase),
            "camelCase" => Some(Self::CamelCase),
            "PascalCase" => Some(Self::PascalCase),
            "snake_case" => Some(Self::SnakeCase),
            "SCREAMING_SNAKE_CASE" => Some(Self::ScreamingSnakeCase),
            "kebab-case" => Some(Self::KebabCase),
            "SCREAMING-KEBAB-CASE" => Some(Self::ScreamingKebabCase),
            "Train-Case" => Some(Self::TrainCase),
            _ => None,
        }
    }

    /// Apply the rename rule to a `snake_case` field name.
    fn apply(self, name: &str) -> String {
        match self {
            Self::LowerCase => name.replace('_', "").to_lowercase(),
            Self::UpperCase => name.replace('_', "").to_uppercase(),
            Self::CamelCase => to_camel_case(name),
            Self::PascalCase => to_pascal_case(name),
            Self::SnakeCase => name.to_string(),
            Self::ScreamingSnakeCase => name.to_uppercase(),
            Self::KebabCase => name.replace('_', "-"),
            Self::ScreamingKebabCase => name.to_uppercase().replace('_', "-"),
            Self::TrainCase => name
                .split('_')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join("-"),
        }
    }
}

/// Upper-case the first character.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Convert a `snake_case` string to `camelCase`.
fn to_camel_case(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Convert a `snake_case` string to `PascalCase`.
fn to_pascal_case(s: &str) -> String {
    capitalize(&to_camel_case(s))
}

/// Wire location of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Location {
    Path,
    Header,
    Query,
    #[default]
    Body,
}

impl Location {
    fn variant(self) -> syn::Ident {
        match self {
            Self::Path => format_ident!("Path"),
            Self::Header => format_ident!("Header"),
            Self::Query => format_ident!("Query"),
            Self::Body => format_ident!("Body"),
        }
    }
}

/// Field options parsed from `#[field(...)]` attributes.
#[derive(Debug, Clone, Default)]
struct RequestFieldOptions {
    location: Option<Location>,
    rename: Option<String>,
    skip: bool,
}

/// Expand the `#[derive(Request)]` macro.
pub fn expand_request_derive(input: TokenStream) -> syn::Result<TokenStream> {
    let input: DeriveInput = parse2(input)?;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let struct_options = parse_struct_options(&input.attrs)?;

    let syn::Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input,
            "Request derive only supports structs",
        ));
    };
    let fields = match &data.fields {
        Fields::Named(fields) => fields.named.iter().collect::<Vec<_>>(),
        Fields::Unit => Vec::new(),
        Fields::Unnamed(_) => {
            return Err(syn::Error::new_spanned(
                &input,
                "Request derive only supports structs with named fields",
            ));
        }
    };

    let mut entries = Vec::new();
    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let options = parse_field_options(&field.attrs)?;
        if options.skip {
            continue;
        }

        // explicit rename > rename_all > field name
        let raw_name = field_name.to_string();
        let raw_name = raw_name.trim_start_matches("r#");
        let key = match (&options.rename, struct_options.rename_all) {
            (Some(rename), _) => rename.clone(),
            (None, Some(rule)) => rule.apply(raw_name),
            (None, None) => raw_name.to_string(),
        };
        let location = options.location.unwrap_or_default().variant();

        entries.push(quote! {
            ::rivet::Field::serialize(#key, ::rivet::FieldLocation::#location, &self.#field_name)?
        });
    }

    Ok(quote! {
        impl #impl_generics ::rivet::RequestSchema for #name #ty_generics #where_clause {
            fn fields(&self) -> ::rivet::Result<::std::vec::Vec<::rivet::Field>> {
                ::std::result::Result::Ok(::std::vec![#(#entries),*])
            }
        }
    })
}

/// Parse struct-level options from `#[field(...)]` attributes.
fn parse_struct_options(attrs: &[syn::Attribute]) -> syn::Result<RequestStructOptions> {
    let mut options = RequestStructOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("field") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                let value: syn::LitStr = meta.value()?.parse()?;
                let rule = RenameRule::parse(&value.value()).ok_or_else(|| {
                    syn::Error::new_spanned(
                        &value,
                        format!(
                            "unknown rename_all value: \"{}\". Expected one of: \
                             lowercase, UPPERCASE, camelCase, PascalCase, \
                             snake_case, SCREAMING_SNAKE_CASE, kebab-case, \
                             SCREAMING-KEBAB-CASE, Train-Case",
                            value.value()
                        ),
                    )
                })?;
                options.rename_all = Some(rule);
                Ok(())
            } else {
                Err(meta.error("expected `rename_all`"))
            }
        })?;
    }

    Ok(options)
}

/// Parse field options from `#[field(...)]` attributes.
fn parse_field_options(attrs: &[syn::Attribute]) -> syn::Result<RequestFieldOptions> {
    let mut options = RequestFieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("field") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let location = if meta.path.is_ident("path") {
                Some(Location::Path)
            } else if meta.path.is_ident("header") {
                Some(Location::Header)
            } else if meta.path.is_ident("query") {
                Some(Location::Query)
            } else if meta.path.is_ident("body") {
                Some(Location::Body)
            } else {
                None
            };

            if let Some(location) = location {
                if options.location.is_some_and(|previous| previous != location) {
                    return Err(meta.error("a field has exactly one location"));
                }
                options.location = Some(location);
            } else if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.rename = Some(value.value());
            } else if meta.path.is_ident("skip") {
                options.skip = true;
            } else {
                return Err(meta.error(
                    "expected one of `path`, `header`, `query`, `body`, `rename`, `skip`",
                ));
            }
            Ok(())
        })?;
    }

    Ok(options)
}
