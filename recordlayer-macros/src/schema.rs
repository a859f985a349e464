use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Error, Expr, ExprLit, Fields, Ident, Lit, LitStr, Meta, Token,
    ext::IdentExt, punctuated::Punctuated,
};

/// A field that takes part in the schema.
struct DeclaredField<'a> {
    ident: &'a Ident,
    name: String,
}

#[derive(Default)]
struct FieldAttrs {
    skip: bool,
    rename: Option<String>,
}

// derive_schema
pub fn derive_schema(input: TokenStream) -> TokenStream {
    match expand(input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(input: TokenStream) -> syn::Result<TokenStream> {
    let input: DeriveInput = syn::parse2(input)?;

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Struct(data) = &input.data else {
        return Err(Error::new_spanned(
            &input.ident,
            "Schema can only be derived for structs with named fields",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(Error::new_spanned(
            &data.fields,
            "Schema can only be derived for structs with named fields",
        ));
    };

    let collection = container_collection(&input.attrs)?;

    let mut fields: Vec<DeclaredField> = Vec::new();
    for field in &named.named {
        let Some(field_ident) = field.ident.as_ref() else {
            continue;
        };

        let attrs = field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }

        let name = attrs
            .rename
            .unwrap_or_else(|| field_ident.unraw().to_string());

        if fields.iter().any(|declared| declared.name == name) {
            return Err(Error::new_spanned(
                field_ident,
                format!("field name `{name}` is declared more than once"),
            ));
        }

        fields.push(DeclaredField {
            ident: field_ident,
            name,
        });
    }

    let type_name = ident.to_string();
    let names = fields.iter().map(|field| &field.name).collect::<Vec<_>>();
    let idents = fields.iter().map(|field| field.ident).collect::<Vec<_>>();
    let collection = match collection {
        Some(name) => quote!(::core::option::Option::Some(#name)),
        None => quote!(::core::option::Option::None),
    };

    Ok(quote! {
        impl #impl_generics ::recordlayer::schema::Schema for #ident #ty_generics #where_clause {
            fn type_name() -> &'static str {
                #type_name
            }

            fn declared_fields() -> &'static [&'static str] {
                &[#(#names),*]
            }

            fn collection_name() -> ::core::option::Option<&'static str> {
                #collection
            }

            fn read_field(
                &self,
                name: &str,
            ) -> ::core::option::Option<::recordlayer::error::DocumentStoreResult<::recordlayer::bson::Bson>> {
                match name {
                    #(#names => ::core::option::Option::Some(::recordlayer::schema::capture(&self.#idents)),)*
                    _ => ::core::option::Option::None,
                }
            }

            fn write_field(
                &mut self,
                name: &str,
                value: ::recordlayer::bson::Bson,
            ) -> ::core::option::Option<::recordlayer::error::DocumentStoreResult<()>> {
                match name {
                    #(#names => ::core::option::Option::Some(::recordlayer::schema::assign(&mut self.#idents, value)),)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    })
}

/// Reads `#[record(collection = "...")]` from the container.
fn container_collection(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut collection = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("record")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let name: LitStr = meta.value()?.parse()?;
                if name.value().trim().is_empty() {
                    return Err(meta.error("collection name must not be empty"));
                }
                collection = Some(name);
                Ok(())
            } else {
                Err(meta.error("unsupported record attribute; expected `collection = \"...\"`"))
            }
        })?;
    }

    Ok(collection)
}

/// Reads `#[record(skip)]`, `#[serde(skip)]` and `#[serde(rename = "...")]` from a field.
fn field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if attr.path().is_ident("record") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    result.skip = true;
                    Ok(())
                } else {
                    Err(meta.error("unsupported record attribute; expected `skip`"))
                }
            })?;
        } else if attr.path().is_ident("serde") {
            // Other serde options are left to serde.
            let Meta::List(list) = &attr.meta else {
                continue;
            };
            let items = list.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?;

            for item in items {
                match item {
                    Meta::Path(path) if path.is_ident("skip") => result.skip = true,
                    Meta::NameValue(pair) if pair.path.is_ident("rename") => {
                        if let Expr::Lit(ExprLit { lit: Lit::Str(name), .. }) = &pair.value {
                            result.rename = Some(name.value());
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(result)
}
