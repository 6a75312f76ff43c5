use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, LitStr};

pub fn derive_row(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields = match named_fields(&input) {
        Ok(fields) => fields,
        Err(err) => return err.to_compile_error().into(),
    };

    // Extract #[row(collection = "...")] from struct-level attributes
    let collection = extract_collection(&input);

    // Extract the field marked with #[row(id)] or default to "id"
    let id_field = match extract_id_field(&input, &fields) {
        Ok(ident) => ident,
        Err(err) => return err.to_compile_error().into(),
    };

    let columns: Vec<String> = fields
        .iter()
        .filter(|field| !has_row_flag(field, "skip"))
        .filter_map(|field| field.ident.as_ref())
        .map(|ident| ident.to_string().trim_start_matches("r#").to_string())
        .collect();

    let expanded = quote! {
        impl carsocial::Row for #name {
            const COLLECTION: &'static str = #collection;
            const COLUMNS: &'static [&'static str] = &[#(#columns),*];

            fn id(&self) -> &str {
                &self.#id_field
            }
        }
    };

    TokenStream::from(expanded)
}

fn named_fields(input: &DeriveInput) -> syn::Result<Vec<Field>> {
    if let Data::Struct(data_struct) = &input.data {
        if let Fields::Named(fields) = &data_struct.fields {
            return Ok(fields.named.iter().cloned().collect());
        }
    }

    Err(syn::Error::new_spanned(
        &input.ident,
        "Row derive: only structs with named fields are supported",
    ))
}

fn extract_collection(input: &DeriveInput) -> String {
    for attr in &input.attrs {
        if !attr.path().is_ident("row") {
            continue;
        }

        let mut collection = None;
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                collection = Some(value.value());
            }
            Ok(())
        });

        if let Some(c) = collection {
            return c;
        }
    }

    // Default: snake_case struct name + "s"
    let name = input.ident.to_string();
    format!("{}s", to_snake_case(&name))
}

fn extract_id_field(input: &DeriveInput, fields: &[Field]) -> syn::Result<syn::Ident> {
    for field in fields {
        if has_row_flag(field, "id") {
            if let Some(ident) = &field.ident {
                return Ok(ident.clone());
            }
        }
    }

    // Default: look for a field named "id"
    for field in fields {
        if let Some(ident) = &field.ident {
            if ident == "id" {
                return Ok(ident.clone());
            }
        }
    }

    Err(syn::Error::new_spanned(
        &input.ident,
        "Row derive: no field marked with #[row(id)] and no field named `id`",
    ))
}

fn has_row_flag(field: &Field, flag: &str) -> bool {
    let mut found = false;
    for attr in &field.attrs {
        if attr.path().is_ident("row") {
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident(flag) {
                    found = true;
                }
                Ok(())
            });
        }
    }
    found
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}
