use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

use proc_macro::TokenStream;

/// Derives `crate::byteorder::WriteBytesLe`, serializing fields in
/// declaration order with no padding.
#[proc_macro_derive(ToBytes)]
pub fn derive_to_bytes(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;

    let fields: Vec<syn::Member> = match input.data {
        Data::Struct(ref s) => match s.fields {
            Fields::Named(ref nf) => nf
                .named
                .iter()
                .filter_map(|f| f.ident.clone())
                .map(syn::Member::from)
                .collect(),
            Fields::Unnamed(ref uf) => (0..uf.unnamed.len())
                .map(|i| syn::Index::from(i).into())
                .collect(),
            Fields::Unit => Vec::new(),
        },
        _ => {
            return syn::Error::new_spanned(&name, "ToBytes can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let expanded = quote! {
        impl crate::byteorder::WriteBytesLe for #name {
            fn write_le(&self, dst: &mut Vec<u8>) {
                #( crate::byteorder::WriteBytesLe::write_le(&self.#fields, dst); )*
            }
        }
    };

    TokenStream::from(expanded)
}
