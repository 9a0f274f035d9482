extern crate proc_macro;

mod ast;
mod gen;

use crate::ast::Service;
use crate::gen::ServiceGenerator;
use proc_macro::TokenStream;
use quote::ToTokens;
use syn::parse_macro_input;

#[proc_macro_attribute]
pub fn service(_: TokenStream, input: TokenStream) -> TokenStream {
    let svc = parse_macro_input!(input as Service);

    ServiceGenerator::new(&svc).into_token_stream().into()
}
