// Some parts copied from https://github.com/dtolnay/thiserror/blob/39aaeb00ff270a49e3c254d7b38b10e934d3c7a5/impl/src/ast.rs
// License Apache-2.0 or MIT

use syn::parse::{Parse, ParseStream};
use syn::spanned::Spanned;
use syn::token::Comma;
use syn::{
    braced, parenthesized, parse_quote, Attribute, Error, Expr, ExprLit, FnArg, GenericArgument,
    Ident, Lit, Pat, PatType, PathArguments, Result, ReturnType, Token, Type, Visibility,
};

/// Accumulates multiple errors into a result.
/// Only use this for recoverable errors, i.e. non-parse errors. Fatal errors should early exit to
/// avoid further complications.
macro_rules! extend_errors {
    ($errors: ident, $e: expr) => {
        match $errors {
            Ok(_) => $errors = Err($e),
            Err(ref mut errors) => errors.extend($e),
        }
    };
}

/// Names of the functions the macro adds to the trait.
const GENERATED_FNS: [&str; 2] = ["service_desc", "register"];

pub(crate) struct Service {
    pub(crate) attrs: Vec<Attribute>,
    pub(crate) rpc_name: String,
    pub(crate) vis: Visibility,
    pub(crate) ident: Ident,
    pub(crate) handlers: Vec<Handler>,
}

impl Parse for Service {
    fn parse(input: ParseStream) -> Result<Self> {
        let parsed_attrs = input.call(Attribute::parse_outer)?;
        let vis = input.parse()?;
        input.parse::<Token![trait]>()?;
        let ident: Ident = input.parse()?;
        let content;
        braced!(content in input);
        let mut handlers = Vec::<Handler>::new();
        while !content.is_empty() {
            handlers.push(content.parse()?);
        }

        let mut ident_errors = Ok(());
        for handler in &handlers {
            if GENERATED_FNS.iter().any(|f| handler.ident == f) {
                extend_errors!(
                    ident_errors,
                    Error::new(
                        handler.ident.span(),
                        format!(
                            "method name conflicts with generated fn `{ident}::{}`",
                            handler.ident
                        )
                    )
                );
            }
        }
        for (i, handler) in handlers.iter().enumerate() {
            if handlers[..i].iter().any(|h| h.rpc_name == handler.rpc_name) {
                extend_errors!(
                    ident_errors,
                    Error::new(
                        handler.ident.span(),
                        format!("method name `{}` is used more than once", handler.rpc_name)
                    )
                );
            }
        }
        ident_errors?;

        let (rpc_name, attrs) = split_name_attribute(parsed_attrs)?;

        Ok(Self {
            attrs,
            rpc_name: rpc_name.unwrap_or_else(|| ident.to_string()),
            vis,
            ident,
            handlers,
        })
    }
}

pub(crate) struct Handler {
    pub(crate) attrs: Vec<Attribute>,
    pub(crate) rpc_name: String,
    pub(crate) ident: Ident,
    pub(crate) arg: PatType,
    pub(crate) output_ok: Type,
    pub(crate) output_err: Type,
}

impl Parse for Handler {
    fn parse(input: ParseStream) -> Result<Self> {
        let parsed_attrs = input.call(Attribute::parse_outer)?;

        input.parse::<Token![async]>()?;
        input.parse::<Token![fn]>()?;
        let ident: Ident = input.parse()?;

        // Parse arguments
        let content;
        parenthesized!(content in input);
        let mut args = Vec::new();
        let mut errors = Ok(());
        for arg in content.parse_terminated(FnArg::parse, Comma)? {
            match arg {
                FnArg::Typed(captured) if matches!(&*captured.ty, Type::Reference(_)) => {
                    extend_errors!(
                        errors,
                        Error::new(
                            captured.ty.span(),
                            "the request must be an owned type, it is allocated by the server"
                        )
                    );
                }
                FnArg::Typed(captured) if matches!(&*captured.pat, Pat::Ident(_)) => {
                    args.push(captured);
                }
                FnArg::Typed(captured) => {
                    extend_errors!(
                        errors,
                        Error::new(captured.pat.span(), "patterns aren't allowed in RPC args")
                    );
                }
                FnArg::Receiver(_) => {
                    extend_errors!(
                        errors,
                        Error::new(arg.span(), "method args cannot start with self")
                    );
                }
            }
        }
        if args.len() != 1 {
            extend_errors!(
                errors,
                Error::new(
                    ident.span(),
                    "Exactly one input argument, the request, is supported"
                )
            );
        }
        errors?;

        // Parse return type
        let return_type: ReturnType = input.parse()?;
        input.parse::<Token![;]>()?;

        let (output_ok, output_err) = match &return_type {
            ReturnType::Type(_, ty) => extract_result_parameters(ty).ok_or_else(|| {
                Error::new(
                    return_type.span(),
                    "Only Result<T, E> or keel_rpc::prelude::HandlerResult<T> is supported as return type",
                )
            })?,
            ReturnType::Default => {
                return Err(Error::new(
                    ident.span(),
                    "The method must return Result<T, E> or keel_rpc::prelude::HandlerResult<T>",
                ))
            }
        };

        let (rpc_name, attrs) = split_name_attribute(parsed_attrs)?;

        Ok(Self {
            attrs,
            rpc_name: rpc_name.unwrap_or_else(|| ident.to_string()),
            ident,
            arg: args.remove(0),
            output_ok,
            output_err,
        })
    }
}

/// Takes the `#[name = "..."]` override out of `attrs`, the other attributes are kept as is.
fn split_name_attribute(attrs: Vec<Attribute>) -> Result<(Option<String>, Vec<Attribute>)> {
    let mut rpc_name = None;
    let mut kept = Vec::with_capacity(attrs.len());
    for attr in attrs {
        let Ok(meta) = attr.meta.require_name_value() else {
            kept.push(attr);
            continue;
        };
        if !meta.path.is_ident("name") {
            kept.push(attr);
            continue;
        }
        match &meta.value {
            Expr::Lit(ExprLit {
                lit: Lit::Str(literal),
                ..
            }) => rpc_name = Some(literal.value()),
            other => {
                return Err(Error::new(
                    other.span(),
                    "the 'name' attribute takes a string literal",
                ))
            }
        }
    }
    Ok((rpc_name, kept))
}

/// Splits `HandlerResult<T>` or `Result<T, E>` into `(T, E)`.
fn extract_result_parameters(ty: &Type) -> Option<(Type, Type)> {
    let path = match ty {
        Type::Path(ty) => &ty.path,
        _ => return None,
    };

    let last = path.segments.last()?;
    let bracketed = match &last.arguments {
        PathArguments::AngleBracketed(bracketed) => bracketed,
        _ => return None,
    };
    let mut types = bracketed.args.iter().map(|arg| match arg {
        GenericArgument::Type(arg) => Some(arg.clone()),
        _ => None,
    });

    match (last.ident.to_string().as_str(), bracketed.args.len()) {
        ("HandlerResult", 1) => Some((
            types.next()??,
            parse_quote!(::keel_rpc::errors::HandlerError),
        )),
        ("Result", 2) => Some((types.next()??, types.next()??)),
        _ => None,
    }
}
