use crate::ast::{Handler, Service};
use proc_macro2::TokenStream as TokenStream2;
use proc_macro2::{Ident, Literal};
use quote::{quote, ToTokens};
use syn::{Attribute, PatType, Visibility};

pub(crate) struct ServiceGenerator<'a> {
    pub(crate) rpc_name: &'a str,
    pub(crate) service_ident: &'a Ident,
    pub(crate) vis: &'a Visibility,
    pub(crate) attrs: &'a [Attribute],
    pub(crate) handlers: &'a [Handler],
}

impl<'a> ServiceGenerator<'a> {
    pub(crate) fn new(s: &'a Service) -> Self {
        ServiceGenerator {
            rpc_name: &s.rpc_name,
            service_ident: &s.ident,
            vis: &s.vis,
            attrs: &s.attrs,
            handlers: &s.handlers,
        }
    }

    fn trait_service(&self) -> TokenStream2 {
        let Self {
            attrs,
            handlers,
            vis,
            service_ident,
            ..
        } = self;

        let handler_fns = handlers.iter().map(
            |Handler {
                 attrs,
                 ident,
                 arg,
                 output_ok,
                 output_err,
                 ..
             }| {
                quote! {
                    #( #attrs )*
                    fn #ident(&self, context: ::keel_rpc::context::Context, #arg) -> impl ::core::future::Future<Output=::core::result::Result<#output_ok, #output_err>> + ::core::marker::Send;
                }
            },
        );

        let service_desc = self.fn_service_desc();

        quote! {
            #( #attrs )*
            #vis trait #service_ident: ::core::marker::Sized + ::core::marker::Send + ::core::marker::Sync + 'static {
                #( #handler_fns )*

                #service_desc

                /// Registers `self` as the service of `server`, replacing the previous one.
                fn register(self, server: &::keel_rpc::server::Server) -> ::core::result::Result<(), ::keel_rpc::errors::RegistrationError> {
                    server.register(Self::service_desc(), ::std::sync::Arc::new(self))
                }
            }
        }
    }

    fn fn_service_desc(&self) -> TokenStream2 {
        let Self {
            rpc_name,
            handlers,
            ..
        } = self;

        let service_literal = Literal::string(rpc_name);

        let methods = handlers.iter().map(|handler| {
            let handler_ident = &handler.ident;
            let handler_literal = Literal::string(&handler.rpc_name);
            let PatType { ty, .. } = &handler.arg;

            quote! {
                .method(::keel_rpc::service::MethodDesc::unary(
                    #handler_literal,
                    |svc: ::std::sync::Arc<Self>, ctx: ::keel_rpc::context::Context, req: #ty| async move {
                        Self::#handler_ident(&svc, ctx, req).await
                    },
                ))
            }
        });

        quote! {
            /// Returns the descriptor to register with [`::keel_rpc::server::Server::register`].
            fn service_desc() -> ::keel_rpc::service::ServiceDesc {
                ::keel_rpc::service::ServiceDesc::new(
                    #service_literal,
                    ::keel_rpc::service::HandlerType::of::<Self>(),
                )
                #( #methods )*
            }
        }
    }
}

impl<'a> ToTokens for ServiceGenerator<'a> {
    fn to_tokens(&self, output: &mut TokenStream2) {
        output.extend(self.trait_service());
    }
}
