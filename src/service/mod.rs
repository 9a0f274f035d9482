//! Service registration.
//!
//! A service object becomes callable in one of two ways:
//!
//! * **Dynamic**: implement [`ServiceObject`] and enumerate the methods in
//!   [`ServiceObject::methods`]. Typed methods added with [`MethodSet::method`] are always well
//!   formed, methods added with [`MethodSet::dynamic`] declare a [`MethodSignature`] which is
//!   validated when the service is registered.
//! * **Generated**: build a [`ServiceDesc`], usually with the [`#[service]`](macro@crate::service)
//!   attribute, and hand it to [`Server::register`](crate::server::Server::register).
//!
//! ```rust
//! use keel_rpc::prelude::*;
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! impl Echo {
//!     async fn say(self: Arc<Self>, _ctx: Context, msg: String) -> HandlerResult<String> {
//!         Ok(msg)
//!     }
//! }
//!
//! impl ServiceObject for Echo {
//!     fn methods(set: &mut MethodSet<Self>) {
//!         set.method("Say", Echo::say);
//!     }
//! }
//! ```

mod decode;
mod desc;
mod shape;

pub use decode::{decode_with, Decoder, PayloadDecoder};
pub use desc::{CallHandler, HandlerType, MethodDesc, ServiceDesc, ServiceInstance};
pub use shape::{check_method, MethodSignature, ShapeViolation, TypeDesc, TypeShape};

use crate::context::Context;
use crate::errors::{CallError, HandlerError, HandlerResult, RegistrationError};
use crate::interceptor::{CallResult, InterceptorList};
use crate::serde::Message;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// A plain object exposing its methods for dynamic registration.
pub trait ServiceObject: Send + Sync + Sized + 'static {
    fn methods(set: &mut MethodSet<Self>);
}

/// Method candidates collected from a [`ServiceObject`].
pub struct MethodSet<S> {
    candidates: Vec<MethodCandidate>,
    _service: PhantomData<fn() -> S>,
}

struct MethodCandidate {
    signature: MethodSignature,
    desc: MethodDesc,
}

impl<S: ServiceObject> MethodSet<S> {
    fn new() -> Self {
        Self {
            candidates: Vec::new(),
            _service: PhantomData,
        }
    }

    /// Add a typed method.
    pub fn method<Req, Resp, E, F, Fut>(&mut self, name: &str, f: F) -> &mut Self
    where
        Req: Message + Default,
        Resp: Message,
        E: Into<HandlerError> + 'static,
        F: Fn(Arc<S>, Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
    {
        self.candidates.push(MethodCandidate {
            signature: MethodSignature::unary::<Req, Resp>(name),
            desc: MethodDesc::unary::<S, Req, Resp, E, F, Fut>(name, f),
        });
        self
    }

    /// Add a method with a declared signature.
    ///
    /// `new_request` allocates the request the transport decodes into, `invoke` receives it.
    /// The signature is checked when the service is registered.
    pub fn dynamic<N, I>(&mut self, signature: MethodSignature, new_request: N, invoke: I) -> &mut Self
    where
        N: Fn() -> Box<dyn Message> + Send + Sync + 'static,
        I: Fn(Arc<S>, Context, Box<dyn Message>) -> BoxFuture<'static, HandlerResult<Box<dyn Message>>>
            + Send
            + Sync
            + 'static,
    {
        let name = signature.name().to_owned();
        let handler = desc::erased_handler::<S, _, _>(name.clone(), new_request, move |svc, ctx, req| {
            invoke(svc, ctx, req).map(|res| res.map_err(CallError::Handler)).boxed()
        });
        self.candidates.push(MethodCandidate {
            signature,
            desc: MethodDesc::new(name, handler),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Enumerate and validate the methods of `S` into a [`ServiceDesc`].
///
/// Fails on the first malformed method, naming it and the broken rule.
pub fn introspect<S: ServiceObject>(service_name: &str) -> Result<ServiceDesc, RegistrationError> {
    let mut set = MethodSet::<S>::new();
    S::methods(&mut set);

    let mut desc = ServiceDesc::new(service_name, HandlerType::of::<S>());
    for candidate in set.candidates {
        check_method(&candidate.signature).map_err(|violation| RegistrationError::Shape {
            method: candidate.signature.name().to_owned(),
            violation,
        })?;
        desc = desc.method(candidate.desc);
    }
    Ok(desc)
}

/// The active service: a name, the instance and its method table.
pub struct Service {
    name: String,
    instance: ServiceInstance,
    handlers: HashMap<String, CallHandler>,
}

impl Service {
    pub(crate) fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: Arc::new(()),
            handlers: HashMap::new(),
        }
    }

    pub(crate) fn from_desc(desc: ServiceDesc, instance: ServiceInstance) -> Result<Self, RegistrationError> {
        let mut handlers = HashMap::with_capacity(desc.methods.len());
        for method in desc.methods {
            if handlers.contains_key(method.name()) {
                return Err(RegistrationError::DuplicateMethod(method.name().to_owned()));
            }
            handlers.insert(method.name().to_owned(), Arc::clone(method.handler()));
        }

        Ok(Self {
            name: desc.service_name,
            instance,
            handlers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Method names in no particular order.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Route a call to the method named by `ctx`.
    pub fn call(
        &self,
        ctx: Context,
        decoder: &mut dyn Decoder,
        interceptors: InterceptorList,
    ) -> BoxFuture<'static, CallResult> {
        match self.handlers.get(ctx.method_name()) {
            Some(handler) => handler(ctx, Arc::clone(&self.instance), decoder, interceptors),
            None => future::ready(CallResult::Err(CallError::NotFound {
                service: self.name.clone(),
                method: ctx.method_name().to_owned(),
            }))
            .boxed(),
        }
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.method_names().collect();
        methods.sort_unstable();
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("methods", &methods)
            .finish_non_exhaustive()
    }
}

/// Method-less service registered by [`Server::serve_http`](crate::server::Server::serve_http).
pub(crate) struct EmptyService;

impl ServiceObject for EmptyService {
    fn methods(_: &mut MethodSet<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Calc;

    impl Calc {
        async fn double(self: Arc<Self>, _ctx: Context, n: u64) -> HandlerResult<u64> {
            Ok(n * 2)
        }
    }

    impl ServiceObject for Calc {
        fn methods(set: &mut MethodSet<Self>) {
            set.method("Double", Calc::double);
        }
    }

    struct Duplicated;

    impl ServiceObject for Duplicated {
        fn methods(set: &mut MethodSet<Self>) {
            set.method("Same", |_: Arc<Self>, _: Context, n: u64| async move { HandlerResult::Ok(n) })
                .method("Same", |_: Arc<Self>, _: Context, n: u64| async move { HandlerResult::Ok(n) });
        }
    }

    #[tokio::test]
    async fn introspected_services_dispatch_by_method_name() {
        let desc = introspect::<Calc>("Calc").unwrap();
        let service = Service::from_desc(desc, Arc::new(Calc)).unwrap();

        let reply = service
            .call(
                Context::new("Calc", "Double"),
                &mut PayloadDecoder::new("21"),
                InterceptorList::default(),
            )
            .await
            .unwrap();

        assert_eq!(reply.downcast_ref::<u64>(), Some(&42));
    }

    #[tokio::test]
    async fn unknown_methods_are_not_found() {
        let service = Service::empty("Calc");

        let err = service
            .call(
                Context::new("Calc", "Triple"),
                &mut PayloadDecoder::default(),
                InterceptorList::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Received a call for unknown method 'Calc/Triple'"
        );
    }

    #[test]
    fn duplicate_method_names_are_rejected() {
        let desc = introspect::<Duplicated>("Duplicated").unwrap();

        let err = Service::from_desc(desc, Arc::new(Duplicated)).unwrap_err();

        assert!(matches!(err, RegistrationError::DuplicateMethod(name) if name == "Same"));
    }

    #[test]
    fn empty_service_has_no_methods() {
        let desc = introspect::<EmptyService>("/http").unwrap();

        assert!(desc.methods().is_empty());
        assert_eq!(desc.handler_type().name(), std::any::type_name::<EmptyService>());
    }
}
