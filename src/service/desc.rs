//! Method and service descriptors.
//!
//! A [`ServiceDesc`] is what both registration paths hand to the server: the dynamic path
//! builds one out of a [`ServiceObject`](super::ServiceObject), generated code builds one
//! through [`MethodDesc::unary`].

use super::decode::Decoder;
use crate::context::Context;
use crate::errors::{CallError, HandlerError};
use crate::interceptor::{self, CallResult, InterceptorList};
use crate::serde::Message;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::any::{type_name, Any};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Type erased service instance a handler downcasts to its concrete type.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Entry point of a single method.
///
/// The handler decodes the request before returning, the returned future owns everything it
/// needs and can be polled after the decoder is gone.
pub type CallHandler = Arc<
    dyn Fn(Context, ServiceInstance, &mut dyn Decoder, InterceptorList) -> BoxFuture<'static, CallResult>
        + Send
        + Sync,
>;

/// The type a service instance must be to serve a [`ServiceDesc`].
#[derive(Clone, Copy)]
pub struct HandlerType {
    name: &'static str,
    accepts: fn(&(dyn Any + Send + Sync)) -> bool,
}

impl HandlerType {
    /// Accept only instances of `T`.
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self {
            name: type_name::<T>(),
            accepts: |instance| instance.is::<T>(),
        }
    }

    /// Accept any instance.
    pub fn any() -> Self {
        Self {
            name: "any",
            accepts: |_| true,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn accepts(&self, instance: &(dyn Any + Send + Sync)) -> bool {
        (self.accepts)(instance)
    }
}

impl fmt::Debug for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerType").field(&self.name).finish()
    }
}

/// A named method and the handler serving it.
#[derive(Clone)]
pub struct MethodDesc {
    name: String,
    handler: CallHandler,
}

impl MethodDesc {
    pub fn new(name: impl Into<String>, handler: CallHandler) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }

    /// Describe a unary method of `S` taking `Req` and replying with `Resp`.
    ///
    /// The request is allocated with `Req::default()` and decoded in place before `f` runs.
    pub fn unary<S, Req, Resp, E, F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        S: Send + Sync + 'static,
        Req: Message + Default,
        Resp: Message,
        E: Into<HandlerError> + 'static,
        F: Fn(Arc<S>, Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
    {
        let name = name.into();
        let method = name.clone();
        let handler = erased_handler::<S, _, _>(
            name.clone(),
            || Box::new(Req::default()) as Box<dyn Message>,
            move |svc, ctx, req| {
                let found = req.type_name();
                match req.downcast::<Req>() {
                    Some(req) => {
                        let fut = f(svc, ctx, *req);
                        async move {
                            match fut.await {
                                Ok(reply) => CallResult::Ok(Box::new(reply)),
                                Err(e) => CallResult::Err(CallError::Handler(e.into())),
                            }
                        }
                        .boxed()
                    }
                    None => future::ready(CallResult::Err(CallError::RequestMismatch {
                        method: method.clone(),
                        expected: type_name::<Req>(),
                        found,
                    }))
                    .boxed(),
                }
            },
        );
        Self { name, handler }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> &CallHandler {
        &self.handler
    }
}

impl fmt::Debug for MethodDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDesc")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Describes a service: its name, the instance type it serves and its methods.
#[derive(Debug, Clone)]
pub struct ServiceDesc {
    pub(crate) service_name: String,
    pub(crate) handler_type: HandlerType,
    pub(crate) methods: Vec<MethodDesc>,
}

impl ServiceDesc {
    pub fn new(service_name: impl Into<String>, handler_type: HandlerType) -> Self {
        Self {
            service_name: service_name.into(),
            handler_type,
            methods: Vec::new(),
        }
    }

    pub fn method(mut self, method: MethodDesc) -> Self {
        self.methods.push(method);
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn handler_type(&self) -> HandlerType {
        self.handler_type
    }

    pub fn methods(&self) -> &[MethodDesc] {
        &self.methods
    }
}

/// Wrap `invoke` into a [`CallHandler`].
///
/// The handler allocates a request through `new_request`, decodes into it, then invokes the
/// method either directly or at the end of the interceptor chain.
pub(crate) fn erased_handler<S, N, I>(method: String, new_request: N, invoke: I) -> CallHandler
where
    S: Send + Sync + 'static,
    N: Fn() -> Box<dyn Message> + Send + Sync + 'static,
    I: Fn(Arc<S>, Context, Box<dyn Message>) -> BoxFuture<'static, CallResult>
        + Send
        + Sync
        + 'static,
{
    let invoke = Arc::new(invoke);
    Arc::new(
        move |ctx: Context,
              instance: ServiceInstance,
              decoder: &mut dyn Decoder,
              interceptors: InterceptorList|
              -> BoxFuture<'static, CallResult> {
            let Ok(svc) = instance.downcast::<S>() else {
                return future::ready(CallResult::Err(CallError::InstanceMismatch(
                    type_name::<S>(),
                )))
                .boxed();
            };

            let mut req = new_request();
            if let Err(source) = decoder.decode(req.as_mut()) {
                return future::ready(CallResult::Err(CallError::Decode {
                    method: method.clone(),
                    source,
                }))
                .boxed();
            }

            if interceptors.is_empty() {
                return invoke(svc, ctx, req);
            }

            let invoke = Arc::clone(&invoke);
            async move {
                let terminal = move |ctx: Context,
                                     req: Box<dyn Message>|
                      -> BoxFuture<'static, CallResult> {
                    invoke(Arc::clone(&svc), ctx, req)
                };
                interceptor::intercept(ctx, req, &interceptors, &terminal).await
            }
            .boxed()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::decode::PayloadDecoder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        calls: AtomicUsize,
    }

    fn add_desc() -> MethodDesc {
        MethodDesc::unary("Add", |svc: Arc<Counter>, _ctx: Context, req: u64| async move {
            let before = svc.calls.fetch_add(1, Ordering::SeqCst) as u64;
            Ok::<_, HandlerError>(before + req)
        })
    }

    fn counter() -> ServiceInstance {
        Arc::new(Counter {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn unary_handler_decodes_and_invokes() {
        let desc = add_desc();
        let mut decoder = PayloadDecoder::new("41");

        let reply = (desc.handler())(
            Context::new("Counter", "Add"),
            counter(),
            &mut decoder,
            InterceptorList::default(),
        )
        .await
        .unwrap();

        assert_eq!(reply.downcast_ref::<u64>(), Some(&41));
    }

    #[tokio::test]
    async fn decode_failures_name_the_method() {
        let desc = add_desc();
        let mut decoder = PayloadDecoder::new("not a number");

        let err = (desc.handler())(
            Context::new("Counter", "Add"),
            counter(),
            &mut decoder,
            InterceptorList::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CallError::Decode { ref method, .. } if method == "Add"));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn wrong_instances_are_rejected() {
        let desc = add_desc();
        let mut decoder = PayloadDecoder::new("1");

        let err = (desc.handler())(
            Context::new("Counter", "Add"),
            Arc::new(()),
            &mut decoder,
            InterceptorList::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CallError::InstanceMismatch(_)));
    }

    #[test]
    fn handler_types_check_the_instance() {
        let ty = HandlerType::of::<Counter>();

        assert!(ty.accepts(counter().as_ref()));
        assert!(!ty.accepts(&()));
        assert!(HandlerType::any().accepts(&()));
    }
}
