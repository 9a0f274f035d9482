//! Server interceptors.
//!
//! Interceptors wrap every dispatched call. They run in registration order and nest like an
//! onion: the first interceptor sees the request first and the reply last. Each interceptor
//! decides if and when the rest of the chain runs by calling [`Next::run`]; not calling it
//! short-circuits the call.
//!
//! ```rust
//! use keel_rpc::interceptor;
//!
//! let logging = interceptor::from_fn(|ctx, req, next| {
//!     Box::pin(async move {
//!         tracing::info!("calling {}", ctx.method_name());
//!         next.run(ctx, req).await
//!     })
//! });
//! ```

use crate::context::Context;
use crate::errors::CallError;
use crate::serde::Message;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Result of a dispatched call.
pub type CallResult = Result<Box<dyn Message>, CallError>;

/// Innermost step of a chain, invoking the business method.
pub type Terminal = dyn Fn(Context, Box<dyn Message>) -> BoxFuture<'static, CallResult> + Send + Sync;

/// Shared, ordered interceptor list.
pub type InterceptorList = Arc<Vec<Arc<dyn ServerInterceptor>>>;

pub trait ServerInterceptor: Send + Sync + 'static {
    fn intercept<'a>(
        &'a self,
        ctx: Context,
        req: Box<dyn Message>,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult>;
}

/// The remainder of an interceptor chain.
pub struct Next<'a> {
    chain: &'a [Arc<dyn ServerInterceptor>],
    terminal: &'a Terminal,
}

impl<'a> Next<'a> {
    /// Run the rest of the chain with the given, possibly replaced, request.
    pub fn run(self, ctx: Context, req: Box<dyn Message>) -> BoxFuture<'a, CallResult> {
        match self.chain.split_first() {
            Some((head, rest)) => head.intercept(
                ctx,
                req,
                Next {
                    chain: rest,
                    terminal: self.terminal,
                },
            ),
            None => (self.terminal)(ctx, req),
        }
    }

    /// Number of interceptors still ahead of the terminal handler.
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }
}

/// Run `req` through `interceptors` and finally `terminal`.
pub fn intercept<'a>(
    ctx: Context,
    req: Box<dyn Message>,
    interceptors: &'a [Arc<dyn ServerInterceptor>],
    terminal: &'a Terminal,
) -> BoxFuture<'a, CallResult> {
    Next {
        chain: interceptors,
        terminal,
    }
    .run(ctx, req)
}

/// Interceptor built from a closure, see [`from_fn`].
pub struct FnInterceptor<F>(F);

/// Build an interceptor from a closure returning a boxed future.
pub fn from_fn<F>(f: F) -> FnInterceptor<F>
where
    F: for<'a> Fn(Context, Box<dyn Message>, Next<'a>) -> BoxFuture<'a, CallResult>
        + Send
        + Sync
        + 'static,
{
    FnInterceptor(f)
}

impl<F> ServerInterceptor for FnInterceptor<F>
where
    F: for<'a> Fn(Context, Box<dyn Message>, Next<'a>) -> BoxFuture<'a, CallResult>
        + Send
        + Sync
        + 'static,
{
    fn intercept<'a>(
        &'a self,
        ctx: Context,
        req: Box<dyn Message>,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult> {
        (self.0)(ctx, req, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HandlerError;
    use std::sync::Mutex;

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ServerInterceptor for Recorder {
        fn intercept<'a>(
            &'a self,
            ctx: Context,
            req: Box<dyn Message>,
            next: Next<'a>,
        ) -> BoxFuture<'a, CallResult> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!("{} before", self.label));
                let res = next.run(ctx, req).await;
                self.log.lock().unwrap().push(format!("{} after", self.label));
                res
            })
        }
    }

    fn echo_terminal(
        log: Arc<Mutex<Vec<String>>>,
    ) -> impl Fn(Context, Box<dyn Message>) -> BoxFuture<'static, CallResult> + Send + Sync {
        move |_ctx: Context, req: Box<dyn Message>| -> BoxFuture<'static, CallResult> {
            log.lock().unwrap().push("terminal".to_owned());
            Box::pin(async move { Ok(req) })
        }
    }

    #[tokio::test]
    async fn interceptors_nest_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Vec<Arc<dyn ServerInterceptor>> = ["a", "b", "c"]
            .into_iter()
            .map(|label| {
                Arc::new(Recorder {
                    label,
                    log: Arc::clone(&log),
                }) as Arc<dyn ServerInterceptor>
            })
            .collect();
        let terminal = echo_terminal(Arc::clone(&log));

        let reply = intercept(
            Context::new("Echo", "Say"),
            Box::new(String::from("hi")),
            &chain,
            &terminal,
        )
        .await
        .unwrap();

        assert_eq!(reply.downcast_ref::<String>().unwrap(), "hi");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a before", "b before", "c before", "terminal", "c after", "b after", "a after"]
        );
    }

    #[tokio::test]
    async fn interceptor_can_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let deny = from_fn(|_ctx, _req, _next| {
            Box::pin(async { CallResult::Err(CallError::Handler(HandlerError::from("denied"))) })
        });
        let chain: Vec<Arc<dyn ServerInterceptor>> = vec![Arc::new(deny)];
        let terminal = echo_terminal(Arc::clone(&log));

        let err = intercept(
            Context::new("Echo", "Say"),
            Box::new(String::from("hi")),
            &chain,
            &terminal,
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "Handler failed: denied");
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn interceptor_can_replace_request_and_reply() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let shout = from_fn(|ctx, req, next| {
            Box::pin(async move {
                let text = req.downcast::<String>().map(|s| *s).unwrap_or_default();
                let reply = next.run(ctx, Box::new(text.to_uppercase())).await?;
                let text = reply.downcast::<String>().map(|s| *s).unwrap_or_default();
                CallResult::Ok(Box::new(format!("{text}!")))
            })
        });
        let chain: Vec<Arc<dyn ServerInterceptor>> = vec![Arc::new(shout)];
        let terminal = echo_terminal(Arc::clone(&log));

        let reply = intercept(
            Context::new("Echo", "Say"),
            Box::new(String::from("hi")),
            &chain,
            &terminal,
        )
        .await
        .unwrap();

        assert_eq!(reply.downcast_ref::<String>().unwrap(), "HI!");
    }
}
