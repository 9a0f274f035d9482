//! Tracing plugin backed by `tracing` spans.
//!
//! [`SpanTracing`] hands out a [`SpanTracer`] opening one span per call. Any [`Tracer`] can be
//! turned into an interceptor with [`tracing_interceptor`], which is what the server does after
//! initializing a tracing plugin.

use super::{Plugin, PluginOption, PluginOptions, Tracer, TracingPlugin};
use crate::context::Context;
use crate::errors::BoxError;
use crate::interceptor::{CallResult, Next, ServerInterceptor};
use crate::serde::Message;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{field, info_span, Instrument};

/// Tracing plugin named `span`.
#[derive(Debug, Clone, Default)]
pub struct SpanTracing;

impl SpanTracing {
    pub const NAME: &'static str = "span";
}

impl Plugin for SpanTracing {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn as_tracing(&self) -> Option<&dyn TracingPlugin> {
        Some(self)
    }
}

impl TracingPlugin for SpanTracing {
    fn init<'a>(&'a self, opts: &'a [PluginOption]) -> BoxFuture<'a, Result<Arc<dyn Tracer>, BoxError>> {
        Box::pin(async move {
            let opts = PluginOptions::from(opts);
            let tracer: Arc<dyn Tracer> = Arc::new(SpanTracer {
                backend: opts.tracing_svr_addr.unwrap_or_default(),
            });
            Ok(tracer)
        })
    }
}

/// Opens an `info` span per call, tagged with the backend address.
#[derive(Debug, Clone)]
pub struct SpanTracer {
    backend: String,
}

impl SpanTracer {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
        }
    }
}

impl Tracer for SpanTracer {
    fn start_span(&self, operation: &str, ctx: &Context) -> tracing::Span {
        info_span!(
            "keel_rpc_server_span",
            "otel.name" = operation,
            "rpc.service" = ctx.service_name(),
            "rpc.method" = ctx.method_name(),
            "tracing.backend" = self.backend.as_str(),
            "otel.status_code" = field::Empty,
        )
    }
}

/// Interceptor running the rest of the chain inside a span of its [`Tracer`].
pub struct TracingInterceptor {
    tracer: Arc<dyn Tracer>,
    span_name: String,
}

/// Wrap `tracer` into an interceptor naming each span `span_name`.
pub fn tracing_interceptor(tracer: Arc<dyn Tracer>, span_name: impl Into<String>) -> TracingInterceptor {
    TracingInterceptor {
        tracer,
        span_name: span_name.into(),
    }
}

impl ServerInterceptor for TracingInterceptor {
    fn intercept<'a>(
        &'a self,
        ctx: Context,
        req: Box<dyn Message>,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult> {
        let span = self.tracer.start_span(&self.span_name, &ctx);
        let record = span.clone();
        Box::pin(
            async move {
                let res = next.run(ctx, req).await;
                record.record("otel.status_code", if res.is_ok() { "OK" } else { "ERROR" });
                res
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::intercept;
    use std::sync::Mutex;

    struct Recording {
        operations: Mutex<Vec<String>>,
    }

    impl Tracer for Recording {
        fn start_span(&self, operation: &str, _ctx: &Context) -> tracing::Span {
            self.operations.lock().unwrap().push(operation.to_owned());
            tracing::Span::none()
        }
    }

    #[tokio::test]
    async fn interceptor_opens_one_span_per_call() {
        let tracer = Arc::new(Recording {
            operations: Mutex::new(Vec::new()),
        });
        let chain: Vec<Arc<dyn ServerInterceptor>> =
            vec![Arc::new(tracing_interceptor(tracer.clone(), "keel-rpc"))];
        let terminal = |_ctx: Context, req: Box<dyn Message>| -> BoxFuture<'static, CallResult> {
            Box::pin(async move { Ok(req) })
        };

        for _ in 0..2 {
            intercept(
                Context::new("Echo", "Say"),
                Box::new(String::from("hi")),
                &chain,
                &terminal,
            )
            .await
            .unwrap();
        }

        assert_eq!(*tracer.operations.lock().unwrap(), ["keel-rpc", "keel-rpc"]);
    }

    #[tokio::test]
    async fn span_tracing_yields_a_tracer() {
        let opts = [PluginOption::TracingSvrAddr("127.0.0.1:6831".to_owned())];

        let tracer = SpanTracing.init(&opts).await.unwrap();

        let _span = tracer.start_span("keel-rpc", &Context::new("Echo", "Say"));
    }
}
