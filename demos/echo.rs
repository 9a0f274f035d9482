use keel_rpc::interceptor::from_fn;
use keel_rpc::plugin::memory::{Directory, MemoryResolver};
use keel_rpc::plugin::span::SpanTracing;
use keel_rpc::prelude::*;
use std::convert::Infallible;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[keel_rpc::service]
trait Echo {
    async fn say(msg: String) -> Result<String, Infallible>;

    #[name = "shout"]
    async fn say_loud(msg: String) -> Result<String, Infallible>;
}

struct EchoImpl;

impl Echo for EchoImpl {
    async fn say(&self, ctx: Context, msg: String) -> Result<String, Infallible> {
        info!("Echoing for {}", ctx.metadata("user-agent").unwrap_or("unknown"));
        Ok(msg)
    }

    async fn say_loud(&self, _: Context, msg: String) -> Result<String, Infallible> {
        Ok(msg.to_uppercase())
    }
}

#[tokio::main]
async fn main() -> Result<(), ServeError> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "keel_rpc=info,echo=info".into());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let directory = Directory::new();
    let catalog = PluginCatalog::new()
        .with(MemoryResolver::new(directory.clone()))
        .and_then(|c| c.with(SpanTracing))?;

    let timing = from_fn(|ctx, req, next| {
        Box::pin(async move {
            let started = Instant::now();
            let method = ctx.method_name().to_owned();
            let res = next.run(ctx, req).await;
            info!("{method} took {:?}", started.elapsed());
            res
        })
    });

    let server = Server::new(
        ServerOptions::new()
            .address("0.0.0.0:9080")
            .tracing_svr_addr("127.0.0.1:4317")
            .plugin(MemoryResolver::NAME)
            .plugin(SpanTracing::NAME)
            .interceptor(timing),
        &catalog,
    );
    EchoImpl.register(&server)?;

    // curl -X POST localhost:9080/Echo/say -d '"hello"'
    server.serve().await
}
