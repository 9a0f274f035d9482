//! # Server
//!
//! A [`Server`] owns one active [`Service`], the interceptor chain, the selected plugins and a
//! [`Transport`]. Its lifecycle is:
//!
//! 1. [`Server::new`] creates the server with an empty service and selects the configured
//!    plugins from a [`PluginCatalog`].
//! 2. [`Server::register_service`] or [`Server::register`] installs the service. Registering
//!    again replaces the whole method table.
//! 3. [`Server::init_plugins`] initializes the plugins in catalog order. Resolver plugins
//!    announce the service, tracing plugins append a tracing interceptor.
//! 4. [`Server::serve`] starts the transport and waits for a termination signal.
//! 5. [`Server::close`] withdraws from discovery and stops the transport.
//!
//! ```rust,no_run
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
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ServeError> {
//!     let server = Server::new(
//!         ServerOptions::new().address("0.0.0.0:8000"),
//!         &PluginCatalog::new(),
//!     );
//!     server.register_service("Echo", Echo)?;
//!     server.serve().await
//! }
//! ```

mod options;
mod signal;
mod state;

pub use options::{ServerConfig, ServerOptions};
pub use state::ServerState;

use crate::context::Context;
use crate::errors::{CallError, Capability, PluginError, RegistrationError, ServeError};
use crate::interceptor::{CallResult, InterceptorList, ServerInterceptor};
use crate::plugin::span::tracing_interceptor;
use crate::plugin::{Plugin, PluginCatalog, PluginOption};
use crate::service::{self, Decoder, EmptyService, Service, ServiceDesc, ServiceInstance, ServiceObject};
use crate::transport::{Dispatcher, Transport};
use arc_swap::ArcSwap;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use state::AtomicState;
use std::any::{type_name, Any};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Name the sentinel service is registered under by [`Server::serve_http`].
pub const HTTP_SERVICE_NAME: &str = "/http";

/// RPC server. Cheap to clone, clones share the same server.
#[derive(Clone)]
pub struct Server {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    config: ServerConfig,
    service: ArcSwap<Service>,
    interceptors: ArcSwap<Vec<Arc<dyn ServerInterceptor>>>,
    plugins: Vec<Arc<dyn Plugin>>,
    plugin_init: tokio::sync::Mutex<PluginInit>,
    serving: AtomicBool,
    transport: Arc<dyn Transport>,
    state: AtomicState,
    closed: CancellationToken,
}

#[derive(Default)]
struct PluginInit {
    stage: InitStage,
    /// Initialized resolvers with the options they registered with.
    resolvers: Vec<(Arc<dyn Plugin>, [PluginOption; 3])>,
}

#[derive(Default)]
enum InitStage {
    #[default]
    Pending,
    Done,
    Failed(String),
}

impl Server {
    pub fn new(opts: ServerOptions, catalog: &PluginCatalog) -> Self {
        let ServerOptions {
            config,
            interceptors,
            transport,
            ..
        } = opts;
        let plugins = catalog.select(config.plugin_names.as_slice());
        let transport = transport.unwrap_or_else(default_transport);

        Self {
            shared: Arc::new(Shared {
                service: ArcSwap::from_pointee(Service::empty("")),
                interceptors: ArcSwap::from_pointee(interceptors),
                plugins,
                plugin_init: tokio::sync::Mutex::new(PluginInit::default()),
                serving: AtomicBool::new(false),
                transport,
                state: AtomicState::new(),
                closed: CancellationToken::new(),
                config,
            }),
        }
    }

    /// Register a [`ServiceObject`] under `name`, validating each of its methods.
    ///
    /// Nothing is installed if any method is malformed.
    pub fn register_service<S: ServiceObject>(&self, name: &str, svc: S) -> Result<(), RegistrationError> {
        self.ensure_open()?;
        let desc = service::introspect::<S>(name)?;
        self.install(desc, Arc::new(svc))
    }

    /// Register a prebuilt descriptor, e.g. one generated by [`#[service]`](macro@crate::service).
    ///
    /// `svc` must be of the type the descriptor was built for.
    pub fn register<T: Any + Send + Sync>(&self, desc: ServiceDesc, svc: Arc<T>) -> Result<(), RegistrationError> {
        self.ensure_open()?;
        if !desc.handler_type.accepts(&*svc) {
            return Err(RegistrationError::CapabilityMismatch {
                expected: desc.handler_type.name(),
                found: type_name::<T>(),
            });
        }
        self.install(desc, svc)
    }

    fn ensure_open(&self) -> Result<(), RegistrationError> {
        match self.shared.state.get() {
            s if s.is_closing() => Err(RegistrationError::Closing(s)),
            _ => Ok(()),
        }
    }

    fn install(&self, desc: ServiceDesc, instance: ServiceInstance) -> Result<(), RegistrationError> {
        let service = Service::from_desc(desc, instance)?;
        self.shared
            .state
            .advance(ServerState::Registered)
            .map_err(RegistrationError::Closing)?;
        info!("Registered service '{}'", service.name());
        self.shared.service.store(Arc::new(service));
        Ok(())
    }

    /// Initialize the selected plugins, in catalog order.
    ///
    /// Stops at the first failing plugin, the ones after it are not initialized. Only the first
    /// call does any work, concurrent callers wait for it to finish. Fails with
    /// [`PluginError::Closing`] once the server is closing.
    pub async fn init_plugins(&self) -> Result<(), PluginError> {
        let mut init = self.shared.plugin_init.lock().await;
        let state = self.shared.state.get();
        if state.is_closing() {
            return Err(PluginError::Closing(state));
        }
        match &init.stage {
            InitStage::Pending => {}
            InitStage::Done => return Ok(()),
            InitStage::Failed(plugin) => return Err(PluginError::PreviouslyFailed(plugin.clone())),
        }

        let result = self.run_plugin_inits(&mut init).await;
        match &result {
            Ok(()) => init.stage = InitStage::Done,
            Err(PluginError::Init { plugin, .. }) => init.stage = InitStage::Failed(plugin.clone()),
            Err(_) => {}
        }
        result
    }

    async fn run_plugin_inits(&self, init: &mut PluginInit) -> Result<(), PluginError> {
        let config = &self.shared.config;
        for plugin in &self.shared.plugins {
            let state = self.shared.state.get();
            if state.is_closing() {
                debug!("Server closing, skipping init of plugin '{}'", plugin.name());
                return Err(PluginError::Closing(state));
            }

            if let Some(resolver) = plugin.as_resolver() {
                let opts = self.shared.resolver_options();
                if let Err(source) = resolver.init(&opts).await {
                    error!("resolver init error, plugin '{}': {source}", plugin.name());
                    return Err(PluginError::Init {
                        plugin: plugin.name().to_owned(),
                        capability: Capability::Resolver,
                        source,
                    });
                }
                init.resolvers.push((Arc::clone(plugin), opts));
            }

            if let Some(tracing_plugin) = plugin.as_tracing() {
                let opts = [PluginOption::TracingSvrAddr(config.tracing_svr_addr.clone())];
                let tracer = match tracing_plugin.init(&opts).await {
                    Ok(tracer) => tracer,
                    Err(source) => {
                        error!("tracing init error, plugin '{}': {source}", plugin.name());
                        return Err(PluginError::Init {
                            plugin: plugin.name().to_owned(),
                            capability: Capability::Tracing,
                            source,
                        });
                    }
                };
                let interceptor: Arc<dyn ServerInterceptor> =
                    Arc::new(tracing_interceptor(tracer, config.tracing_span_name.as_str()));
                self.shared.interceptors.rcu(|current| {
                    let mut chain = Vec::clone(current);
                    chain.push(Arc::clone(&interceptor));
                    chain
                });
            }
        }

        if let Err(state) = self.shared.state.advance(ServerState::PluginsInitialized) {
            debug!("Server closed while initializing plugins");
            return Err(PluginError::Closing(state));
        }
        Ok(())
    }

    /// Serve until a termination signal is received, then close.
    ///
    /// Listens for `SIGINT`, `SIGTERM`, `SIGQUIT` and, where possible, `SIGSEGV`.
    pub async fn serve(&self) -> Result<(), ServeError> {
        self.serve_with_shutdown(signal::termination()).await
    }

    /// Register the method-less sentinel service under [`HTTP_SERVICE_NAME`], then [`serve`](Server::serve).
    pub async fn serve_http(&self) -> Result<(), ServeError> {
        self.register_service(HTTP_SERVICE_NAME, EmptyService)?;
        self.serve().await
    }

    /// Serve until `shutdown` completes, then close.
    ///
    /// Also returns once [`Server::close`] is called from elsewhere.
    pub async fn serve_with_shutdown(&self, shutdown: impl Future) -> Result<(), ServeError> {
        if self.shared.serving.swap(true, Ordering::AcqRel) {
            return Err(ServeError::InvalidState(self.shared.state.get()));
        }
        let state = self.shared.state.get();
        if state.is_closing() {
            return Err(ServeError::InvalidState(state));
        }

        if let Err(e) = self.init_plugins().await {
            self.close().await;
            return Err(e.into());
        }

        if let Err(e) = self
            .shared
            .transport
            .start(self.dispatcher(), &self.shared.config)
            .await
        {
            self.close().await;
            return Err(e);
        }

        if let Err(state) = self.shared.state.advance(ServerState::Serving) {
            // Closed while starting.
            self.close().await;
            return Err(ServeError::InvalidState(state));
        }

        tokio::select! {
            _ = shutdown => info!("Shutting down"),
            // Closed by another task.
            _ = self.shared.closed.cancelled() => return Ok(()),
        }
        self.close().await;
        Ok(())
    }

    /// Stop accepting calls, withdraw from service discovery and stop the transport.
    ///
    /// Only the first call does any work.
    pub async fn close(&self) {
        if !self.shared.state.begin_close() {
            return;
        }

        // Waits for an in-flight plugin init, so every resolver it registered is withdrawn.
        let resolvers = std::mem::take(&mut self.shared.plugin_init.lock().await.resolvers);
        for (plugin, opts) in resolvers {
            if let Some(resolver) = plugin.as_resolver() {
                if let Err(e) = resolver.deregister(&opts).await {
                    warn!("Cannot deregister from plugin '{}': {e}", plugin.name());
                }
            }
        }

        self.shared.transport.close().await;
        self.shared.state.set(ServerState::Closed);
        self.shared.closed.cancel();
        info!("Server closed");
    }

    /// Dispatch a call to the active service.
    ///
    /// The request is decoded before this returns, the returned future only runs the call.
    pub fn dispatch(&self, ctx: Context, decoder: &mut dyn Decoder) -> BoxFuture<'static, CallResult> {
        self.shared.dispatch(ctx, decoder)
    }

    /// Handle transports use to dispatch calls into this server.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.shared))
    }

    pub fn state(&self) -> ServerState {
        self.shared.state.get()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.shared.config
    }

    pub fn service_name(&self) -> String {
        self.shared.service_name()
    }

    /// Methods of the active service, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let service = self.shared.service.load();
        let mut names: Vec<_> = service.method_names().map(str::to_owned).collect();
        names.sort_unstable();
        names
    }

    /// Names of the selected plugins, in initialization order.
    pub fn plugin_names(&self) -> Vec<&str> {
        self.shared.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn interceptor_count(&self) -> usize {
        self.shared.interceptors.load().len()
    }
}

impl Shared {
    pub(crate) fn service_name(&self) -> String {
        self.service.load().name().to_owned()
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.state.get().is_closing()
    }

    pub(crate) fn dispatch(&self, ctx: Context, decoder: &mut dyn Decoder) -> BoxFuture<'static, CallResult> {
        if self.is_closing() {
            return future::ready(CallResult::Err(CallError::Closing)).boxed();
        }

        let span = info_span!(
            "keel_rpc_dispatch",
            "rpc.system" = "keel",
            "rpc.service" = ctx.service_name(),
            "rpc.method" = ctx.method_name()
        );
        let service = self.service.load_full();
        let interceptors: InterceptorList = self.interceptors.load_full();

        let call = span.in_scope(|| service.call(ctx, decoder, interceptors));
        call.instrument(span).boxed()
    }

    fn resolver_options(&self) -> [PluginOption; 3] {
        [
            PluginOption::SelectorSvrAddr(self.config.selector_svr_addr.clone()),
            PluginOption::SvrAddr(self.config.address.clone()),
            PluginOption::Services(vec![self.service_name()]),
        ]
    }
}

#[cfg(feature = "http_server")]
fn default_transport() -> Arc<dyn Transport> {
    Arc::new(crate::http_server::HttpTransport::new())
}

#[cfg(not(feature = "http_server"))]
fn default_transport() -> Arc<dyn Transport> {
    Arc::new(crate::transport::InProcess)
}
