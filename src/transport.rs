//! Transport seam.
//!
//! A [`Transport`] accepts calls from the wire and hands them to the server through a
//! [`Dispatcher`]. The crate ships [`HttpTransport`](crate::http_server::HttpTransport) behind
//! the `http_server` feature and the no-op [`InProcess`] transport, for servers that are only
//! called through [`Server::dispatch`](crate::server::Server::dispatch).

use crate::context::Context;
use crate::errors::ServeError;
use crate::interceptor::CallResult;
use crate::server::{ServerConfig, Shared};
use crate::service::Decoder;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

pub trait Transport: Send + Sync + 'static {
    /// Start accepting calls. Resolves once the transport is ready, not when it stops.
    fn start<'a>(
        &'a self,
        dispatcher: Dispatcher,
        config: &'a ServerConfig,
    ) -> BoxFuture<'a, Result<(), ServeError>>;

    /// Stop accepting calls and wait for the in-flight ones, within the configured timeout.
    fn close(&self) -> BoxFuture<'_, ()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn start<'a>(
        &'a self,
        dispatcher: Dispatcher,
        config: &'a ServerConfig,
    ) -> BoxFuture<'a, Result<(), ServeError>> {
        (**self).start(dispatcher, config)
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        (**self).close()
    }
}

/// Handle to the server a transport dispatches into.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Name of the active service.
    pub fn service_name(&self) -> String {
        self.shared.service_name()
    }

    pub fn is_closing(&self) -> bool {
        self.shared.is_closing()
    }

    pub fn dispatch(&self, ctx: Context, decoder: &mut dyn Decoder) -> BoxFuture<'static, CallResult> {
        self.shared.dispatch(ctx, decoder)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("service", &self.service_name())
            .finish()
    }
}

/// Transport that accepts nothing from the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcess;

impl Transport for InProcess {
    fn start<'a>(
        &'a self,
        _dispatcher: Dispatcher,
        _config: &'a ServerConfig,
    ) -> BoxFuture<'a, Result<(), ServeError>> {
        Box::pin(async { Ok(()) })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}
