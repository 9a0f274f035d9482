//! # keel-rpc
//!
//! A lightweight RPC server runtime. A process exposes business logic as remotely callable
//! methods, every call runs through an ordered interceptor chain, and plugins hook service
//! discovery and tracing into the server lifecycle.
//!
//! # Features
//!
//! - [Service registration][crate::service]: turn a plain object or a generated descriptor into
//!   a table of callable methods.
//! - [Interceptors][crate::interceptor]: wrap every call, in registration order.
//! - [Plugins][crate::plugin]: register with service discovery and open tracing spans on startup.
//! - [Server lifecycle][crate::server]: plugin initialization, serving, signal handling and
//!   graceful close.
//! - [Error Handling][crate::errors]: handlers return any error, the runtime maps call errors to
//!   transport status codes.
//! - [Serialization][crate::serde]: requests and replies pick their own wire format.
//! - [Serving][crate::http_server]: an HTTP transport exposing the service as
//!   `POST /{service}/{method}`.
//!
//! # Overview
//!
//! Services are defined as traits with the [`#[service]`](macro@crate::service) macro:
//!
//! ```rust,no_run
//! // The prelude contains all the imports you need to get started
//! use keel_rpc::prelude::*;
//!
//! // Define the service using Rust traits
//! #[keel_rpc::service]
//! trait Greeter {
//!     async fn greet(name: String) -> HandlerResult<String>;
//! }
//!
//! // Implement the service
//! struct GreeterImpl;
//!
//! impl Greeter for GreeterImpl {
//!     async fn greet(&self, _ctx: Context, name: String) -> HandlerResult<String> {
//!         Ok(format!("Greetings {name}"))
//!     }
//! }
//!
//! // Start the server, it serves until SIGTERM, SIGINT or SIGQUIT is received
//! #[tokio::main]
//! async fn main() -> Result<(), ServeError> {
//!     let server = Server::new(ServerOptions::new().address("0.0.0.0:8000"), &PluginCatalog::new());
//!     GreeterImpl.register(&server)?;
//!     server.serve().await
//! }
//! ```
//!
//! - Handlers take exactly one request and return a [`Result`].
//! - The request type implements [`Deserialize`](crate::serde::Deserialize) and `Default`, the
//!   reply type [`Serialize`](crate::serde::Serialize). See [`crate::serde`].
//! - The handler can now be called with `POST /Greeter/greet`. The names can be overridden
//!   with `#[name = "..."]` on the trait and on each method.
//!
//! Plain objects can be registered without the macro through
//! [`ServiceObject`](crate::service::ServiceObject), see [`crate::service`].
//!
//! # Logging
//!
//! This crate uses the [tracing crate][tracing] to emit logs, and opens a `keel_rpc_dispatch`
//! span for every dispatched call. Install a subscriber to see them:
//!
//! ```rust,no_run
//! use tracing_subscriber::EnvFilter;
//!
//! tracing_subscriber::fmt()
//!     .with_env_filter(EnvFilter::from_default_env())
//!     .init();
//! ```

pub mod context;
pub mod errors;
#[cfg(feature = "http_server")]
pub mod http_server;
#[cfg(feature = "hyper")]
pub mod hyper;
pub mod interceptor;
pub mod plugin;
pub mod serde;
pub mod server;
pub mod service;
pub mod transport;

/// Entry-point macro to define a service.
///
/// ```rust,no_run
/// use keel_rpc::prelude::*;
///
/// #[keel_rpc::service]
/// trait Greeter {
///     async fn greet(name: String) -> Result<String, HandlerError>;
/// }
/// ```
///
/// This macro accepts a `trait` as input, and generates as output a trait with the same name,
/// that you should implement on your own concrete type (e.g. `struct`):
///
/// ```rust,no_run
/// # use keel_rpc::prelude::*;
/// # #[keel_rpc::service]
/// # trait Greeter {
/// #    async fn greet(name: String) -> Result<String, HandlerError>;
/// # }
/// struct GreeterImpl;
/// impl Greeter for GreeterImpl {
///     async fn greet(&self, _: Context, name: String) -> Result<String, HandlerError> {
///         Ok(format!("Greetings {name}"))
///     }
/// }
/// ```
///
/// Each method additionally receives the call [`Context`](crate::prelude::Context). The trait
/// also gets:
///
/// * `fn service_desc() -> ServiceDesc`, the descriptor of the service, to hand to
///   [`Server::register`](crate::server::Server::register);
/// * `fn register(self, server: &Server)`, a shortcut registering `self` on `server`.
///
/// Methods take exactly one owned request and return either `Result<T, E>`, with `E`
/// convertible into [`HandlerError`](crate::prelude::HandlerError), or
/// [`HandlerResult<T>`](crate::prelude::HandlerResult).
///
/// The method name is used as the method name on the wire, the trait name as the service
/// name. Both can be overridden with the `name` attribute:
///
/// ```rust,no_run
/// use keel_rpc::prelude::*;
///
/// #[keel_rpc::service]
/// #[name = "greeter"]
/// trait Greeter {
///     // You can invoke this method with `POST /greeter/myGreet`
///     #[name = "myGreet"]
///     async fn my_greet(name: String) -> Result<String, HandlerError>;
/// }
/// ```
pub use keel_rpc_macros::service;

pub mod prelude {
    #[cfg(feature = "http_server")]
    pub use crate::http_server::HttpTransport;

    pub use crate::context::Context;
    pub use crate::errors::{CallError, HandlerError, HandlerResult, RegistrationError, ServeError};
    pub use crate::interceptor::{CallResult, Next, ServerInterceptor};
    pub use crate::plugin::{Plugin, PluginCatalog};
    pub use crate::serde::{Json, Message};
    pub use crate::server::{Server, ServerConfig, ServerOptions};
    pub use crate::service::{MethodSet, ServiceObject};
    pub use crate::transport::InProcess;
}
