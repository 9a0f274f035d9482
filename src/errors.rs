//! # Error Handling
//!
//! Errors are split by the phase in which they surface:
//!
//! * [`RegistrationError`]: a service object or descriptor was rejected while registering it.
//!   Nothing is installed when this is returned.
//! * [`CallError`]: a single call failed. Call errors never take the server down, they are
//!   the result of that call only.
//! * [`PluginError`]: a plugin could not be registered in the catalog or failed to initialize.
//! * [`ServeError`]: the server could not start serving.
//!
//! Business methods return [`HandlerError`], which wraps any error type and travels through the
//! interceptor chain unchanged as [`CallError::Handler`].

use crate::server::ServerState;
use crate::service::ShapeViolation;
use std::error::Error as StdError;
use std::fmt;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Error returned by business methods.
///
/// Any error convertible into a boxed [`std::error::Error`] converts into a `HandlerError`,
/// so `?` works on most error types inside a handler.
#[derive(Debug)]
pub struct HandlerError(BoxError);

impl HandlerError {
    /// The error returned by the business method.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }

    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<E: Into<BoxError>> From<E> for HandlerError {
    fn from(value: E) -> Self {
        Self(value.into())
    }
}

/// Result type for business methods.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Error produced while processing a single call.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Received a call for unknown method '{service}/{method}'")]
    NotFound { service: String, method: String },
    #[error("Received a call for unknown service '{0}'")]
    UnknownService(String),
    #[error("Bad path '{0}', expected '/service/method'")]
    BadPath(String),
    #[error("Failed to decode the request of '{method}': {source}")]
    Decode {
        method: String,
        #[source]
        source: BoxError,
    },
    #[error("Failed to encode the reply of '{method}': {source}")]
    Encode {
        method: String,
        #[source]
        source: BoxError,
    },
    #[error("Request handed to '{method}' is a '{found}', expected '{expected}'")]
    RequestMismatch {
        method: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Service instance is not a '{0}'")]
    InstanceMismatch(&'static str),
    #[error("Handler failed: {0}")]
    Handler(HandlerError),
    #[error("Server is closing")]
    Closing,
}

impl CallError {
    /// The business error, when the call failed inside the handler.
    pub fn handler_error(&self) -> Option<&HandlerError> {
        match self {
            CallError::Handler(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            CallError::NotFound { .. } | CallError::UnknownService(_) => 404,
            CallError::BadPath(_) | CallError::Decode { .. } => 400,
            CallError::Closing => 503,
            CallError::Encode { .. }
            | CallError::RequestMismatch { .. }
            | CallError::InstanceMismatch(_)
            | CallError::Handler(_) => 500,
        }
    }
}

impl From<HandlerError> for CallError {
    fn from(value: HandlerError) -> Self {
        CallError::Handler(value)
    }
}

/// Error returned when a service cannot be registered.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("method {method} invalid, {violation}")]
    Shape {
        method: String,
        violation: ShapeViolation,
    },
    #[error("handler type {expected} does not match service {found}")]
    CapabilityMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("method {0} is declared more than once")]
    DuplicateMethod(String),
    #[error("cannot register services while the server is {0:?}")]
    Closing(ServerState),
}

/// Which plugin capability failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Resolver,
    Tracing,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Resolver => f.write_str("resolver"),
            Capability::Tracing => f.write_str("tracing"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin '{0}' is already registered")]
    Duplicate(String),
    #[error("{capability} init error, plugin '{plugin}': {source}")]
    Init {
        plugin: String,
        capability: Capability,
        #[source]
        source: BoxError,
    },
    #[error("plugin '{0}' failed to initialize earlier")]
    PreviouslyFailed(String),
    #[error("cannot initialize plugins while the server is {0:?}")]
    Closing(ServerState),
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("cannot bind '{address}': {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot serve while the server is {0:?}")]
    InvalidState(ServerState),
}
