use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-call context handed to interceptors and business methods.
///
/// Cheap to clone. Cancellation is cooperative: the transport cancels the token when the caller
/// goes away, handlers that care check [`Context::is_cancelled`] or await
/// [`CancellationToken::cancelled`].
#[derive(Clone, Debug)]
pub struct Context {
    inner: Arc<ContextInner>,
}

#[derive(Clone, Debug)]
struct ContextInner {
    service_name: String,
    method_name: String,
    metadata: HashMap<String, String>,
    cancellation: CancellationToken,
}

impl Context {
    pub fn new(service_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                service_name: service_name.into(),
                method_name: method_name.into(),
                metadata: HashMap::new(),
                cancellation: CancellationToken::new(),
            }),
        }
    }

    /// Attach a metadata entry, e.g. a transport header.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner)
            .metadata
            .insert(key.into(), value.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        Arc::make_mut(&mut self.inner).cancellation = token;
        self
    }

    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    pub fn method_name(&self) -> &str {
        &self.inner.method_name
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.inner.metadata.get(key).map(String::as_str)
    }

    pub fn metadata_map(&self) -> &HashMap<String, String> {
        &self.inner.metadata
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }
}
