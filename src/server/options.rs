use crate::interceptor::ServerInterceptor;
use crate::transport::Transport;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Plain server configuration.
///
/// Every field has a default, so a partial JSON document is a valid configuration:
///
/// ```rust
/// use keel_rpc::server::ServerConfig;
///
/// let config = ServerConfig::from_json(r#"{"address": "0.0.0.0:9000", "plugin_names": ["memory"]}"#).unwrap();
/// assert_eq!(config.address, "0.0.0.0:9000");
/// assert_eq!(config.tracing_span_name, "keel-rpc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the transport listens on.
    pub address: String,
    /// Address of the service discovery backend, handed to resolver plugins.
    pub selector_svr_addr: String,
    /// Address of the tracing backend, handed to tracing plugins.
    pub tracing_svr_addr: String,
    /// Operation name of the spans opened by the tracing interceptor.
    pub tracing_span_name: String,
    /// Plugins to initialize, looked up in the [`PluginCatalog`](crate::plugin::PluginCatalog).
    pub plugin_names: Vec<String>,
    /// How long the transport waits for in-flight calls when closing.
    #[serde(deserialize_with = "duration_millis::deserialize", rename = "shutdown_timeout_ms")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8000".to_owned(),
            selector_svr_addr: String::new(),
            tracing_svr_addr: String::new(),
            tracing_span_name: "keel-rpc".to_owned(),
            plugin_names: Vec::new(),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Options a [`Server`](super::Server) is built with.
#[derive(Clone, Default)]
pub struct ServerOptions {
    pub(crate) config: ServerConfig,
    pub(crate) interceptors: Vec<Arc<dyn ServerInterceptor>>,
    pub(crate) transport: Option<Arc<dyn Transport>>,

    _priv: (),
}

impl ServerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    pub fn selector_svr_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.selector_svr_addr = addr.into();
        self
    }

    pub fn tracing_svr_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.tracing_svr_addr = addr.into();
        self
    }

    pub fn tracing_span_name(mut self, name: impl Into<String>) -> Self {
        self.config.tracing_span_name = name.into();
        self
    }

    /// Select a plugin by name. Names missing from the catalog are ignored.
    pub fn plugin(mut self, name: impl Into<String>) -> Self {
        self.config.plugin_names.push(name.into());
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Append an interceptor. Interceptors run in the order they are added.
    pub fn interceptor(mut self, interceptor: impl ServerInterceptor) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Serve over `transport` instead of the default one.
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }
}

impl fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOptions")
            .field("config", &self.config)
            .field("interceptors", &self.interceptors.len())
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ServerConfig::from_json("{}").unwrap();

        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
    }

    #[test]
    fn shutdown_timeout_is_read_in_millis() {
        let config = ServerConfig::from_json(r#"{"shutdown_timeout_ms": 250}"#).unwrap();

        assert_eq!(config.shutdown_timeout, Duration::from_millis(250));
    }

    #[test]
    fn builder_appends_plugins_and_interceptors() {
        let opts = ServerOptions::new()
            .address("0.0.0.0:9000")
            .plugin("memory")
            .plugin("span")
            .interceptor(crate::interceptor::from_fn(|ctx, req, next| next.run(ctx, req)));

        assert_eq!(opts.config.address, "0.0.0.0:9000");
        assert_eq!(opts.config.plugin_names, ["memory", "span"]);
        assert_eq!(opts.interceptors.len(), 1);
    }
}
