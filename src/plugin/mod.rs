//! Plugins hooking cross-cutting concerns into server startup.
//!
//! A [`Plugin`] is named and may expose one or both capabilities:
//!
//! * [`ResolverPlugin`]: announces the server to a service discovery backend when plugins are
//!   initialized, and withdraws it when the server closes.
//! * [`TracingPlugin`]: connects to a tracing backend and returns a [`Tracer`], which the server
//!   turns into an interceptor appended to the chain.
//!
//! Plugins are collected in a [`PluginCatalog`] at the composition root. A server only
//! initializes the plugins whose names are listed in its configuration.

pub mod memory;
pub mod span;

use crate::context::Context;
use crate::errors::{BoxError, PluginError};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub trait Plugin: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn as_resolver(&self) -> Option<&dyn ResolverPlugin> {
        None
    }

    fn as_tracing(&self) -> Option<&dyn TracingPlugin> {
        None
    }
}

pub trait ResolverPlugin: Send + Sync {
    /// Register this server with the discovery backend.
    fn init<'a>(&'a self, opts: &'a [PluginOption]) -> BoxFuture<'a, Result<(), BoxError>>;

    /// Withdraw this server from the discovery backend.
    fn deregister<'a>(&'a self, opts: &'a [PluginOption]) -> BoxFuture<'a, Result<(), BoxError>> {
        let _ = opts;
        Box::pin(async { Ok(()) })
    }
}

pub trait TracingPlugin: Send + Sync {
    fn init<'a>(&'a self, opts: &'a [PluginOption]) -> BoxFuture<'a, Result<Arc<dyn Tracer>, BoxError>>;
}

/// Handle to a tracing backend.
pub trait Tracer: Send + Sync + 'static {
    /// Open the span recording `operation`.
    fn start_span(&self, operation: &str, ctx: &Context) -> tracing::Span;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOption {
    /// Address of the service discovery backend.
    SelectorSvrAddr(String),
    /// Address this server listens on.
    SvrAddr(String),
    /// Names of the services this server exposes.
    Services(Vec<String>),
    /// Address of the tracing backend.
    TracingSvrAddr(String),
}

/// Plugin options folded into one value, later options win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginOptions {
    pub selector_svr_addr: Option<String>,
    pub svr_addr: Option<String>,
    pub services: Vec<String>,
    pub tracing_svr_addr: Option<String>,
}

impl From<&[PluginOption]> for PluginOptions {
    fn from(opts: &[PluginOption]) -> Self {
        opts.iter().fold(Self::default(), |mut acc, opt| {
            match opt {
                PluginOption::SelectorSvrAddr(addr) => acc.selector_svr_addr = Some(addr.clone()),
                PluginOption::SvrAddr(addr) => acc.svr_addr = Some(addr.clone()),
                PluginOption::Services(services) => acc.services = services.clone(),
                PluginOption::TracingSvrAddr(addr) => acc.tracing_svr_addr = Some(addr.clone()),
            }
            acc
        })
    }
}

/// Plugins known to the process, in registration order.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin. Names are write-once.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        if self.get(plugin.name()).is_some() {
            return Err(PluginError::Duplicate(plugin.name().to_owned()));
        }
        self.plugins.push(plugin);
        Ok(())
    }

    /// Builder variant of [`PluginCatalog::register`].
    pub fn with(mut self, plugin: impl Plugin) -> Result<Self, PluginError> {
        self.register(Arc::new(plugin))?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.iter().find(|p| p.name() == name)
    }

    /// The plugins named in `names`, in catalog order. Unknown names are skipped.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Vec<Arc<dyn Plugin>> {
        for name in names {
            if self.get(name.as_ref()).is_none() {
                debug!("Ignoring unknown plugin '{}'", name.as_ref());
            }
        }
        self.plugins
            .iter()
            .filter(|p| names.iter().any(|n| n.as_ref() == p.name()))
            .cloned()
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|p| p.name())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Plugin for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn names_are_write_once() {
        let mut catalog = PluginCatalog::new();
        catalog.register(Arc::new(Named("a"))).unwrap();

        let err = catalog.register(Arc::new(Named("a"))).unwrap_err();

        assert!(matches!(err, PluginError::Duplicate(name) if name == "a"));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn selection_keeps_catalog_order_and_skips_unknown_names() {
        let catalog = PluginCatalog::new()
            .with(Named("first"))
            .and_then(|c| c.with(Named("second")))
            .and_then(|c| c.with(Named("third")))
            .unwrap();

        let selected = catalog.select(&["third", "missing", "first"]);

        let names: Vec<_> = selected.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["first", "third"]);
        assert!(catalog.select::<&str>(&[]).is_empty());
    }

    #[test]
    fn options_fold_into_one_value() {
        let opts = [
            PluginOption::SelectorSvrAddr("127.0.0.1:2379".to_owned()),
            PluginOption::SvrAddr("127.0.0.1:8000".to_owned()),
            PluginOption::Services(vec!["Echo".to_owned()]),
        ];

        let folded = PluginOptions::from(&opts[..]);

        assert_eq!(folded.selector_svr_addr.as_deref(), Some("127.0.0.1:2379"));
        assert_eq!(folded.services, ["Echo"]);
        assert_eq!(folded.tracing_svr_addr, None);
    }
}
