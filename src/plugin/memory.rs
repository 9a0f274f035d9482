//! In-process service directory.
//!
//! [`MemoryResolver`] registers the server's address for each of its services into a shared
//! [`Directory`]. Useful for tests and for single-process deployments where clients look up
//! addresses in the same directory.

use super::{Plugin, PluginOption, PluginOptions, ResolverPlugin};
use crate::errors::BoxError;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Shared `service -> addresses` map.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries: Arc<Mutex<HashMap<String, Vec<String>>>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, service: &str, addr: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let addrs = entries.entry(service.to_owned()).or_default();
        if !addrs.iter().any(|a| a == addr) {
            addrs.push(addr.to_owned());
        }
    }

    pub fn remove(&self, service: &str, addr: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(addrs) = entries.get_mut(service) {
            addrs.retain(|a| a != addr);
            if addrs.is_empty() {
                entries.remove(service);
            }
        }
    }

    /// Addresses serving `service`, in registration order.
    pub fn lookup(&self, service: &str) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(service)
            .cloned()
            .unwrap_or_default()
    }
}

/// Resolver plugin named `memory`.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    directory: Directory,
}

impl MemoryResolver {
    pub const NAME: &'static str = "memory";

    pub fn new(directory: Directory) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }
}

impl Plugin for MemoryResolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn as_resolver(&self) -> Option<&dyn ResolverPlugin> {
        Some(self)
    }
}

impl ResolverPlugin for MemoryResolver {
    fn init<'a>(&'a self, opts: &'a [PluginOption]) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            let opts = PluginOptions::from(opts);
            let addr = opts.svr_addr.ok_or("no server address to register")?;
            for service in &opts.services {
                info!("Registering {service} at {addr}");
                self.directory.insert(service, &addr);
            }
            Ok(())
        })
    }

    fn deregister<'a>(&'a self, opts: &'a [PluginOption]) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            let opts = PluginOptions::from(opts);
            if let Some(addr) = opts.svr_addr {
                for service in &opts.services {
                    self.directory.remove(service, &addr);
                }
            }
            Ok(())
        })
    }
}
