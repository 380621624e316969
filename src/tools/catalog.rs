//! Flat, prefixed tool namespace over a set of providers.

use super::{ProviderId, ToolOutput, ToolProvider};
use crate::error::ToolError;
use crate::types::ToolDescriptor;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a prefixed catalog name is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRoute {
    pub provider: ProviderId,
    pub native_name: String,
}

/// Catalog name for a provider's native tool.
pub fn prefixed_name(provider: &ProviderId, native: &str) -> String {
    format!("{provider}_{native}")
}

/// Aggregated tool list plus the routing table used to dispatch calls.
///
/// The list and routes are cached and rebuilt lazily whenever the provider
/// set has changed since the last build.
pub struct ToolCatalog {
    providers: Vec<(ProviderId, Arc<dyn ToolProvider>)>,
    descriptors: Vec<ToolDescriptor>,
    routes: HashMap<String, ToolRoute>,
    stale: bool,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            descriptors: Vec::new(),
            routes: HashMap::new(),
            stale: true,
        }
    }

    /// Add a provider, replacing any provider with the same id.
    pub fn add_provider(&mut self, provider: Arc<dyn ToolProvider>) {
        let id = provider.id();
        if let Some(slot) = self.providers.iter_mut().find(|(existing, _)| *existing == id) {
            warn!(provider = %id, "replacing tool provider with the same id");
            slot.1 = provider;
        } else {
            self.providers.push((id, provider));
        }
        self.stale = true;
    }

    /// Remove a provider; returns it when it was present.
    pub fn remove_provider(&mut self, id: &ProviderId) -> Option<Arc<dyn ToolProvider>> {
        let index = self.providers.iter().position(|(existing, _)| existing == id)?;
        self.stale = true;
        Some(self.providers.remove(index).1)
    }

    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Re-list every provider's tools and rebuild the routing table.
    ///
    /// A provider that fails to list contributes nothing this round. On a
    /// name collision the earlier provider keeps the name.
    pub async fn rebuild(&mut self) {
        let mut descriptors = Vec::new();
        let mut routes = HashMap::new();

        for (id, provider) in &self.providers {
            let tools = match provider.list_tools().await {
                Ok(tools) => tools,
                Err(err) => {
                    warn!(provider = %id, error = %err, "listing tools failed");
                    continue;
                }
            };
            for tool in tools {
                let name = prefixed_name(id, &tool.name);
                if routes.contains_key(&name) {
                    warn!(tool = %name, provider = %id, "duplicate tool name, keeping the first");
                    continue;
                }
                routes.insert(
                    name.clone(),
                    ToolRoute {
                        provider: id.clone(),
                        native_name: tool.name.clone(),
                    },
                );
                descriptors.push(ToolDescriptor {
                    name,
                    description: format!("[{id}] {}", tool.description),
                    input_schema: tool.input_schema,
                });
            }
        }

        debug!(tools = descriptors.len(), "tool catalog rebuilt");
        self.descriptors = descriptors;
        self.routes = routes;
        self.stale = false;
    }

    /// The prefixed tool list, rebuilt first if the provider set changed.
    pub async fn tools(&mut self) -> &[ToolDescriptor] {
        if self.stale {
            self.rebuild().await;
        }
        &self.descriptors
    }

    pub fn resolve(&self, name: &str) -> Option<ToolRoute> {
        self.routes.get(name).cloned()
    }

    /// Call the provider a route points at.
    pub async fn call_route(&self, route: &ToolRoute, arguments: Value) -> Result<ToolOutput, ToolError> {
        let provider = self
            .providers
            .iter()
            .find(|(id, _)| *id == route.provider)
            .map(|(_, provider)| provider.clone())
            .ok_or_else(|| ToolError::Provider(format!("provider {} is not loaded", route.provider)))?;
        provider.call_tool(&route.native_name, arguments).await
    }

    /// Rebuild if stale, then resolve a prefixed name.
    pub async fn lookup(&mut self, name: &str) -> Result<ToolRoute, ToolError> {
        if self.stale {
            self.rebuild().await;
        }
        self.resolve(name).ok_or_else(|| {
            warn!(tool = name, "unknown tool requested");
            ToolError::NotFound(name.to_string())
        })
    }

    /// Resolve and call a prefixed tool name in one step, for library callers
    /// that do not need the route. The agent loop uses `lookup` and
    /// `call_route` so it can report the call before it runs.
    ///
    /// Unknown names produce a failure output without contacting any provider.
    pub async fn dispatch(&mut self, name: &str, arguments: Value) -> ToolOutput {
        let route = match self.lookup(name).await {
            Ok(route) => route,
            Err(err) => return ToolOutput::failure(err.to_string()),
        };
        debug!(tool = name, provider = %route.provider, "dispatching tool call");
        match self.call_route(&route, arguments).await {
            Ok(output) => output,
            Err(err) => ToolOutput::failure(err.to_string()),
        }
    }

    /// Give every provider a chance to release its resources.
    pub async fn shutdown(&self) {
        for (id, provider) in &self.providers {
            debug!(provider = %id, "shutting down tool provider");
            provider.shutdown().await;
        }
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}
