use regex::Regex;
use std::sync::Arc;

use super::retailers::default_bindings;
use super::traits::Probe;
use crate::utils::error::Result;

/// Ties a URL pattern to the probe that understands that retailer's pages.
#[derive(Clone)]
pub struct RetailerBinding {
    pattern: Regex,
    probe: Arc<dyn Probe>,
    enabled: bool,
}

impl RetailerBinding {
    pub fn new(pattern: &str, probe: Arc<dyn Probe>) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            probe,
            enabled: true,
        })
    }

    /// A disabled binding still claims its URLs but is never probed.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn name(&self) -> &str {
        self.probe.name()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn probe(&self) -> &dyn Probe {
        self.probe.as_ref()
    }

    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }
}

impl std::fmt::Debug for RetailerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetailerBinding")
            .field("name", &self.name())
            .field("pattern", &self.pattern.as_str())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Ordered retailer bindings. Resolution is first-registered-wins; patterns
/// are substring matches and are not checked for overlap.
#[derive(Debug, Clone, Default)]
pub struct RetailerRegistry {
    bindings: Vec<RetailerBinding>,
}

impl RetailerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_retailers(disabled: &[String]) -> Result<Self> {
        let mut registry = Self::new();
        for binding in default_bindings(disabled)? {
            registry.register(binding);
        }
        Ok(registry)
    }

    pub fn register(&mut self, binding: RetailerBinding) {
        tracing::debug!(
            "Registered retailer {} ({})",
            binding.name(),
            if binding.is_enabled() { "enabled" } else { "disabled" }
        );
        self.bindings.push(binding);
    }

    pub fn resolve(&self, url: &str) -> Option<&RetailerBinding> {
        self.bindings.iter().find(|binding| binding.matches(url))
    }

    pub fn names(&self) -> Vec<&str> {
        self.bindings.iter().map(|binding| binding.name()).collect()
    }
}
