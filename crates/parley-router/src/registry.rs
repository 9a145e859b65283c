//! Validated agent registry.
//!
//! Constructed once at process start from externally managed descriptors
//! and injected into the router. Lookups hand out `Arc` snapshots, so a
//! registry reload elsewhere never mutates what an in-flight turn sees.

use std::collections::HashMap;
use std::sync::Arc;

use parley_core::agent::{AgentCategory, AgentDescriptor};
use parley_core::ids::AgentId;

use crate::errors::RouterError;
use crate::provider::ModelProvider;

/// A descriptor paired with the provider that implements its behavior.
pub struct RegisteredAgent {
    /// Immutable descriptor snapshot.
    pub descriptor: AgentDescriptor,
    /// Capability implementation for this agent.
    pub provider: Arc<dyn ModelProvider>,
}

/// Immutable set of agents available to the router.
///
/// INVARIANTS (enforced at construction):
/// - At most one active descriptor per category.
/// - An active fallback descriptor always resolves.
pub struct AgentRegistry {
    agents: Vec<Arc<RegisteredAgent>>,
    by_name: HashMap<AgentId, Arc<RegisteredAgent>>,
    fallback: Arc<RegisteredAgent>,
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.agents.len())
            .finish_non_exhaustive()
    }
}

impl AgentRegistry {
    /// Build a registry, validating the descriptor-set invariants.
    pub fn new(
        entries: Vec<(AgentDescriptor, Arc<dyn ModelProvider>)>,
    ) -> Result<Self, RouterError> {
        if entries.is_empty() {
            return Err(RouterError::Empty);
        }

        let mut agents = Vec::with_capacity(entries.len());
        let mut by_name = HashMap::new();
        let mut seen_categories: HashMap<AgentCategory, ()> = HashMap::new();
        let mut fallback = None;

        for (descriptor, provider) in entries {
            if descriptor.active && seen_categories.insert(descriptor.category, ()).is_some() {
                return Err(RouterError::DuplicateCategory(descriptor.category));
            }
            let agent = Arc::new(RegisteredAgent {
                descriptor,
                provider,
            });
            if agent.descriptor.active && agent.descriptor.category == AgentCategory::Fallback {
                fallback = Some(Arc::clone(&agent));
            }
            let _ = by_name.insert(agent.descriptor.name.clone(), Arc::clone(&agent));
            agents.push(agent);
        }

        let fallback = fallback.ok_or(RouterError::NoFallback)?;
        Ok(Self {
            agents,
            by_name,
            fallback,
        })
    }

    /// All active agents.
    pub fn active(&self) -> impl Iterator<Item = &Arc<RegisteredAgent>> {
        self.agents.iter().filter(|a| a.descriptor.active)
    }

    /// Resolve an agent by name (active or not).
    #[must_use]
    pub fn resolve(&self, name: &AgentId) -> Option<&Arc<RegisteredAgent>> {
        self.by_name.get(name)
    }

    /// Whether `name` refers to a registered agent.
    #[must_use]
    pub fn contains(&self, name: &AgentId) -> bool {
        self.by_name.contains_key(name)
    }

    /// The always-resolvable active fallback agent.
    #[must_use]
    pub fn fallback(&self) -> &Arc<RegisteredAgent> {
        &self.fallback
    }

    /// Number of registered agents (active and inactive).
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the registry is empty (never true for a constructed one).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockModelProvider;
    use assert_matches::assert_matches;

    fn provider() -> Arc<dyn ModelProvider> {
        Arc::new(MockModelProvider::new())
    }

    fn descriptor(name: &str, category: AgentCategory, active: bool) -> AgentDescriptor {
        let mut d = AgentDescriptor::new(name, category);
        d.active = active;
        d
    }

    #[test]
    fn registry_requires_fallback() {
        let err = AgentRegistry::new(vec![(
            descriptor("greeter", AgentCategory::Greeting, true),
            provider(),
        )])
        .unwrap_err();
        assert_matches!(err, RouterError::NoFallback);
    }

    #[test]
    fn inactive_fallback_does_not_count() {
        let err = AgentRegistry::new(vec![(
            descriptor("fallback", AgentCategory::Fallback, false),
            provider(),
        )])
        .unwrap_err();
        assert_matches!(err, RouterError::NoFallback);
    }

    #[test]
    fn duplicate_active_category_rejected() {
        let err = AgentRegistry::new(vec![
            (descriptor("a", AgentCategory::Retrieval, true), provider()),
            (descriptor("b", AgentCategory::Retrieval, true), provider()),
            (descriptor("fb", AgentCategory::Fallback, true), provider()),
        ])
        .unwrap_err();
        assert_matches!(err, RouterError::DuplicateCategory(AgentCategory::Retrieval));
    }

    #[test]
    fn inactive_duplicate_category_allowed() {
        let registry = AgentRegistry::new(vec![
            (descriptor("a", AgentCategory::Retrieval, true), provider()),
            (descriptor("a-old", AgentCategory::Retrieval, false), provider()),
            (descriptor("fb", AgentCategory::Fallback, true), provider()),
        ])
        .unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.active().count(), 2);
    }

    #[test]
    fn empty_registry_rejected() {
        assert_matches!(AgentRegistry::new(vec![]).unwrap_err(), RouterError::Empty);
    }

    #[test]
    fn resolve_and_fallback() {
        let registry = AgentRegistry::new(vec![
            (descriptor("greeter", AgentCategory::Greeting, true), provider()),
            (descriptor("fb", AgentCategory::Fallback, true), provider()),
        ])
        .unwrap();
        assert!(registry.contains(&AgentId::from("greeter")));
        assert!(registry.resolve(&AgentId::from("ghost")).is_none());
        assert_eq!(registry.fallback().descriptor.name.as_str(), "fb");
    }
}
