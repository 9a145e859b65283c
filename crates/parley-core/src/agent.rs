//! Agent descriptors — configuration naming a specialized responder.
//!
//! Descriptors are managed outside the core (ops tooling writes them) and
//! read-shared as immutable snapshots. The router depends only on the
//! descriptor plus the model-invocation capability trait, never on
//! per-category concrete types.

use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

// ─────────────────────────────────────────────────────────────────────────────
// Category
// ─────────────────────────────────────────────────────────────────────────────

/// Specialization category of an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentCategory {
    /// Opens conversations, small talk.
    Greeting,
    /// Classifies what the user wants.
    IntentClassification,
    /// Answers from knowledge lookup.
    Retrieval,
    /// Executes multi-step tasks.
    TaskExecution,
    /// Catch-all when nothing else is confident.
    Fallback,
}

impl AgentCategory {
    /// Fixed tie-break priority: higher wins when confidences are equal.
    ///
    /// Classification > retrieval > task-execution > greeting > fallback.
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Self::IntentClassification => 4,
            Self::Retrieval => 3,
            Self::TaskExecution => 2,
            Self::Greeting => 1,
            Self::Fallback => 0,
        }
    }

    /// All categories, in no particular order.
    #[must_use]
    pub fn all() -> [Self; 5] {
        [
            Self::Greeting,
            Self::IntentClassification,
            Self::Retrieval,
            Self::TaskExecution,
            Self::Fallback,
        ]
    }
}

impl std::fmt::Display for AgentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Greeting => "greeting",
            Self::IntentClassification => "intent-classification",
            Self::Retrieval => "retrieval",
            Self::TaskExecution => "task-execution",
            Self::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Invocation configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Model invocation parameters for one agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationConfig {
    /// Model reference passed to the invocation collaborator.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Output token budget.
    pub max_tokens: u32,
    /// System prompt template for this agent.
    pub prompt_template: String,
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            prompt_template: String::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Descriptor
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration naming a specialized responder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    /// Stable name.
    pub name: AgentId,
    /// Specialization category.
    pub category: AgentCategory,
    /// Model invocation parameters.
    pub invocation: InvocationConfig,
    /// Whether this descriptor participates in routing.
    pub active: bool,
}

impl AgentDescriptor {
    /// Build an active descriptor with default invocation parameters.
    #[must_use]
    pub fn new(name: impl Into<AgentId>, category: AgentCategory) -> Self {
        Self {
            name: name.into(),
            category,
            invocation: InvocationConfig::default(),
            active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_priority_ordering() {
        assert!(AgentCategory::IntentClassification.priority() > AgentCategory::Retrieval.priority());
        assert!(AgentCategory::Retrieval.priority() > AgentCategory::TaskExecution.priority());
        assert!(AgentCategory::TaskExecution.priority() > AgentCategory::Greeting.priority());
        assert!(AgentCategory::Greeting.priority() > AgentCategory::Fallback.priority());
    }

    #[test]
    fn category_serializes_kebab_case() {
        let json = serde_json::to_string(&AgentCategory::IntentClassification).unwrap();
        assert_eq!(json, "\"intent-classification\"");
        let json = serde_json::to_string(&AgentCategory::TaskExecution).unwrap();
        assert_eq!(json, "\"task-execution\"");
    }

    #[test]
    fn descriptor_serde_roundtrip() {
        let d = AgentDescriptor::new("intent", AgentCategory::IntentClassification);
        let json = serde_json::to_string(&d).unwrap();
        let back: AgentDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
        assert!(back.active);
    }
}
