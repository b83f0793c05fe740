//! Provider-agnostic chat-completion types shared by the backend client and
//! the router.

use serde::{Deserialize, Serialize};

/// A chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Builds a single user-role message, the only kind this crate ever sends.
pub fn user_message(content: impl Into<String>) -> ChatMessage {
    ChatMessage {
        role: Role::User,
        content: content.into(),
    }
}

/// A value snapshot of per-request generation parameters. Produced once from
/// configuration, then field-wise copied (never mutated) when the router
/// needs to override the service tier.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_completion_tokens: u32,
    /// Advisory only: the backend client always transmits `stream=false`.
    pub stream: bool,
    pub service_tier: Option<String>,
    pub reasoning_effort: Option<String>,
}

impl LlmParams {
    /// Returns a copy of `self` with `service_tier` replaced.
    #[must_use]
    pub fn with_service_tier(&self, tier: impl Into<String>) -> Self {
        Self {
            service_tier: Some(tier.into()),
            ..self.clone()
        }
    }
}

/// Preference-ordered model list and retry budget, a configuration snapshot.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    pub preferred_models: Vec<String>,
    pub max_attempts_per_model: u32,
    pub backoff_base_s: f64,
    pub backoff_max_s: f64,
}

/// Normalizes the `reasoning_effort` field for transmission, per model family.
/// Families not recognized here never receive the field.
pub fn effective_reasoning_effort(model: &str, requested: Option<&str>) -> Option<String> {
    let requested = requested?;
    match model.trim() {
        "openai/gpt-oss-20b" | "openai/gpt-oss-120b" => match requested {
            "low" | "medium" | "high" => Some(requested.to_string()),
            "default" => Some("medium".to_string()),
            _ => None,
        },
        "qwen/qwen3-32b" => match requested {
            "none" | "default" => Some(requested.to_string()),
            "low" | "medium" | "high" => Some("default".to_string()),
            _ => None,
        },
        _ => None,
    }
}

/// Normalizes the `service_tier` field: omitted when unset or `"on-demand"`.
pub fn effective_service_tier(tier: Option<&str>) -> Option<String> {
    match tier.map(str::trim) {
        None | Some("") | Some("on-demand") => None,
        Some(other) => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpt_oss_accepts_low_medium_high() {
        assert_eq!(
            effective_reasoning_effort("openai/gpt-oss-20b", Some("high")),
            Some("high".to_string())
        );
    }

    #[test]
    fn gpt_oss_maps_default_to_medium() {
        assert_eq!(
            effective_reasoning_effort("openai/gpt-oss-120b", Some("default")),
            Some("medium".to_string())
        );
    }

    #[test]
    fn qwen_maps_low_medium_high_to_default() {
        assert_eq!(
            effective_reasoning_effort("qwen/qwen3-32b", Some("high")),
            Some("default".to_string())
        );
    }

    #[test]
    fn unknown_family_omits_the_field() {
        assert_eq!(effective_reasoning_effort("llama-3.3-70b-versatile", Some("high")), None);
    }

    #[test]
    fn service_tier_on_demand_is_omitted() {
        assert_eq!(effective_service_tier(Some("on-demand")), None);
        assert_eq!(effective_service_tier(None), None);
        assert_eq!(effective_service_tier(Some("")), None);
    }

    #[test]
    fn service_tier_other_value_is_verbatim() {
        assert_eq!(effective_service_tier(Some("flex")), Some("flex".to_string()));
    }
}
