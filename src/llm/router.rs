//! Iterates preferred models with a per-model attempt budget, classifying
//! backend errors into retry, fallback-tier, disable-model, or next-model
//! outcomes.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::llm::client::BackendClient;
use crate::llm::ratelimit::RateLimiter;
use crate::llm::types::{ChatMessage, LlmParams, RoutingPolicy};

/// Iterates a preference-ordered model list, cooperating with a shared
/// [`RateLimiter`] and tracking run-scoped state (disabled models, a forced
/// service-tier fallback) across every call made through this router.
pub struct ModelRouter {
    client: Arc<dyn BackendClient>,
    policy: RoutingPolicy,
    base_params: LlmParams,
    limiter: Arc<RateLimiter>,
    disabled_models: StdMutex<HashSet<String>>,
    forced_service_tier: StdMutex<Option<String>>,
}

impl ModelRouter {
    pub fn new(
        client: Arc<dyn BackendClient>,
        policy: RoutingPolicy,
        base_params: LlmParams,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            client,
            policy,
            base_params,
            limiter,
            disabled_models: StdMutex::new(HashSet::new()),
            forced_service_tier: StdMutex::new(None),
        }
    }

    /// Fetches the backend's available model IDs and intersects them with
    /// `preferred_models`, preserving preferred order. Fails if the
    /// intersection is empty.
    pub async fn validate_models(&self) -> Result<Vec<String>> {
        let available: HashSet<String> = self.client.list_models().await?.into_iter().collect();
        let models: Vec<String> = self
            .policy
            .preferred_models
            .iter()
            .filter(|m| available.contains(*m))
            .cloned()
            .collect();

        let missing: Vec<&String> = self
            .policy
            .preferred_models
            .iter()
            .filter(|m| !available.contains(*m))
            .collect();
        if !missing.is_empty() {
            warn!(?missing, "preferred models missing from backend, ignoring");
        }

        if models.is_empty() {
            return Err(Error::NoModelsAvailable);
        }
        Ok(models)
    }

    /// Attempts generation across `models` in order, returning the generated
    /// text and the model that produced it.
    pub async fn generate(&self, messages: &[ChatMessage], models: &[String]) -> Result<(String, String)> {
        let mut last_err: Option<Error> = None;

        for model in models {
            if self.disabled_models.lock().unwrap_or_else(std::sync::PoisonError::into_inner).contains(model) {
                continue;
            }

            for attempt in 1..=self.policy.max_attempts_per_model {
                let effective_params = {
                    let forced = self.forced_service_tier.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
                    match forced {
                        Some(tier) => self.base_params.with_service_tier(tier),
                        None => self.base_params.clone(),
                    }
                };

                self.limiter.acquire().await;

                match self.client.chat(model, messages, &effective_params).await {
                    Ok(response) => {
                        self.limiter.observe_success(&response.headers).await;
                        debug!(model, attempt, "generation succeeded");
                        return Ok((response.text, model.clone()));
                    }
                    Err(Error::Backend { status, message, error_type, headers }) => {
                        let err = Error::Backend {
                            status,
                            message: message.clone(),
                            error_type: error_type.clone(),
                            headers: headers.clone(),
                        };

                        if status == 429 {
                            self.limiter.observe_rate_limited(&headers).await;
                            warn!(model, attempt, status, "rate limited, retrying same model");
                            last_err = Some(err);
                            continue;
                        }

                        if status == 498 && message.to_lowercase().contains("capacity_exceeded") {
                            warn!(model, "capacity exceeded, forcing on-demand service tier");
                            *self.forced_service_tier.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some("on-demand".to_string());
                            tokio::time::sleep(Duration::from_millis(200)).await;
                            last_err = Some(err);
                            continue;
                        }

                        if status == 400
                            && message.contains("service_tier")
                            && message.contains("not available for this org")
                        {
                            warn!(model, "service_tier rejected by org, forcing on-demand");
                            *self.forced_service_tier.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some("on-demand".to_string());
                            tokio::time::sleep(Duration::from_millis(200)).await;
                            last_err = Some(err);
                            continue;
                        }

                        if status >= 500 {
                            let sleep_s = self.jitter_backoff(attempt);
                            warn!(model, attempt, status, sleep_s, "server error, backing off");
                            tokio::time::sleep(Duration::from_secs_f64(sleep_s)).await;
                            last_err = Some(err);
                            continue;
                        }

                        if matches!(status, 400 | 404 | 422) {
                            warn!(model, status, error_type = ?error_type, message, "structural error, disabling model");
                            self.disabled_models.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(model.clone());
                            last_err = Some(err);
                            break;
                        }

                        warn!(model, status, message, "unclassified error, trying next model");
                        last_err = Some(err);
                        break;
                    }
                    Err(other) => {
                        warn!(model, attempt, error = %other, "unexpected error");
                        last_err = Some(other);
                        break;
                    }
                }
            }
        }

        Err(Error::RoutingExhausted(
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "no attempts were made".to_string()),
        ))
    }

    fn jitter_backoff(&self, attempt: u32) -> f64 {
        let exp = 2f64.powi(i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX));
        let base = (self.policy.backoff_base_s * exp).min(self.policy.backoff_max_s);
        let jitter = 0.7 + rand::thread_rng().gen_range(0.0..0.6_f64);
        base * jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::ChatResponse;
    use crate::llm::ratelimit::ThrottleConfig;
    use crate::llm::types::user_message;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    enum Outcome {
        Success(String),
        Fail {
            status: u16,
            message: String,
            headers: std::collections::HashMap<String, String>,
        },
    }

    impl Outcome {
        fn fail(status: u16, message: &str) -> Self {
            Self::Fail { status, message: message.to_string(), headers: std::collections::HashMap::new() }
        }
    }

    struct ScriptedClient {
        calls: AtomicUsize,
        script: Vec<Outcome>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Outcome>) -> Self {
            Self { calls: AtomicUsize::new(0), script }
        }
    }

    #[async_trait::async_trait]
    impl BackendClient for ScriptedClient {
        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(vec!["X".to_string(), "Y".to_string()])
        }

        async fn chat(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
            _params: &LlmParams,
        ) -> Result<ChatResponse> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.get(idx) {
                Some(Outcome::Success(text)) => {
                    Ok(ChatResponse { text: text.clone(), headers: std::collections::HashMap::new() })
                }
                Some(Outcome::Fail { status, message, headers }) => Err(Error::Backend {
                    status: *status,
                    message: message.clone(),
                    error_type: None,
                    headers: headers.clone(),
                }),
                None => Err(Error::Other("script exhausted".to_string())),
            }
        }
    }

    fn test_policy() -> RoutingPolicy {
        RoutingPolicy {
            preferred_models: vec!["X".to_string(), "Y".to_string()],
            max_attempts_per_model: 2,
            backoff_base_s: 0.01,
            backoff_max_s: 0.02,
        }
    }

    fn test_params() -> LlmParams {
        LlmParams {
            temperature: 0.2,
            top_p: 1.0,
            max_completion_tokens: 100,
            stream: false,
            service_tier: None,
            reasoning_effort: None,
        }
    }

    fn test_limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(ThrottleConfig {
            enabled: false,
            min_interval_seconds: 0.0,
            min_remaining_tokens: 0,
        }))
    }

    #[tokio::test]
    async fn falls_back_to_next_model_on_structural_error() {
        // model X returns a structural 400, model Y succeeds.
        let client: Arc<dyn BackendClient> = Arc::new(ScriptedClient::new(vec![
            Outcome::fail(400, "model X not found"),
            Outcome::Success("doc body".to_string()),
        ]));
        let router = ModelRouter::new(client, test_policy(), test_params(), test_limiter());

        let messages = vec![user_message("hi")];
        let (text, model) = router.generate(&messages, &["X".to_string(), "Y".to_string()]).await.expect("generate");

        assert_eq!(text, "doc body");
        assert_eq!(model, "Y");
        assert!(router.disabled_models.lock().expect("lock").contains("X"));
    }

    #[tokio::test]
    async fn service_tier_rejection_forces_fallback_and_retries_same_model() {
        let client: Arc<dyn BackendClient> = Arc::new(ScriptedClient::new(vec![
            Outcome::fail(400, "service_tier=auto not available for this org"),
            Outcome::Success("doc body".to_string()),
        ]));
        let router = ModelRouter::new(client, test_policy(), test_params(), test_limiter());

        let messages = vec![user_message("hi")];
        let (text, model) = router.generate(&messages, &["X".to_string()]).await.expect("generate");

        assert_eq!(text, "doc body");
        assert_eq!(model, "X");
        assert_eq!(
            router.forced_service_tier.lock().expect("lock").as_deref(),
            Some("on-demand")
        );
    }

    #[tokio::test]
    async fn capacity_exceeded_forces_fallback_and_retries_same_model() {
        let client: Arc<dyn BackendClient> = Arc::new(ScriptedClient::new(vec![
            Outcome::fail(498, "capacity_exceeded"),
            Outcome::Success("doc body".to_string()),
        ]));
        let router = ModelRouter::new(client, test_policy(), test_params(), test_limiter());

        let (text, model) = router
            .generate(&[user_message("hi")], &["X".to_string()])
            .await
            .expect("generate");

        assert_eq!(text, "doc body");
        assert_eq!(model, "X");
    }

    #[tokio::test]
    async fn exhausting_every_model_surfaces_the_last_error() {
        let client: Arc<dyn BackendClient> = Arc::new(ScriptedClient::new(vec![Outcome::fail(404, "unknown model")]));
        let router = ModelRouter::new(client, test_policy(), test_params(), test_limiter());

        let err = router
            .generate(&[user_message("hi")], &["X".to_string()])
            .await
            .expect_err("should fail");

        assert!(matches!(err, Error::RoutingExhausted(_)));
    }

    #[tokio::test]
    async fn rate_limit_headers_on_a_429_reach_the_limiter() {
        // A 429's retry-after header must drive the limiter's wait before the
        // retry on the same model, not the empty map a stub would supply.
        let mut headers = std::collections::HashMap::new();
        headers.insert("retry-after".to_string(), "0.08s".to_string());

        let client: Arc<dyn BackendClient> = Arc::new(ScriptedClient::new(vec![
            Outcome::Fail { status: 429, message: "rate limited".to_string(), headers },
            Outcome::Success("doc body".to_string()),
        ]));
        let limiter = Arc::new(RateLimiter::new(ThrottleConfig {
            enabled: true,
            min_interval_seconds: 0.0,
            min_remaining_tokens: 0,
        }));
        let router = ModelRouter::new(client, test_policy(), test_params(), limiter);

        let start = std::time::Instant::now();
        let (text, model) = router.generate(&[user_message("hi")], &["X".to_string()]).await.expect("generate");

        assert_eq!(text, "doc body");
        assert_eq!(model, "X");
        assert!(start.elapsed() >= std::time::Duration::from_millis(75));
    }

    #[test]
    fn jitter_backoff_is_bounded_by_cap() {
        let client: Arc<dyn BackendClient> = Arc::new(ScriptedClient::new(vec![]));
        let router = ModelRouter::new(client, test_policy(), test_params(), test_limiter());
        for attempt in 1..=10 {
            let delay = router.jitter_backoff(attempt);
            assert!(delay <= router.policy.backoff_max_s * 1.3 + f64::EPSILON);
        }
    }
}
