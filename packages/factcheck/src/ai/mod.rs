//! Structured LLM generation: the OpenAI backend, strict schemas, and the
//! validate-and-retry-once helper both LLM-backed stages use.

pub mod openai;
pub mod schema;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{BreakerError, GenerationError};
use crate::resilience::CircuitBreaker;
use crate::traits::generator::{GenerationRequest, StructuredGenerator, StructuredOutput};

pub use openai::OpenAIGenerator;

const STRICT_RETRY_INSTRUCTIONS: &str = "Your previous answer was rejected: {error}

Answer again. Return ONLY a JSON object that matches the schema exactly. \
Every field is required. Do not add fields, comments or prose. Use only the \
allowed enum values. Refer to claims and sources only by the identifiers given.";

/// Result of [`LlmClient::generate_validated`].
#[derive(Debug)]
pub enum LlmOutcome<T> {
    /// Output parsed and passed validation.
    Valid(T),
    /// Both attempts produced unusable output; `error` is the last reason.
    Invalid { error: String },
    /// The dependency itself failed (open circuit, timeout, transport or
    /// API error). No retry is made.
    Unavailable(String),
}

/// A generator together with its circuit breaker and per-call timeout.
#[derive(Clone)]
pub struct LlmClient {
    generator: Arc<dyn StructuredGenerator>,
    breaker: Arc<CircuitBreaker>,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(
        generator: Arc<dyn StructuredGenerator>,
        breaker: Arc<CircuitBreaker>,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            breaker,
            timeout,
        }
    }

    pub fn name(&self) -> &str {
        self.generator.name()
    }

    /// Generate a `T`, check it with `validate`, and re-prompt once with
    /// stricter formatting instructions if parsing or validation fails.
    ///
    /// Only dependency failures count against the circuit breaker; a healthy
    /// model giving a bad answer does not.
    pub async fn generate_validated<T, V>(
        &self,
        system: &str,
        user: &str,
        validate: V,
    ) -> LlmOutcome<T>
    where
        T: StructuredOutput,
        V: Fn(&T) -> Result<(), String> + Send,
    {
        let schema = schema::strict_schema::<T>();
        let mut error = String::new();

        for attempt in 0..2u32 {
            let system = if attempt == 0 {
                system.to_string()
            } else {
                format!(
                    "{}\n\n{}",
                    system,
                    STRICT_RETRY_INSTRUCTIONS.replace("{error}", &error)
                )
            };
            let request = GenerationRequest {
                schema_name: T::SCHEMA_NAME.to_string(),
                system,
                user: user.to_string(),
                schema: schema.clone(),
                attempt,
            };

            let result = self
                .breaker
                .call(
                    self.timeout,
                    self.generator.generate(&request),
                    GenerationError::is_dependency_failure,
                )
                .await;

            let value = match result {
                Ok(value) => value,
                Err(BreakerError::Inner(e)) if !e.is_dependency_failure() => {
                    warn!(schema = T::SCHEMA_NAME, attempt, error = %e, "LLM output rejected");
                    error = e.to_string();
                    continue;
                }
                Err(e) => {
                    warn!(schema = T::SCHEMA_NAME, error = %e, "LLM unavailable");
                    return LlmOutcome::Unavailable(e.to_string());
                }
            };

            match serde_json::from_value::<T>(value) {
                Ok(parsed) => match validate(&parsed) {
                    Ok(()) => {
                        debug!(schema = T::SCHEMA_NAME, attempt, "LLM output accepted");
                        return LlmOutcome::Valid(parsed);
                    }
                    Err(reason) => {
                        warn!(
                            schema = T::SCHEMA_NAME,
                            attempt,
                            reason = %reason,
                            "LLM output failed validation"
                        );
                        error = reason;
                    }
                },
                Err(e) => {
                    warn!(
                        schema = T::SCHEMA_NAME,
                        attempt,
                        error = %e,
                        "LLM output failed schema"
                    );
                    error = e.to_string();
                }
            }
        }

        LlmOutcome::Invalid { error }
    }
}
