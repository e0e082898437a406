//! Structured-generation capability used by the Claim Extractor and the
//! Adjudicator.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::GenerationResult;

/// One structured-generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Stable name of the output schema (also used to route mock replies).
    pub schema_name: String,
    pub system: String,
    pub user: String,
    /// Strict JSON schema the reply must satisfy.
    pub schema: Value,
    /// 0 for the first try, 1 for the stricter re-prompt.
    pub attempt: u32,
}

/// `generate(prompt, output_schema) -> object`.
///
/// Implementations return whatever JSON object the provider produced; callers
/// deserialize and validate it and may re-prompt once on failure.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    /// Name used in logs and for the circuit breaker.
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult<Value>;
}

/// A type the LLM can be asked to produce.
///
/// Its JSON schema is sent with the request in strict mode (see
/// [`crate::ai::schema::strict_schema`]).
pub trait StructuredOutput: JsonSchema + DeserializeOwned + Send {
    /// Schema name sent to the provider.
    const SCHEMA_NAME: &'static str;
}
