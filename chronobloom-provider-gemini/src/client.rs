//! Gemini API client struct and builder.

use std::future::Future;
use std::time::Duration;

use chronobloom_types::{InvocationError, PredictionRequest, PredictionService};

use crate::error::{map_http_status, map_reqwest_error};
use crate::types::{GenerateRequest, GenerateResponse};

/// Default model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Default Generative Language API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the Gemini `generateContent` endpoint.
///
/// Implements [`PredictionService`]: one request per call, raw text back,
/// no retries.
///
/// # Example
///
/// ```no_run
/// use chronobloom_provider_gemini::Gemini;
///
/// let client = Gemini::new("api-key")
///     .with_model("gemini-1.5-pro-latest")
///     .timeout(std::time::Duration::from_secs(30));
/// ```
pub struct Gemini {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
    pub(crate) temperature: Option<f32>,
    pub(crate) client: reqwest::Client,
}

impl Gemini {
    /// Create a new client for `api_key`.
    ///
    /// Default model: `gemini-1.5-flash-latest`. Default timeout: 60s.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout: DEFAULT_TIMEOUT,
            temperature: None,
            client: reqwest::Client::new(),
        }
    }

    /// Override the model. A leading `models/` is accepted and stripped.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.model = model
            .strip_prefix("models/")
            .map(str::to_string)
            .unwrap_or(model);
        self
    }

    /// Override the API base URL.
    ///
    /// Useful for testing with a local mock server.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the sampling temperature. Left to the service default otherwise.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Build the `generateContent` URL (without the key).
    pub(crate) fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl PredictionService for Gemini {
    fn model(&self) -> &str {
        &self.model
    }

    /// Send the rendered prompt and return the first candidate's text.
    fn invoke(
        &self,
        request: &PredictionRequest,
    ) -> impl Future<Output = Result<String, InvocationError>> + Send {
        let url = self.generate_url();
        let api_key = self.api_key.clone();
        let timeout = self.timeout;
        let body = GenerateRequest::from_prompt(&request.prompt, self.temperature);
        let http_client = self.client.clone();
        let observations = request.observations.len();

        async move {
            tracing::debug!(url = %url, observations, "sending prediction request to Gemini");

            let response = http_client
                .post(&url)
                .query(&[("key", api_key.as_str())])
                .timeout(timeout)
                .json(&body)
                .send()
                .await
                .map_err(|e| map_reqwest_error(e, timeout))?;

            let status = response.status();
            let response_text = response
                .text()
                .await
                .map_err(|e| map_reqwest_error(e, timeout))?;

            if !status.is_success() {
                return Err(map_http_status(status, &response_text));
            }

            let parsed: GenerateResponse = serde_json::from_str(&response_text).map_err(|e| {
                InvocationError::Service {
                    status: status.as_u16(),
                    body: format!("invalid JSON response: {e}"),
                }
            })?;

            if let Some(text) = parsed.first_text() {
                return Ok(text);
            }
            if let Some(reason) = parsed.block_reason() {
                return Err(InvocationError::Blocked(reason.to_string()));
            }
            if let Some(reason) = parsed
                .candidates
                .first()
                .and_then(|c| c.finish_reason.as_deref())
                .filter(|r| *r == "SAFETY")
            {
                return Err(InvocationError::Blocked(reason.to_string()));
            }
            Err(InvocationError::EmptyResponse)
        }
    }
}
