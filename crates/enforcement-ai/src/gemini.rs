use std::time::Duration;

use serde_json::{json, Value};

use crate::config::AiConfig;
use crate::{GeneratedText, GenerationError, GenerationRequest, Source, TextGenerator};

const USER_AGENT: &str = concat!("ncenf/", env!("CARGO_PKG_VERSION"));
const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

/// Gemini `generateContent` over HTTPS.
pub struct GeminiClient {
    agent: ureq::Agent,
    endpoint: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    #[must_use]
    pub fn new(config: &AiConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms.max(100));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self { agent, endpoint: config.endpoint.clone(), api_key: config.api_key.clone() }
    }

    fn url(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.endpoint)
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, request: &GenerationRequest) -> Result<GeneratedText, GenerationError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(GenerationError::MissingCredentials);
        };

        let response = self
            .agent
            .post(&self.url(&request.model))
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .set("x-goog-api-key", api_key)
            .send_json(request_body(request))
            .map_err(error_from_ureq)?;

        let body: Value = serde_json::from_reader(response.into_reader())
            .map_err(|err| GenerationError::Service(format!("malformed response: {err}")))?;
        parse_generate_response(&body)
    }
}

fn request_body(request: &GenerationRequest) -> Value {
    let mut body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
    });
    if request.grounded {
        body["tools"] = json!([{ "google_search": {} }]);
    }
    if let Some(temperature) = request.temperature {
        body["generationConfig"] = json!({ "temperature": temperature });
    }
    body
}

fn error_from_ureq(err: ureq::Error) -> GenerationError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| {
                    value.pointer("/error/message").and_then(Value::as_str).map(str::to_string)
                })
                .unwrap_or(body);
            classify_status(code, message)
        }
        ureq::Error::Transport(transport) => GenerationError::Network(transport.to_string()),
    }
}

fn classify_status(code: u16, message: String) -> GenerationError {
    if code == 404 || message.contains(ENTITY_NOT_FOUND) {
        GenerationError::EntityNotFound(message)
    } else {
        GenerationError::Service(format!("HTTP {code}: {message}"))
    }
}

/// Extract text and web citations from a `generateContent` response body.
///
/// # Errors
/// Returns [`GenerationError`] when the body carries an error object or the
/// prompt was blocked.
pub fn parse_generate_response(body: &Value) -> Result<GeneratedText, GenerationError> {
    if let Some(error) = body.get("error") {
        let code =
            error.get("code").and_then(Value::as_u64).and_then(|code| u16::try_from(code).ok());
        let message =
            error.get("message").and_then(Value::as_str).unwrap_or("unknown error").to_string();
        return Err(classify_status(code.unwrap_or(500), message));
    }
    if let Some(reason) = body.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
        return Err(GenerationError::Service(format!("prompt blocked: {reason}")));
    }

    let Some(candidate) = body.pointer("/candidates/0") else {
        return Ok(GeneratedText::default());
    };

    let text = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();

    let sources = candidate
        .pointer("/groundingMetadata/groundingChunks")
        .and_then(Value::as_array)
        .map(|chunks| {
            chunks
                .iter()
                .filter_map(|chunk| chunk.get("web"))
                .filter_map(|web| {
                    let uri = web.get("uri").and_then(Value::as_str)?;
                    let title = web.get("title").and_then(Value::as_str).unwrap_or(uri);
                    Some(Source { uri: uri.to_string(), title: title.to_string() })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(GeneratedText { text, sources })
}
