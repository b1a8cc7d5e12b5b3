//! AI enrichment for enforcement records: drafted recommendations and
//! one-sentence executive summaries.
//!
//! Every call resolves to an [`Enrichment`]. Provider failures never surface
//! as `Err`; they become [`Enrichment::Unavailable`] with a reason and a
//! message fit to show an officer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

mod config;
mod gemini;
mod pending;

pub use config::{
    AiConfig, DEFAULT_ENDPOINT, DEFAULT_RECOMMENDATION_MODEL, DEFAULT_SUMMARY_MODEL,
    DEFAULT_TIMEOUT_MS,
};
pub use gemini::{parse_generate_response, GeminiClient};
pub use pending::{PendingEnrichments, PendingGuard};

pub const MISSING_KEY_RECOMMENDATIONS: &str =
    "AI Recommendations unavailable: API Key selection required.";
pub const MISSING_KEY_SUMMARY: &str = "Summary error: Configuration missing.";
pub const SERVICE_DISCONNECTED: &str =
    "AI Service disconnected. Please re-enable AI tools in the sidebar.";
pub const NETWORK_FAILURE: &str = "Network Error: Please check your internet connection.";
pub const SUMMARY_FAILED: &str = "Summary generation failed.";
const RECOMMENDATIONS_FAILED_PREFIX: &str = "The AI assistant is temporarily unavailable. Error: ";
const EMPTY_RESPONSE_DETAIL: &str = "Empty response from Gemini API";

/// Web citation attached to a grounded answer.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    MissingCredentials,
    ServiceDisconnected,
    Network,
    Service,
    EmptyResponse,
}

impl UnavailableReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::ServiceDisconnected => "service_disconnected",
            Self::Network => "network",
            Self::Service => "service",
            Self::EmptyResponse => "empty_response",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Enrichment {
    Generated {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        sources: Vec<Source>,
    },
    Unavailable {
        reason: UnavailableReason,
        message: String,
    },
}

impl Enrichment {
    /// Text to show the user, whether generated or a failure placeholder.
    #[must_use]
    pub fn display_text(&self) -> &str {
        match self {
            Self::Generated { text, .. } => text,
            Self::Unavailable { message, .. } => message,
        }
    }

    /// Generated text only; `None` for placeholders that must not be stored.
    #[must_use]
    pub fn generated_text(&self) -> Option<&str> {
        match self {
            Self::Generated { text, .. } => Some(text),
            Self::Unavailable { .. } => None,
        }
    }

    #[must_use]
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated { .. })
    }

    #[must_use]
    pub fn sources(&self) -> &[Source] {
        match self {
            Self::Generated { sources, .. } => sources,
            Self::Unavailable { .. } => &[],
        }
    }
}

/// One `generateContent` call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    /// Attach the web search grounding tool.
    pub grounded: bool,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedText {
    pub text: String,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum GenerationError {
    #[error("no API key configured")]
    MissingCredentials,
    #[error("requested entity was not found: {0}")]
    EntityNotFound(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("{0}")]
    Service(String),
}

/// Seam between enrichment semantics and the text-generation provider.
pub trait TextGenerator: Send + Sync {
    /// # Errors
    /// Returns a [`GenerationError`] describing why no text was produced.
    fn generate(&self, request: &GenerationRequest) -> Result<GeneratedText, GenerationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnrichmentKind {
    Recommendations,
    Summary,
}

impl EnrichmentKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Recommendations => "recommendations",
            Self::Summary => "summary",
        }
    }

    fn unavailable(self, error: &GenerationError) -> Enrichment {
        let (reason, message) = match (self, error) {
            (Self::Recommendations, GenerationError::MissingCredentials) => {
                (UnavailableReason::MissingCredentials, MISSING_KEY_RECOMMENDATIONS.to_string())
            }
            (Self::Summary, GenerationError::MissingCredentials) => {
                (UnavailableReason::MissingCredentials, MISSING_KEY_SUMMARY.to_string())
            }
            (Self::Recommendations, GenerationError::EntityNotFound(_)) => {
                (UnavailableReason::ServiceDisconnected, SERVICE_DISCONNECTED.to_string())
            }
            (Self::Recommendations, GenerationError::Network(_)) => {
                (UnavailableReason::Network, NETWORK_FAILURE.to_string())
            }
            (Self::Recommendations, GenerationError::Service(detail)) => (
                UnavailableReason::Service,
                format!("{RECOMMENDATIONS_FAILED_PREFIX}{detail}"),
            ),
            (Self::Summary, GenerationError::EntityNotFound(_)) => {
                (UnavailableReason::ServiceDisconnected, SUMMARY_FAILED.to_string())
            }
            (Self::Summary, GenerationError::Network(_)) => {
                (UnavailableReason::Network, SUMMARY_FAILED.to_string())
            }
            (Self::Summary, GenerationError::Service(_)) => {
                (UnavailableReason::Service, SUMMARY_FAILED.to_string())
            }
        };
        Enrichment::Unavailable { reason, message }
    }

    fn empty(self) -> Enrichment {
        let message = match self {
            Self::Recommendations => {
                format!("{RECOMMENDATIONS_FAILED_PREFIX}{EMPTY_RESPONSE_DETAIL}")
            }
            Self::Summary => SUMMARY_FAILED.to_string(),
        };
        Enrichment::Unavailable { reason: UnavailableReason::EmptyResponse, message }
    }
}

/// Drafts recommendations and summaries through a [`TextGenerator`].
#[derive(Clone)]
pub struct AiEnrichmentClient {
    generator: Arc<dyn TextGenerator>,
    recommendation_model: String,
    summary_model: String,
}

impl std::fmt::Debug for AiEnrichmentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiEnrichmentClient")
            .field("recommendation_model", &self.recommendation_model)
            .field("summary_model", &self.summary_model)
            .finish_non_exhaustive()
    }
}

impl AiEnrichmentClient {
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        recommendation_model: impl Into<String>,
        summary_model: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            recommendation_model: recommendation_model.into(),
            summary_model: summary_model.into(),
        }
    }

    /// Client backed by the Gemini REST API, configured from `config`.
    #[must_use]
    pub fn from_config(config: &AiConfig) -> Self {
        Self::new(
            Arc::new(GeminiClient::new(config)),
            config.recommendation_model.clone(),
            config.summary_model.clone(),
        )
    }

    /// Three formal recommendations for a new notice, grounded with web search.
    #[must_use]
    pub fn generate_recommendations(
        &self,
        issue: &str,
        sub_county: &str,
        plot_number: &str,
    ) -> Enrichment {
        let request = GenerationRequest {
            model: self.recommendation_model.clone(),
            prompt: recommendations_prompt(issue, sub_county, plot_number),
            grounded: true,
            temperature: Some(0.7),
        };
        self.run(EnrichmentKind::Recommendations, &request)
    }

    /// One executive sentence summarizing a record.
    #[must_use]
    pub fn generate_summary(
        &self,
        issue: &str,
        recommendations: &str,
        location: &str,
    ) -> Enrichment {
        let request = GenerationRequest {
            model: self.summary_model.clone(),
            prompt: summary_prompt(issue, recommendations, location),
            grounded: false,
            temperature: None,
        };
        self.run(EnrichmentKind::Summary, &request)
    }

    fn run(&self, kind: EnrichmentKind, request: &GenerationRequest) -> Enrichment {
        tracing::info!(kind = kind.as_str(), model = %request.model, "ai request started");
        match self.generator.generate(request) {
            Ok(generated) => {
                let text = generated.text.trim();
                if text.is_empty() {
                    tracing::warn!(kind = kind.as_str(), "ai response was empty");
                    return kind.empty();
                }
                let sources = if kind == EnrichmentKind::Recommendations {
                    generated.sources
                } else {
                    Vec::new()
                };
                Enrichment::Generated { text: text.to_string(), sources }
            }
            Err(err) => {
                tracing::warn!(kind = kind.as_str(), error = %err, "ai request failed");
                kind.unavailable(&err)
            }
        }
    }
}

fn recommendations_prompt(issue: &str, sub_county: &str, plot_number: &str) -> String {
    format!(
        "Act as a senior Enforcement Officer for the Nairobi City County Government.\n\n\
         Context:\n\
         A new enforcement notice is being drafted for Plot Number: {plot_number} in {sub_county}, Nairobi.\n\
         The reported issue of concern is: \"{issue}\".\n\n\
         Task:\n\
         Use Google Search to find relevant Nairobi City County (NCC) urban planning laws or \
         environmental regulations (e.g., Physical Planning Act, County Nuisance Laws).\n\n\
         Generate 3 concise, formal, and legally sound recommendations for the enforcement team.\n\
         Return ONLY the list of recommendations as bullet points."
    )
}

fn summary_prompt(issue: &str, recommendations: &str, location: &str) -> String {
    format!(
        "Act as an Executive Assistant to the Nairobi City County Governor.\n\
         Summarize the following enforcement record into a single, professional executive sentence.\n\n\
         Details:\n\
         Location: {location}\n\
         Issue: {issue}\n\
         Recommendations: {recommendations}\n\n\
         Format:\n\
         [Action Required] at [Location] due to [Issue]."
    )
}
