//! Client for the external evaluation service.
//!
//! The service scores a document against the rhetoric/logic criteria and
//! returns one [`EvaluationResult`] per finding. This crate only moves data:
//! it builds the request from a [`DocumentTree`], performs the HTTP call, and
//! decodes every response shape the service has produced over time.
//! No retries happen here; callers decide what to do with a failure.

mod decode;
mod text_format;

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use storycheck_shared::{DocumentTree, EvaluationResult, EvaluatorConfig, Result, StoryCheckError};
use tracing::{debug, info, instrument, warn};

pub use decode::{DEFAULT_PRIORITY, decode_evaluation_list, decode_response, weighted_score};
pub use text_format::parse_evaluation_text;

/// User-Agent string for service requests.
const USER_AGENT: &str = concat!("StoryCheck/", env!("CARGO_PKG_VERSION"));

/// Collaborator name used in `Unavailable` errors.
const SERVICE: &str = "evaluation service";

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// Body of the review request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub title: String,
    pub full_text: String,
    pub summary: String,
    pub paragraphs: Vec<String>,
}

impl EvaluationRequest {
    /// Build the request from a structure tree. Placeholder nodes are left out.
    pub fn from_tree(tree: &DocumentTree) -> Self {
        let nodes = tree.sourced_nodes();
        let full_text = nodes
            .iter()
            .map(|n| n.text)
            .collect::<Vec<_>>()
            .join("\n");
        let paragraphs = nodes
            .iter()
            .filter(|n| n.source_paragraph_index != tree.title_paragraph_index)
            .map(|n| n.text.to_string())
            .collect();

        Self {
            title: tree.title.clone(),
            full_text,
            summary: tree.summary_texts().join("\n"),
            paragraphs,
        }
    }
}

/// Decoded review response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResponse {
    /// Overall score as reported by the service.
    pub total_score: f64,
    pub evaluations: Vec<EvaluationResult>,
}

// ---------------------------------------------------------------------------
// EvaluationSource
// ---------------------------------------------------------------------------

/// Anything that can produce evaluations for a document.
pub trait EvaluationSource: Send + Sync {
    /// Evaluate the document described by `request`.
    fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> impl Future<Output = Result<EvaluationResponse>> + Send;

    /// Liveness probe.
    fn health(&self) -> impl Future<Output = bool> + Send;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Evaluation service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEvaluator {
    client: Client,
    config: EvaluatorConfig,
}

impl HttpEvaluator {
    pub fn new(config: EvaluatorConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoryCheckError::unavailable(SERVICE, format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

impl EvaluationSource for HttpEvaluator {
    #[instrument(skip_all, fields(title = %request.title, paragraphs = request.paragraphs.len()))]
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationResponse> {
        let url = self.config.endpoint(&self.config.review_path)?;
        info!(%url, "requesting evaluation");

        let response = self
            .authorize(self.client.post(url.clone()).json(request))
            .send()
            .await
            .map_err(|e| StoryCheckError::unavailable(SERVICE, format!("{url}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoryCheckError::unavailable(SERVICE, format!("{url}: failed to read body: {e}")))?;

        if !status.is_success() {
            // The backend reports failures as `{ error }` or `{ detail }`.
            return match decode_response(&body) {
                Err(StoryCheckError::Service(message)) => Err(StoryCheckError::Service(message)),
                _ => Err(StoryCheckError::unavailable(SERVICE, format!("{url}: HTTP {status}"))),
            };
        }

        let decoded = decode_response(&body)?;
        debug!(
            evaluations = decoded.evaluations.len(),
            total_score = decoded.total_score,
            "evaluation response decoded"
        );
        Ok(decoded)
    }

    async fn health(&self) -> bool {
        let url = match self.config.endpoint(&self.config.health_path) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "invalid health endpoint");
                return false;
            }
        };

        let response = match self.authorize(self.client.get(url.clone())).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(%url, error = %e, "health check failed");
                return false;
            }
        };

        if !response.status().is_success() {
            debug!(%url, status = %response.status(), "health check returned non-success");
            return false;
        }

        #[derive(Deserialize)]
        struct HealthBody {
            status: Option<String>,
        }

        // A body is optional; when present its status must say healthy.
        match response.json::<HealthBody>().await {
            Ok(HealthBody { status: Some(status) }) => status == "healthy",
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// File-backed source
// ---------------------------------------------------------------------------

/// Replays a saved service response from disk.
#[derive(Debug, Clone)]
pub struct FileEvaluator {
    path: PathBuf,
}

impl FileEvaluator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EvaluationSource for FileEvaluator {
    async fn evaluate(&self, _request: &EvaluationRequest) -> Result<EvaluationResponse> {
        let body = std::fs::read_to_string(&self.path)
            .map_err(|e| StoryCheckError::io(&self.path, e))?;
        // A bare list of evaluations is accepted alongside full responses.
        if body.trim_start().starts_with('[') {
            let evaluations = decode_evaluation_list(&body)?;
            return Ok(EvaluationResponse {
                total_score: weighted_score(&evaluations),
                evaluations,
            });
        }
        decode_response(&body)
    }

    async fn health(&self) -> bool {
        self.path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storycheck_shared::{AppConfig, BodyNode, StoryNode, SummaryNode};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn evaluator_for(server_uri: &str) -> HttpEvaluator {
        let mut app = AppConfig::default();
        app.evaluator.api_key_env = "SC_TEST_NONEXISTENT_KEY_67890".into();
        let config = EvaluatorConfig::resolve(&app, Some(server_uri)).expect("config");
        HttpEvaluator::new(config).expect("client")
    }

    fn request() -> EvaluationRequest {
        EvaluationRequest {
            title: "Quarterly business review".into(),
            full_text: "Quarterly business review\nRevenue grew".into(),
            summary: "Revenue grew".into(),
            paragraphs: vec!["Revenue grew".into()],
        }
    }

    #[test]
    fn request_from_tree_skips_placeholders_and_title() {
        let tree = DocumentTree {
            title: "Title".into(),
            title_paragraph_index: Some(0),
            summaries: vec![
                SummaryNode {
                    text: "Summary".into(),
                    source_paragraph_index: Some(1),
                    stories: vec![StoryNode {
                        text: "Story".into(),
                        source_paragraph_index: Some(2),
                        bodies: vec![BodyNode::placeholder()],
                    }],
                },
                SummaryNode {
                    text: "Second".into(),
                    source_paragraph_index: Some(3),
                    stories: vec![StoryNode::placeholder()],
                },
            ],
        };

        let request = EvaluationRequest::from_tree(&tree);
        assert_eq!(request.title, "Title");
        assert_eq!(request.full_text, "Title\nSummary\nStory\nSecond");
        assert_eq!(request.summary, "Summary\nSecond");
        assert_eq!(request.paragraphs, vec!["Summary", "Story", "Second"]);
    }

    #[tokio::test]
    async fn evaluate_against_mock_server() {
        let server = MockServer::start().await;
        let body = std::fs::read_to_string("../../../fixtures/json/review-response.json")
            .expect("read fixture");

        Mock::given(method("POST"))
            .and(path("/api/review"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let response = evaluator_for(&server.uri())
            .evaluate(&request())
            .await
            .expect("evaluate");
        assert_eq!(response.total_score, 0.68);
        assert_eq!(response.evaluations.len(), 4);
    }

    #[tokio::test]
    async fn error_payload_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/review"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_string(r#"{"detail": "文書本文とタイトルは必須です"}"#),
            )
            .mount(&server)
            .await;

        let err = evaluator_for(&server.uri())
            .evaluate(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, StoryCheckError::Service(ref m) if m.contains("タイトル")));
    }

    #[tokio::test]
    async fn bare_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/review"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = evaluator_for(&server.uri())
            .evaluate(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, StoryCheckError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn undecodable_success_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/review"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"total_score": 0.5}"#))
            .mount(&server)
            .await;

        let err = evaluator_for(&server.uri())
            .evaluate(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, StoryCheckError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let evaluator = evaluator_for(&uri);
        let err = evaluator.evaluate(&request()).await.unwrap_err();
        assert!(matches!(err, StoryCheckError::Unavailable { .. }));
        assert!(!evaluator.health().await);
    }

    #[tokio::test]
    async fn health_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status": "healthy"}"#))
            .mount(&server)
            .await;
        assert!(evaluator_for(&server.uri()).health().await);

        let degraded = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&degraded)
            .await;
        assert!(!evaluator_for(&degraded.uri()).health().await);
    }

    #[tokio::test]
    async fn file_evaluator_reads_saved_response() {
        let source = FileEvaluator::new("../../../fixtures/json/review-response.json");
        assert!(source.health().await);
        let response = source.evaluate(&request()).await.expect("evaluate");
        assert_eq!(response.evaluations.len(), 4);

        let missing = FileEvaluator::new("../../../fixtures/json/does-not-exist.json");
        assert!(!missing.health().await);
        assert!(matches!(
            missing.evaluate(&request()).await.unwrap_err(),
            StoryCheckError::Io { .. }
        ));
    }
}
