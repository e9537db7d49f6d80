//! Application configuration for StoryCheck.
//!
//! User config lives at `~/.storycheck/storycheck.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, StoryCheckError};
use crate::types::DEFAULT_NO_ISSUE_MARKER;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "storycheck.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".storycheck";

// ---------------------------------------------------------------------------
// Config structs (matching storycheck.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Evaluation service connection.
    #[serde(default)]
    pub evaluator: EvaluatorSection,

    /// Indentation thresholds for the structure classifier.
    #[serde(default)]
    pub classifier: ClassifierSection,

    /// Excerpt matching.
    #[serde(default)]
    pub routing: RoutingSection,

    /// Annotation rendering.
    #[serde(default)]
    pub annotations: AnnotationsSection,
}

/// `[evaluator]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorSection {
    /// Base URL of the evaluation backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the review endpoint.
    #[serde(default = "default_review_path")]
    pub review_path: String,

    /// Path of the liveness probe.
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Name of the env var holding an optional bearer token (never store the token itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for EvaluatorSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            review_path: default_review_path(),
            health_path: default_health_path(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8001".into()
}
fn default_review_path() -> String {
    "/api/review".into()
}
fn default_health_path() -> String {
    "/api/health".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_api_key_env() -> String {
    "STORYCHECK_API_KEY".into()
}

/// `[classifier]` section. All values are in points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSection {
    /// First-line indent must be at or below this for the hanging-indent convention.
    #[serde(default = "default_hanging_indent_max")]
    pub hanging_indent_max_pt: f64,
    /// Half-width of each left-indent band.
    #[serde(default = "default_band_tolerance")]
    pub band_tolerance_pt: f64,
    #[serde(default = "default_summary_band")]
    pub summary_band_pt: f64,
    #[serde(default = "default_story_band")]
    pub story_band_pt: f64,
    #[serde(default = "default_body_band")]
    pub body_band_pt: f64,
    /// Total indent within ±this is a flush summary.
    #[serde(default = "default_flat_tolerance")]
    pub flat_tolerance_pt: f64,
    /// Upper bound (inclusive) of the story bucket.
    #[serde(default = "default_story_max")]
    pub story_max_pt: f64,
    /// Upper bound (inclusive) of the body bucket; deeper indents carry no signal.
    #[serde(default = "default_body_max")]
    pub body_max_pt: f64,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            hanging_indent_max_pt: default_hanging_indent_max(),
            band_tolerance_pt: default_band_tolerance(),
            summary_band_pt: default_summary_band(),
            story_band_pt: default_story_band(),
            body_band_pt: default_body_band(),
            flat_tolerance_pt: default_flat_tolerance(),
            story_max_pt: default_story_max(),
            body_max_pt: default_body_max(),
        }
    }
}

fn default_hanging_indent_max() -> f64 {
    -5.0
}
fn default_band_tolerance() -> f64 {
    4.0
}
fn default_summary_band() -> f64 {
    21.0
}
fn default_story_band() -> f64 {
    42.0
}
fn default_body_band() -> f64 {
    63.0
}
fn default_flat_tolerance() -> f64 {
    1.0
}
fn default_story_max() -> f64 {
    30.0
}
fn default_body_max() -> f64 {
    60.0
}

/// `[routing]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingSection {
    /// Minimum normalized edit-distance similarity for a fuzzy excerpt match.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    0.8
}

/// `[annotations]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationsSection {
    /// Feedback lines meaning "nothing to report".
    #[serde(default = "default_no_issue_markers")]
    pub no_issue_markers: Vec<String>,
    /// Heading of the feedback section.
    #[serde(default = "default_feedback_label")]
    pub feedback_label: String,
    /// Heading of the improvement-suggestion section.
    #[serde(default = "default_improvement_label")]
    pub improvement_label: String,
}

impl Default for AnnotationsSection {
    fn default() -> Self {
        Self {
            no_issue_markers: default_no_issue_markers(),
            feedback_label: default_feedback_label(),
            improvement_label: default_improvement_label(),
        }
    }
}

fn default_no_issue_markers() -> Vec<String> {
    vec![DEFAULT_NO_ISSUE_MARKER.into()]
}
fn default_feedback_label() -> String {
    "フィードバック".into()
}
fn default_improvement_label() -> String {
    "改善提案".into()
}

// ---------------------------------------------------------------------------
// Evaluator config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime evaluation-service configuration.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub base_url: Url,
    pub review_path: String,
    pub health_path: String,
    pub timeout_secs: u64,
    /// Bearer token resolved from the environment, if any.
    pub api_key: Option<String>,
}

impl EvaluatorConfig {
    /// Resolve the `[evaluator]` section, optionally overriding the base URL.
    pub fn resolve(config: &AppConfig, base_url_override: Option<&str>) -> Result<Self> {
        let section = &config.evaluator;
        let raw = base_url_override.unwrap_or(&section.base_url);
        let base_url = Url::parse(raw)
            .map_err(|e| StoryCheckError::config(format!("invalid evaluator base_url '{raw}': {e}")))?;

        let api_key = std::env::var(&section.api_key_env)
            .ok()
            .filter(|v| !v.is_empty());

        Ok(Self {
            base_url,
            review_path: section.review_path.clone(),
            health_path: section.health_path.clone(),
            timeout_secs: section.timeout_secs,
            api_key,
        })
    }

    /// Join an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| StoryCheckError::config(format!("invalid endpoint path '{path}': {e}")))
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.storycheck/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| StoryCheckError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.storycheck/storycheck.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StoryCheckError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        StoryCheckError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| StoryCheckError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| StoryCheckError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| StoryCheckError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("similarity_threshold"));
        assert!(toml_str.contains("問題なし"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.evaluator.timeout_secs, 60);
        assert_eq!(parsed.routing.similarity_threshold, 0.8);
        assert_eq!(parsed.classifier.story_band_pt, 42.0);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[evaluator]
base_url = "https://review.example.com"

[annotations]
no_issue_markers = ["問題なし", "No issues"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.evaluator.base_url, "https://review.example.com");
        assert_eq!(config.evaluator.review_path, "/api/review");
        assert_eq!(config.annotations.no_issue_markers.len(), 2);
        assert_eq!(config.annotations.feedback_label, "フィードバック");
    }

    #[test]
    fn evaluator_config_resolution() {
        let mut app = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        app.evaluator.api_key_env = "SC_TEST_NONEXISTENT_KEY_12345".into();

        let resolved = EvaluatorConfig::resolve(&app, Some("http://localhost:9000")).expect("resolve");
        assert_eq!(resolved.base_url.as_str(), "http://localhost:9000/");
        assert!(resolved.api_key.is_none());
        assert_eq!(
            resolved.endpoint("/api/review").expect("join").as_str(),
            "http://localhost:9000/api/review"
        );

        let err = EvaluatorConfig::resolve(&app, Some("not a url")).unwrap_err();
        assert!(err.to_string().contains("invalid evaluator base_url"));
    }
}
