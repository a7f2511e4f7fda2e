//! Stage adapter contract and the HTTP-backed adapters for each external
//! capability.
//!
//! Every capability the pipeline consumes (brand-kit extraction, media
//! generation, critique, refinement) is invoked through the same shape: the
//! accumulated workflow context goes in, and either a success payload plus
//! artifact references or a failure message comes out. Adapters catch their
//! own faults at the boundary — `execute` never panics and never returns a
//! Rust error, so the engine's control flow stays exception-free.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::model::MediaKind;
use crate::storage::MediaStore;

pub mod brand_kit;
pub mod critique;
pub mod generation;
pub mod refinement;

pub use brand_kit::HttpBrandKitAdapter;
pub use critique::HttpCritiqueAdapter;
pub use generation::HttpGenerationAdapter;
pub use refinement::HttpRefinementAdapter;

/// Accumulated context handed to every stage. The engine owns this and
/// updates it between transitions; adapters only read it.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub run_id: Uuid,
    pub prompt: String,
    pub media_kind: MediaKind,
    pub brand_website_url: Option<String>,
    pub logo_ref: Option<String>,
    pub product_ref: Option<String>,
    /// Extracted brand kit, or an empty object when extraction was skipped.
    pub brand_kit: serde_json::Value,
    /// References to artifacts produced so far, newest last.
    pub artifacts: Vec<String>,
    /// Critique feedback carried into a regenerate/enhance attempt.
    pub feedback: Option<String>,
    /// Zero on the first pass; equals the run's retry count on loop-backs.
    pub attempt: u32,
}

impl WorkflowContext {
    pub fn latest_artifact(&self) -> Option<&str> {
        self.artifacts.last().map(|s| s.as_str())
    }
}

/// Success payload of a stage: a structured result plus any artifact
/// references the stage produced as a side channel.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub payload: serde_json::Value,
    pub artifacts: Vec<String>,
}

/// Result of a stage invocation. Failures carry a diagnostic message only;
/// the engine treats any failure as run-fatal.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    Success(StageOutput),
    Failure(String),
}

impl StageOutcome {
    /// Collapse an internal `Result` into the exception-free outcome shape.
    pub fn from_result(result: Result<StageOutput>) -> Self {
        match result {
            Ok(output) => Self::Success(output),
            Err(err) => Self::Failure(format!("{:#}", err)),
        }
    }
}

/// Uniform call contract wrapping one external capability.
#[async_trait]
pub trait StageAdapter: Send + Sync {
    /// Canonical stage name, used for stage records and logging.
    fn name(&self) -> &'static str;

    /// Invoke the capability. Must not panic; any internal fault is
    /// converted into `StageOutcome::Failure`.
    async fn execute(&self, ctx: &WorkflowContext) -> StageOutcome;
}

/// The four adapters the engine drives, in pipeline order.
pub struct AdapterSet {
    pub brand_kit: Arc<dyn StageAdapter>,
    pub generation: Arc<dyn StageAdapter>,
    pub critique: Arc<dyn StageAdapter>,
    pub refinement: Arc<dyn StageAdapter>,
}

impl AdapterSet {
    /// Wire the HTTP-backed adapters against the configured backends. All
    /// four share one client so the per-stage deadline is set in one place.
    pub fn http(config: &AppConfig, media: Arc<MediaStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.pipeline.stage_timeout_secs))
            .build()
            .context("Failed to build backend HTTP client")?;

        Ok(Self {
            brand_kit: Arc::new(HttpBrandKitAdapter::new(
                client.clone(),
                config.backends.brand_kit_url.clone(),
                Arc::clone(&media),
            )),
            generation: Arc::new(HttpGenerationAdapter::new(
                client.clone(),
                config.backends.generation_url.clone(),
                Arc::clone(&media),
            )),
            critique: Arc::new(HttpCritiqueAdapter::new(
                client.clone(),
                config.backends.critique_url.clone(),
                Arc::clone(&media),
            )),
            refinement: Arc::new(HttpRefinementAdapter::new(
                client,
                config.backends.refinement_url.clone(),
                media,
            )),
        })
    }
}

/// Map a backend response content type to an artifact file extension,
/// falling back to a sensible default for the media kind.
pub(crate) fn media_extension(content_type: Option<&str>, kind: MediaKind) -> &'static str {
    match content_type.map(|c| c.split(';').next().unwrap_or("").trim()) {
        Some("image/png") => "png",
        Some("image/jpeg") => "jpg",
        Some("image/webp") => "webp",
        Some("image/gif") => "gif",
        Some("video/mp4") => "mp4",
        Some("video/webm") => "webm",
        _ => match kind {
            MediaKind::Image => "png",
            MediaKind::Video => "mp4",
        },
    }
}

/// Last path segment of a storage reference, for multipart file names.
pub(crate) fn reference_file_name(reference: &str) -> String {
    reference
        .rsplit('/')
        .next()
        .unwrap_or(reference)
        .to_string()
}

/// Fail early on non-2xx backend responses, keeping the body as diagnostics.
pub(crate) async fn require_success(
    resp: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let body = body.chars().take(300).collect::<String>();
    anyhow::bail!("{} returned {}: {}", what, status, body)
}
