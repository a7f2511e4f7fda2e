//! Media generation backed by an HTTP service.
//!
//! Posts the prompt, media kind, brand kit, and any critique feedback; the
//! backend streams back raw media bytes, which are persisted through the
//! media store. Only the resulting reference crosses back to the engine.

use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use serde::Serialize;

use crate::model::{MediaKind, stage};
use crate::storage::MediaStore;

use super::{
    StageAdapter, StageOutcome, StageOutput, WorkflowContext, media_extension, require_success,
};

#[derive(Serialize)]
struct GenerationRequest<'a> {
    prompt: &'a str,
    media_kind: MediaKind,
    brand_kit: &'a serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    feedback: Option<&'a str>,
    attempt: u32,
}

pub struct HttpGenerationAdapter {
    client: reqwest::Client,
    endpoint: String,
    media: Arc<MediaStore>,
}

impl HttpGenerationAdapter {
    pub fn new(client: reqwest::Client, endpoint: String, media: Arc<MediaStore>) -> Self {
        Self {
            client,
            endpoint,
            media,
        }
    }

    async fn call(&self, ctx: &WorkflowContext) -> Result<StageOutput> {
        let request = GenerationRequest {
            prompt: &ctx.prompt,
            media_kind: ctx.media_kind,
            brand_kit: &ctx.brand_kit,
            feedback: ctx.feedback.as_deref(),
            attempt: ctx.attempt,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .context("Generation backend unreachable")?;
        let resp = require_success(resp, "Generation backend").await?;

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = resp
            .bytes()
            .await
            .context("Failed to read generated media")?;
        ensure!(!bytes.is_empty(), "Generation backend returned empty media");

        let extension = media_extension(content_type.as_deref(), ctx.media_kind);
        let reference = self
            .media
            .save_artifact(&bytes, &ctx.run_id.to_string(), ctx.attempt, extension)
            .context("Failed to persist generated media")?;

        Ok(StageOutput {
            payload: serde_json::json!({
                "artifact": reference,
                "content_type": content_type,
                "size_bytes": bytes.len(),
                "attempt": ctx.attempt,
            }),
            artifacts: vec![reference],
        })
    }
}

#[async_trait]
impl StageAdapter for HttpGenerationAdapter {
    fn name(&self) -> &'static str {
        stage::GENERATION
    }

    async fn execute(&self, ctx: &WorkflowContext) -> StageOutcome {
        StageOutcome::from_result(self.call(ctx).await)
    }
}
