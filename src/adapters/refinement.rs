//! Targeted refinement backed by an HTTP service.
//!
//! Unlike full regeneration, refinement operates on the existing artifact:
//! the bytes and the critique feedback go up, refined bytes come back and
//! are persisted as a new artifact variation.

use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::model::stage;
use crate::storage::MediaStore;

use super::{
    StageAdapter, StageOutcome, StageOutput, WorkflowContext, media_extension,
    reference_file_name, require_success,
};

pub struct HttpRefinementAdapter {
    client: reqwest::Client,
    endpoint: String,
    media: Arc<MediaStore>,
}

impl HttpRefinementAdapter {
    pub fn new(client: reqwest::Client, endpoint: String, media: Arc<MediaStore>) -> Self {
        Self {
            client,
            endpoint,
            media,
        }
    }

    async fn call(&self, ctx: &WorkflowContext) -> Result<StageOutput> {
        let artifact = ctx
            .latest_artifact()
            .context("No artifact available to refine")?;
        let bytes = self
            .media
            .read(artifact)
            .context("Failed to read artifact for refinement")?;

        let mut form = Form::new().part(
            "artifact",
            Part::bytes(bytes).file_name(reference_file_name(artifact)),
        );
        if let Some(feedback) = &ctx.feedback {
            form = form.text("feedback", feedback.clone());
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .context("Refinement backend unreachable")?;
        let resp = require_success(resp, "Refinement backend").await?;

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let refined = resp
            .bytes()
            .await
            .context("Failed to read refined media")?;
        ensure!(!refined.is_empty(), "Refinement backend returned empty media");

        let extension = media_extension(content_type.as_deref(), ctx.media_kind);
        let reference = self
            .media
            .save_artifact(&refined, &ctx.run_id.to_string(), ctx.attempt, extension)
            .context("Failed to persist refined media")?;

        Ok(StageOutput {
            payload: serde_json::json!({
                "artifact": reference,
                "refined_from": artifact,
                "size_bytes": refined.len(),
                "attempt": ctx.attempt,
            }),
            artifacts: vec![reference],
        })
    }
}

#[async_trait]
impl StageAdapter for HttpRefinementAdapter {
    fn name(&self) -> &'static str {
        stage::REFINEMENT
    }

    async fn execute(&self, ctx: &WorkflowContext) -> StageOutcome {
        StageOutcome::from_result(self.call(ctx).await)
    }
}
