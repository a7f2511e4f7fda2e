//! Automated critique backed by an HTTP service.
//!
//! Uploads the latest artifact's bytes together with the brand kit; the
//! backend answers with `{score, strategy, feedback}`. The report is also
//! written to the media store so a reviewer can pull it later.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::model::stage;
use crate::storage::MediaStore;

use super::{
    StageAdapter, StageOutcome, StageOutput, WorkflowContext, reference_file_name,
    require_success,
};

pub struct HttpCritiqueAdapter {
    client: reqwest::Client,
    endpoint: String,
    media: Arc<MediaStore>,
}

impl HttpCritiqueAdapter {
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
            .context("No artifact available to critique")?;
        let bytes = self
            .media
            .read(artifact)
            .context("Failed to read artifact for critique")?;

        let form = Form::new()
            .part(
                "artifact",
                Part::bytes(bytes).file_name(reference_file_name(artifact)),
            )
            .text("media_kind", ctx.media_kind.to_string())
            .text("brand_kit", ctx.brand_kit.to_string());

        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .context("Critique backend unreachable")?;
        let resp = require_success(resp, "Critique backend").await?;
        let mut report: serde_json::Value = resp
            .json()
            .await
            .context("Critique backend returned invalid JSON")?;

        // Keep a copy of the report on disk alongside the run's artifacts.
        match self
            .media
            .save_report(&report.to_string(), &ctx.run_id.to_string(), "critique")
        {
            Ok(reference) => {
                if let Some(obj) = report.as_object_mut() {
                    obj.insert("report_ref".to_string(), serde_json::json!(reference));
                }
            }
            Err(err) => {
                tracing::warn!(run_id = %ctx.run_id, error = %err, "failed to save critique report");
            }
        }

        Ok(StageOutput {
            payload: report,
            artifacts: Vec::new(),
        })
    }
}

#[async_trait]
impl StageAdapter for HttpCritiqueAdapter {
    fn name(&self) -> &'static str {
        stage::CRITIQUE
    }

    async fn execute(&self, ctx: &WorkflowContext) -> StageOutcome {
        StageOutcome::from_result(self.call(ctx).await)
    }
}
