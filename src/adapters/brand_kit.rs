//! Brand-kit extraction backed by an HTTP service.
//!
//! Sends the brand website URL and any uploaded logo/product assets as a
//! multipart request; the backend answers with a structured brand kit
//! (colors, fonts, tone) that stays opaque to the engine.

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

pub struct HttpBrandKitAdapter {
    client: reqwest::Client,
    endpoint: String,
    media: Arc<MediaStore>,
}

impl HttpBrandKitAdapter {
    pub fn new(client: reqwest::Client, endpoint: String, media: Arc<MediaStore>) -> Self {
        Self {
            client,
            endpoint,
            media,
        }
    }

    async fn call(&self, ctx: &WorkflowContext) -> Result<StageOutput> {
        let mut form = Form::new();
        if let Some(url) = &ctx.brand_website_url {
            form = form.text("website_url", url.clone());
        }
        if let Some(reference) = &ctx.logo_ref {
            let bytes = self
                .media
                .read(reference)
                .context("Failed to read uploaded logo")?;
            form = form.part(
                "logo",
                Part::bytes(bytes).file_name(reference_file_name(reference)),
            );
        }
        if let Some(reference) = &ctx.product_ref {
            let bytes = self
                .media
                .read(reference)
                .context("Failed to read uploaded product image")?;
            form = form.part(
                "product",
                Part::bytes(bytes).file_name(reference_file_name(reference)),
            );
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .context("Brand kit backend unreachable")?;
        let resp = require_success(resp, "Brand kit backend").await?;
        let kit: serde_json::Value = resp
            .json()
            .await
            .context("Brand kit backend returned invalid JSON")?;

        Ok(StageOutput {
            payload: kit,
            artifacts: Vec::new(),
        })
    }
}

#[async_trait]
impl StageAdapter for HttpBrandKitAdapter {
    fn name(&self) -> &'static str {
        stage::BRAND_KIT
    }

    async fn execute(&self, ctx: &WorkflowContext) -> StageOutcome {
        StageOutcome::from_result(self.call(ctx).await)
    }
}
