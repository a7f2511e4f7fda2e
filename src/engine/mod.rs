//! Workflow orchestration engine.
//!
//! Drives one run through `Pending → BrandKit? → Generation → Critique →
//! {approve | reject | regenerate | enhance | end}`, looping under the retry
//! ceiling. Every transition is written to the run store; progress values go
//! through a ratchet so they never regress, including across retry loops.
//!
//! Each run executes on its own spawned worker so submission returns
//! immediately. The worker is supervised: an error or panic inside the
//! pipeline becomes a stored `failed` run, never an unobserved crash and
//! never a run stuck in a non-terminal state.

use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::adapters::{AdapterSet, StageOutcome, WorkflowContext};
use crate::errors::WorkflowError;
use crate::model::{RefinementStrategy, Run, RunStatus, stage};
use crate::policy;
use crate::store::{RunDataPatch, RunStore};

/// Progress checkpoints per stage on the happy path. Retry loops advance
/// past `CRITIQUE_DONE` in `RETRY_STEP` increments, capped below terminal.
const BRAND_KIT_START: f32 = 5.0;
const BRAND_KIT_DONE: f32 = 10.0;
const GENERATION_START: f32 = 20.0;
const GENERATION_DONE: f32 = 40.0;
const CRITIQUE_START: f32 = 55.0;
const CRITIQUE_DONE: f32 = 70.0;
const RETRY_STEP: f32 = 8.0;
const RETRY_CAP: f32 = 95.0;

/// Progress after the critique of attempt `n` completes.
fn critique_checkpoint(attempt: u32) -> f32 {
    (CRITIQUE_DONE + attempt as f32 * RETRY_STEP).min(RETRY_CAP)
}

/// Monotone progress ratchet: a target below the current value is a no-op,
/// so a second generation attempt never resets progress below its first.
#[derive(Debug, Default)]
struct Progress(f32);

impl Progress {
    fn advance(&mut self, target: f32) -> f32 {
        self.0 = self.0.max(target);
        self.0
    }
}

#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<RunStore>,
    adapters: Arc<AdapterSet>,
    max_retries: u32,
}

impl WorkflowEngine {
    pub fn new(store: Arc<RunStore>, adapters: Arc<AdapterSet>, max_retries: u32) -> Self {
        Self {
            store,
            adapters,
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Launch the pipeline for an already-created run on a supervised
    /// background worker and return immediately.
    pub fn spawn(&self, run_id: Uuid) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let worker = tokio::spawn({
                let engine = engine.clone();
                async move { engine.execute(run_id).await }
            });
            match worker.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(run_id = %run_id, error = %err, "workflow failed");
                    let fault = WorkflowError::EngineFault(format!("{:#}", err));
                    if let Err(store_err) = engine.store.fail_run(run_id, &fault.to_string()) {
                        tracing::error!(run_id = %run_id, error = %store_err, "failed to record workflow fault");
                    }
                }
                Err(join_err) => {
                    tracing::error!(run_id = %run_id, error = %join_err, "workflow worker panicked");
                    let fault =
                        WorkflowError::EngineFault(format!("worker panicked: {}", join_err));
                    if let Err(store_err) = engine.store.fail_run(run_id, &fault.to_string()) {
                        tracing::error!(run_id = %run_id, error = %store_err, "failed to record worker panic");
                    }
                }
            }
        })
    }

    /// Run the state machine to a terminal state. A `Ok(())` return means
    /// the run reached `completed` or `failed` and the store reflects it;
    /// an `Err` is an engine-internal fault the supervisor converts into a
    /// stored failure.
    pub async fn execute(&self, run_id: Uuid) -> Result<(), WorkflowError> {
        let run = self.store.get(run_id)?;
        let mut ctx = context_for(&run);
        let mut progress = Progress::default();

        tracing::info!(
            run_id = %run_id,
            media_kind = %ctx.media_kind,
            has_brand_source = ctx.brand_website_url.is_some(),
            "starting workflow"
        );

        // Brand kit extraction runs only when a website reference was
        // supplied; otherwise generation starts with an empty kit.
        if ctx.brand_website_url.is_some() {
            if !self.run_brand_kit(run_id, &mut ctx, &mut progress).await? {
                return Ok(());
            }
        }

        if !self.run_generation(run_id, &mut ctx, &mut progress).await? {
            return Ok(());
        }

        loop {
            let Some(report) = self.run_critique(run_id, &mut ctx, &mut progress).await? else {
                return Ok(());
            };

            let snapshot = self.store.get(run_id)?;
            let strategy = report["strategy"]
                .as_str()
                .and_then(|s| s.parse::<RefinementStrategy>().ok());
            let decision = policy::decide(strategy, snapshot.retry_count, self.max_retries);
            tracing::info!(
                run_id = %run_id,
                strategy = strategy.map(|s| s.as_str()).unwrap_or("none"),
                retry_count = snapshot.retry_count,
                decision = %decision,
                "critique decision"
            );

            match decision {
                crate::model::Decision::Approve => {
                    let final_artifact = ctx
                        .latest_artifact()
                        .ok_or_else(|| {
                            WorkflowError::EngineFault("approved run has no artifact".to_string())
                        })?
                        .to_string();
                    self.store.update_run_data(
                        run_id,
                        RunDataPatch {
                            final_artifact: Some(final_artifact),
                            ..Default::default()
                        },
                    )?;
                    self.store.complete(run_id, true)?;
                    tracing::info!(run_id = %run_id, "workflow completed");
                    return Ok(());
                }
                crate::model::Decision::Reject => {
                    self.store
                        .fail_run(run_id, "rejected by critique, no further attempts")?;
                    return Ok(());
                }
                crate::model::Decision::End => {
                    let reason = if snapshot.retry_count >= self.max_retries {
                        WorkflowError::RetriesExhausted {
                            max_retries: self.max_retries,
                        }
                        .to_string()
                    } else {
                        WorkflowError::NoStrategy.to_string()
                    };
                    self.store.fail_run(run_id, &reason)?;
                    return Ok(());
                }
                crate::model::Decision::Regenerate => {
                    ctx.attempt = self.store.increment_retry(run_id)?;
                    ctx.feedback = report["feedback"].as_str().map(|s| s.to_string());
                    if !self.run_generation(run_id, &mut ctx, &mut progress).await? {
                        return Ok(());
                    }
                }
                crate::model::Decision::Enhance => {
                    ctx.attempt = self.store.increment_retry(run_id)?;
                    ctx.feedback = report["feedback"].as_str().map(|s| s.to_string());
                    if !self.run_refinement(run_id, &mut ctx, &mut progress).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Returns false when the stage failed and the run is already terminal.
    async fn run_brand_kit(
        &self,
        run_id: Uuid,
        ctx: &mut WorkflowContext,
        progress: &mut Progress,
    ) -> Result<bool, WorkflowError> {
        self.store.update_status(
            run_id,
            RunStatus::ExtractingBrandKit,
            Some(progress.advance(BRAND_KIT_START)),
            Some(stage::BRAND_KIT),
            None,
        )?;
        self.store
            .start_stage(run_id, stage::BRAND_KIT, Some(attempt_meta(0)))?;

        match self.adapters.brand_kit.execute(ctx).await {
            StageOutcome::Success(output) => {
                ctx.brand_kit = output.payload.clone();
                self.store.update_run_data(
                    run_id,
                    RunDataPatch {
                        brand_kit: Some(output.payload),
                        ..Default::default()
                    },
                )?;
                self.store.complete_stage(run_id, stage::BRAND_KIT, None)?;
                self.store.update_status(
                    run_id,
                    RunStatus::ExtractingBrandKit,
                    Some(progress.advance(BRAND_KIT_DONE)),
                    None,
                    None,
                )?;
                Ok(true)
            }
            StageOutcome::Failure(message) => {
                tracing::warn!(run_id = %run_id, stage = stage::BRAND_KIT, error = %message, "stage failed");
                self.store
                    .fail_stage(run_id, stage::BRAND_KIT, &message, None)?;
                Ok(false)
            }
        }
    }

    async fn run_generation(
        &self,
        run_id: Uuid,
        ctx: &mut WorkflowContext,
        progress: &mut Progress,
    ) -> Result<bool, WorkflowError> {
        self.store.update_status(
            run_id,
            RunStatus::Generating,
            Some(progress.advance(GENERATION_START)),
            Some(stage::GENERATION),
            None,
        )?;
        self.store
            .start_stage(run_id, stage::GENERATION, Some(attempt_meta(ctx.attempt)))?;

        match self.adapters.generation.execute(ctx).await {
            StageOutcome::Success(output) => {
                let mut meta = serde_json::Map::new();
                for reference in &output.artifacts {
                    ctx.artifacts.push(reference.clone());
                    self.store.update_run_data(
                        run_id,
                        RunDataPatch {
                            artifact: Some(reference.clone()),
                            ..Default::default()
                        },
                    )?;
                    meta.insert("artifact".to_string(), json!(reference));
                }
                self.store
                    .complete_stage(run_id, stage::GENERATION, Some(meta))?;
                self.store.update_status(
                    run_id,
                    RunStatus::Generating,
                    Some(progress.advance(GENERATION_DONE)),
                    None,
                    None,
                )?;
                Ok(true)
            }
            StageOutcome::Failure(message) => {
                tracing::warn!(run_id = %run_id, stage = stage::GENERATION, error = %message, "stage failed");
                self.store
                    .fail_stage(run_id, stage::GENERATION, &message, None)?;
                Ok(false)
            }
        }
    }

    /// Returns the critique report, or `None` when the stage failed and the
    /// run is already terminal.
    async fn run_critique(
        &self,
        run_id: Uuid,
        ctx: &mut WorkflowContext,
        progress: &mut Progress,
    ) -> Result<Option<serde_json::Value>, WorkflowError> {
        self.store.update_status(
            run_id,
            RunStatus::Critiquing,
            Some(progress.advance(CRITIQUE_START)),
            Some(stage::CRITIQUE),
            None,
        )?;
        self.store
            .start_stage(run_id, stage::CRITIQUE, Some(attempt_meta(ctx.attempt)))?;

        match self.adapters.critique.execute(ctx).await {
            StageOutcome::Success(output) => {
                let report = output.payload;
                self.store.update_run_data(
                    run_id,
                    RunDataPatch {
                        critique: Some(report.clone()),
                        ..Default::default()
                    },
                )?;
                let mut meta = serde_json::Map::new();
                if let Some(score) = report.get("score") {
                    meta.insert("score".to_string(), score.clone());
                }
                if let Some(strategy) = report.get("strategy") {
                    meta.insert("strategy".to_string(), strategy.clone());
                }
                self.store
                    .complete_stage(run_id, stage::CRITIQUE, Some(meta))?;
                self.store.update_status(
                    run_id,
                    RunStatus::Critiquing,
                    Some(progress.advance(critique_checkpoint(ctx.attempt))),
                    None,
                    None,
                )?;
                Ok(Some(report))
            }
            StageOutcome::Failure(message) => {
                tracing::warn!(run_id = %run_id, stage = stage::CRITIQUE, error = %message, "stage failed");
                self.store
                    .fail_stage(run_id, stage::CRITIQUE, &message, None)?;
                Ok(None)
            }
        }
    }

    async fn run_refinement(
        &self,
        run_id: Uuid,
        ctx: &mut WorkflowContext,
        progress: &mut Progress,
    ) -> Result<bool, WorkflowError> {
        self.store.update_status(
            run_id,
            RunStatus::Refining,
            // Refinement sits inside the retry loop; the ratchet keeps the
            // bar from sliding back below the last critique checkpoint.
            Some(progress.advance(CRITIQUE_DONE)),
            Some(stage::REFINEMENT),
            None,
        )?;
        self.store
            .start_stage(run_id, stage::REFINEMENT, Some(attempt_meta(ctx.attempt)))?;

        match self.adapters.refinement.execute(ctx).await {
            StageOutcome::Success(output) => {
                let mut meta = serde_json::Map::new();
                for reference in &output.artifacts {
                    ctx.artifacts.push(reference.clone());
                    self.store.update_run_data(
                        run_id,
                        RunDataPatch {
                            artifact: Some(reference.clone()),
                            ..Default::default()
                        },
                    )?;
                    meta.insert("artifact".to_string(), json!(reference));
                }
                self.store
                    .complete_stage(run_id, stage::REFINEMENT, Some(meta))?;
                Ok(true)
            }
            StageOutcome::Failure(message) => {
                tracing::warn!(run_id = %run_id, stage = stage::REFINEMENT, error = %message, "stage failed");
                self.store
                    .fail_stage(run_id, stage::REFINEMENT, &message, None)?;
                Ok(false)
            }
        }
    }
}

fn context_for(run: &Run) -> WorkflowContext {
    WorkflowContext {
        run_id: run.id,
        prompt: run.input.prompt.clone(),
        media_kind: run.input.media_kind,
        brand_website_url: run.input.brand_website_url.clone(),
        logo_ref: run.input.logo_ref.clone(),
        product_ref: run.input.product_ref.clone(),
        brand_kit: json!({}),
        artifacts: Vec::new(),
        feedback: None,
        attempt: 0,
    }
}

fn attempt_meta(attempt: u32) -> serde_json::Map<String, serde_json::Value> {
    let mut meta = serde_json::Map::new();
    meta.insert("attempt".to_string(), json!(attempt));
    meta
}
