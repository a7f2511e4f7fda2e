//! In-memory run store: the single source of truth for externally observable
//! pipeline progress.
//!
//! All mutations for a given run happen under one lock, so two concurrent
//! callers never observe a torn update. Readers always receive clones, never
//! live references into the map.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use crate::errors::WorkflowError;
use crate::model::{Run, RunInput, RunStatus, StageRecord, StageStatus};

type Metadata = serde_json::Map<String, serde_json::Value>;

/// Partial update of a run's result fields. Unset fields are left unchanged;
/// `artifact` is appended to the artifact list rather than replacing it.
#[derive(Debug, Default)]
pub struct RunDataPatch {
    pub brand_kit: Option<serde_json::Value>,
    pub artifact: Option<String>,
    pub critique: Option<serde_json::Value>,
    pub final_artifact: Option<String>,
}

/// Thread-safe registry of run records, keyed by run id.
#[derive(Debug, Default)]
pub struct RunStore {
    runs: Mutex<HashMap<Uuid, Run>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a closure against the run, bumping `updated_at` on the way out.
    fn with_run<T>(
        &self,
        run_id: Uuid,
        f: impl FnOnce(&mut Run) -> T,
    ) -> Result<T, WorkflowError> {
        let mut runs = self.runs.lock().map_err(|_| WorkflowError::LockPoisoned)?;
        let run = runs
            .get_mut(&run_id)
            .ok_or(WorkflowError::RunNotFound(run_id))?;
        let out = f(run);
        run.updated_at = Utc::now();
        Ok(out)
    }

    /// Create a new run with status `pending`, progress 0, and an empty
    /// stage history. Returns a snapshot of the created record.
    pub fn create(&self, input: RunInput) -> Result<Run, WorkflowError> {
        let run = Run::new(input);
        let mut runs = self.runs.lock().map_err(|_| WorkflowError::LockPoisoned)?;
        runs.insert(run.id, run.clone());
        Ok(run)
    }

    /// Fetch a snapshot copy of a run.
    pub fn get(&self, run_id: Uuid) -> Result<Run, WorkflowError> {
        let runs = self.runs.lock().map_err(|_| WorkflowError::LockPoisoned)?;
        runs.get(&run_id)
            .cloned()
            .ok_or(WorkflowError::RunNotFound(run_id))
    }

    /// Update run status; optional fields that are `None` are left unchanged.
    /// Progress is clamped to [0, 100].
    pub fn update_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        progress: Option<f32>,
        current_stage: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), WorkflowError> {
        self.with_run(run_id, |run| {
            run.status = status;
            if let Some(p) = progress {
                run.progress = p.clamp(0.0, 100.0);
            }
            if let Some(stage) = current_stage {
                run.current_stage = Some(stage.to_string());
            }
            if let Some(e) = error {
                run.error = Some(e.to_string());
            }
        })
    }

    /// Start (or restart) a stage. The record for `name` is overwritten in
    /// place on re-entry, keeping its position in the execution history.
    pub fn start_stage(
        &self,
        run_id: Uuid,
        name: &str,
        metadata: Option<Metadata>,
    ) -> Result<(), WorkflowError> {
        self.with_run(run_id, |run| {
            let record = StageRecord {
                name: name.to_string(),
                status: StageStatus::Pending,
                started_at: Utc::now(),
                completed_at: None,
                metadata: metadata.unwrap_or_default(),
                error: None,
            };
            match run.stages.iter_mut().find(|s| s.name == name) {
                Some(existing) => *existing = record,
                None => run.stages.push(record),
            }
            run.current_stage = Some(name.to_string());
        })
    }

    /// Mark a stage completed, merging any new metadata into its record.
    pub fn complete_stage(
        &self,
        run_id: Uuid,
        name: &str,
        metadata: Option<Metadata>,
    ) -> Result<(), WorkflowError> {
        self.with_run(run_id, |run| {
            if let Some(stage) = run.stages.iter_mut().find(|s| s.name == name) {
                stage.status = StageStatus::Completed;
                stage.completed_at = Some(Utc::now());
                if let Some(meta) = metadata {
                    stage.metadata.extend(meta);
                }
            }
        })
    }

    /// Mark a stage failed. A stage failure is run-fatal: the whole run
    /// transitions to `failed` with the stage's error message.
    pub fn fail_stage(
        &self,
        run_id: Uuid,
        name: &str,
        error: &str,
        metadata: Option<Metadata>,
    ) -> Result<(), WorkflowError> {
        self.with_run(run_id, |run| {
            if let Some(stage) = run.stages.iter_mut().find(|s| s.name == name) {
                stage.status = StageStatus::Failed;
                stage.completed_at = Some(Utc::now());
                stage.error = Some(error.to_string());
                if let Some(meta) = metadata {
                    stage.metadata.extend(meta);
                }
            }
            run.status = RunStatus::Failed;
            run.error = Some(error.to_string());
            run.completed_at = Some(Utc::now());
        })
    }

    /// Apply a partial update to the run's result fields.
    pub fn update_run_data(
        &self,
        run_id: Uuid,
        patch: RunDataPatch,
    ) -> Result<(), WorkflowError> {
        self.with_run(run_id, |run| {
            if let Some(kit) = patch.brand_kit {
                run.brand_kit = Some(kit);
            }
            if let Some(artifact) = patch.artifact {
                run.artifacts.push(artifact);
            }
            if let Some(critique) = patch.critique {
                run.critique = Some(critique);
            }
            if let Some(final_artifact) = patch.final_artifact {
                run.final_artifact = Some(final_artifact);
            }
        })
    }

    /// Increment the retry counter, returning the new value.
    pub fn increment_retry(&self, run_id: Uuid) -> Result<u32, WorkflowError> {
        self.with_run(run_id, |run| {
            run.retry_count += 1;
            run.retry_count
        })
    }

    /// Terminate a run: progress 100, completed timestamp, and final status.
    pub fn complete(&self, run_id: Uuid, success: bool) -> Result<(), WorkflowError> {
        self.with_run(run_id, |run| {
            run.status = if success {
                RunStatus::Completed
            } else {
                RunStatus::Failed
            };
            run.progress = 100.0;
            run.completed_at = Some(Utc::now());
        })
    }

    /// Terminate a run as failed without touching progress: it keeps its
    /// last known value, per the failure semantics of the pipeline.
    pub fn fail_run(&self, run_id: Uuid, error: &str) -> Result<(), WorkflowError> {
        self.with_run(run_id, |run| {
            run.status = RunStatus::Failed;
            run.error = Some(error.to_string());
            run.completed_at = Some(Utc::now());
        })
    }

    /// Remove a run record.
    pub fn delete(&self, run_id: Uuid) -> Result<(), WorkflowError> {
        let mut runs = self.runs.lock().map_err(|_| WorkflowError::LockPoisoned)?;
        runs.remove(&run_id)
            .map(|_| ())
            .ok_or(WorkflowError::RunNotFound(run_id))
    }

    /// List snapshot copies of runs, optionally filtered by status, newest
    /// first.
    pub fn list(&self, status: Option<RunStatus>) -> Result<Vec<Run>, WorkflowError> {
        let runs = self.runs.lock().map_err(|_| WorkflowError::LockPoisoned)?;
        let mut out: Vec<Run> = runs
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}
