//! Domain types for ad generation runs.
//!
//! A `Run` is one end-to-end execution of the pipeline for a single request.
//! All enums serialize as lowercase snake_case strings and round-trip through
//! `as_str`/`FromStr`.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of media a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            _ => Err(format!("Invalid media kind: {}", s)),
        }
    }
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    ExtractingBrandKit,
    Generating,
    Critiquing,
    Refining,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ExtractingBrandKit => "extracting_brand_kit",
            Self::Generating => "generating",
            Self::Critiquing => "critiquing",
            Self::Refining => "refining",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// A run in a terminal state will never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "extracting_brand_kit" => Ok(Self::ExtractingBrandKit),
            "generating" => Ok(Self::Generating),
            "critiquing" => Ok(Self::Critiquing),
            "refining" => Ok(Self::Refining),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid run status: {}", s)),
        }
    }
}

/// Status of an individual pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Completed,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid stage status: {}", s)),
        }
    }
}

/// Refinement strategy recommended by the critique backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementStrategy {
    Approve,
    Reject,
    Regenerate,
    Enhance,
}

impl RefinementStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Regenerate => "regenerate",
            Self::Enhance => "enhance",
        }
    }
}

impl std::fmt::Display for RefinementStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefinementStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "regenerate" => Ok(Self::Regenerate),
            "enhance" => Ok(Self::Enhance),
            _ => Err(format!("Invalid refinement strategy: {}", s)),
        }
    }
}

/// Next control-flow transition chosen by the decision policy.
/// Never persisted; consumed by the engine immediately after critique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
    Regenerate,
    Enhance,
    End,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Regenerate => "regenerate",
            Self::Enhance => "enhance",
            Self::End => "end",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of the latest attempt of one named stage.
///
/// Re-entering a stage on retry overwrites timing and metadata in place;
/// the attempt number lives in `metadata` under `"attempt"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    pub status: StageStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub error: Option<String>,
}

/// Immutable input snapshot captured when a run is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInput {
    pub prompt: String,
    pub media_kind: MediaKind,
    pub brand_website_url: Option<String>,
    pub logo_ref: Option<String>,
    pub product_ref: Option<String>,
}

/// One end-to-end execution of the generation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub input: RunInput,
    pub status: RunStatus,
    /// Percentage in [0, 100], non-decreasing until terminal.
    pub progress: f32,
    pub current_stage: Option<String>,
    /// Stage records in execution order; one slot per stage name.
    pub stages: Vec<StageRecord>,
    pub brand_kit: Option<serde_json::Value>,
    /// References to every artifact produced, newest last.
    pub artifacts: Vec<String>,
    pub critique: Option<serde_json::Value>,
    pub final_artifact: Option<String>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(input: RunInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            input,
            status: RunStatus::Pending,
            progress: 0.0,
            current_stage: None,
            stages: Vec::new(),
            brand_kit: None,
            artifacts: Vec::new(),
            critique: None,
            final_artifact: None,
            error: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Look up the stage record for `name`, if the stage has started.
    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.name == name)
    }
}

/// Canonical stage names used across the engine, store, and adapters.
pub mod stage {
    pub const BRAND_KIT: &str = "brand_kit_extraction";
    pub const GENERATION: &str = "generation";
    pub const CRITIQUE: &str = "critique";
    pub const REFINEMENT: &str = "refinement";
}
