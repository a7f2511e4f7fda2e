//! File persistence for uploaded brand assets, generated artifacts, and
//! critique reports.
//!
//! Everything above this layer deals in *references* — paths relative to the
//! storage root — never raw bytes. References are the only thing the engine
//! carries across state-machine transitions.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;

/// Storage categories with dedicated subtrees.
pub const CATEGORY_UPLOADS: &str = "uploads";
pub const CATEGORY_BRAND_ASSETS: &str = "brand_assets";
pub const CATEGORY_ARTIFACTS: &str = "artifacts";
pub const CATEGORY_REPORTS: &str = "reports";

const CATEGORIES: &[&str] = &[
    CATEGORY_UPLOADS,
    CATEGORY_BRAND_ASSETS,
    CATEGORY_ARTIFACTS,
    CATEGORY_REPORTS,
];

/// Disk-backed media store rooted at a single directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    base_dir: PathBuf,
}

impl MediaStore {
    /// Create a store and ensure its category subdirectories exist.
    pub fn new(base_dir: &Path) -> Result<Self> {
        for category in CATEGORIES {
            std::fs::create_dir_all(base_dir.join(category))
                .with_context(|| format!("Failed to create storage directory '{}'", category))?;
        }
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn is_valid_category(category: &str) -> bool {
        CATEGORIES.contains(&category)
    }

    /// Save bytes under a category with a timestamp-unique name.
    /// Returns the reference (path relative to the storage root).
    pub fn save(&self, content: &[u8], category: &str, filename: &str) -> Result<String> {
        if !Self::is_valid_category(category) {
            bail!("Unknown storage category: {}", category);
        }
        let filename = sanitize_filename(filename)?;
        let (stem, ext) = split_name(&filename);
        let unique = format!("{}_{}{}", stem, Utc::now().format("%Y%m%d_%H%M%S%f"), ext);

        let reference = format!("{}/{}", category, unique);
        let path = self.base_dir.join(&reference);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(reference)
    }

    /// Save an uploaded brand asset (logo, product shot) under its own
    /// asset-type subdirectory.
    pub fn save_brand_asset(
        &self,
        content: &[u8],
        asset_type: &str,
        filename: &str,
    ) -> Result<String> {
        let filename = sanitize_filename(filename)?;
        let asset_type = sanitize_filename(asset_type)?;
        let dir = self.base_dir.join(CATEGORY_BRAND_ASSETS).join(&asset_type);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create asset directory '{}'", asset_type))?;

        let (stem, ext) = split_name(&filename);
        let unique = format!("{}_{}{}", stem, Utc::now().format("%Y%m%d_%H%M%S%f"), ext);
        let reference = format!("{}/{}/{}", CATEGORY_BRAND_ASSETS, asset_type, unique);
        let path = self.base_dir.join(&reference);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(reference)
    }

    /// Save one artifact variation for a run:
    /// `artifacts/<run_id>/variation_<n>.<ext>`.
    pub fn save_artifact(
        &self,
        content: &[u8],
        run_id: &str,
        variation: u32,
        extension: &str,
    ) -> Result<String> {
        let run_id = sanitize_filename(run_id)?;
        let dir = self.base_dir.join(CATEGORY_ARTIFACTS).join(&run_id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create artifact directory for run {}", run_id))?;

        let ext = extension.trim_start_matches('.');
        let reference = format!(
            "{}/{}/variation_{}.{}",
            CATEGORY_ARTIFACTS, run_id, variation, ext
        );
        let path = self.base_dir.join(&reference);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(reference)
    }

    /// Save a JSON report for a run under `reports/<run_id>/`.
    pub fn save_report(&self, content: &str, run_id: &str, report_type: &str) -> Result<String> {
        let run_id = sanitize_filename(run_id)?;
        let dir = self.base_dir.join(CATEGORY_REPORTS).join(&run_id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create report directory for run {}", run_id))?;

        let reference = format!(
            "{}/{}/{}_report_{}.json",
            CATEGORY_REPORTS,
            run_id,
            sanitize_filename(report_type)?,
            Utc::now().format("%Y%m%d_%H%M%S%f")
        );
        let path = self.base_dir.join(&reference);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(reference)
    }

    /// Read back the bytes for a reference. Rejects references that escape
    /// the storage root.
    pub fn read(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.resolve(reference)?;
        std::fs::read(&path).with_context(|| format!("Asset not found: {}", reference))
    }

    /// Check whether a reference exists on disk.
    pub fn exists(&self, reference: &str) -> bool {
        self.resolve(reference).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Delete the file behind a reference. Returns whether anything existed.
    pub fn delete(&self, reference: &str) -> Result<bool> {
        let path = self.resolve(reference)?;
        if path.is_file() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to delete {}", reference))?;
            return Ok(true);
        }
        Ok(false)
    }

    /// List references under a category, optionally filtered by a glob
    /// pattern relative to the category directory.
    pub fn list(&self, category: &str, pattern: Option<&str>) -> Result<Vec<String>> {
        if !Self::is_valid_category(category) {
            bail!("Unknown storage category: {}", category);
        }
        let pattern = self
            .base_dir
            .join(category)
            .join(pattern.unwrap_or("**/*"))
            .to_string_lossy()
            .to_string();

        let mut refs: Vec<String> = glob::glob(&pattern)
            .context("Failed to read glob pattern")?
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .filter_map(|p| {
                p.strip_prefix(&self.base_dir)
                    .ok()
                    .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            })
            .collect();
        refs.sort();
        Ok(refs)
    }

    /// Resolve a reference to an absolute path inside the storage root.
    fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let rel = Path::new(reference);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            bail!("Invalid asset reference: {}", reference);
        }
        Ok(self.base_dir.join(rel))
    }
}

/// Strip any directory components and reject empty names.
fn sanitize_filename(name: &str) -> Result<String> {
    let name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();
    if name.is_empty() || name == "." || name == ".." {
        bail!("Invalid filename");
    }
    Ok(name)
}

fn split_name(filename: &str) -> (String, String) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{}", ext)),
        _ => (filename.to_string(), String::new()),
    }
}
