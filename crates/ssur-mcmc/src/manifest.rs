use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ssur_core::errors::ErrorInfo;
use ssur_core::{Dataset, SsurError};

use crate::config::RunConfig;
use crate::drive::RunSummary;

/// Problem dimensions recorded alongside a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Observations.
    pub n: usize,
    /// Outcomes.
    pub s: usize,
    /// Fixed predictors.
    pub q: usize,
    /// Selectable predictors.
    pub p: usize,
}

impl Dimensions {
    /// Dimensions of a dataset.
    pub fn of(dataset: &Dataset) -> Self {
        Self {
            n: dataset.n_observations(),
            s: dataset.n_outcomes(),
            q: dataset.n_fixed(),
            p: dataset.n_selectable(),
        }
    }
}

/// Structured manifest describing a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Configuration used for the run.
    pub config: RunConfig,
    /// Master seed the worker generators were derived from.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Problem dimensions.
    pub dimensions: Dimensions,
    /// SHA-256 of the data matrix and column assignment.
    pub data_hash: String,
    /// Whether a structure graph over the predictors was supplied.
    pub structure_graph: bool,
    /// Summary streams written (relative to the run directory).
    pub streams: Vec<PathBuf>,
    /// End-of-run summary.
    pub summary: RunSummary,
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), SsurError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| SsurError::io("manifest-mkdir", err, parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            SsurError::Io(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        fs::write(path, json).map_err(|err| SsurError::io("manifest-write", err, path.display()))
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, SsurError> {
        let contents = fs::read_to_string(path)
            .map_err(|err| SsurError::io("manifest-read", err, path.display()))?;
        serde_json::from_str(&contents).map_err(|err| {
            SsurError::Io(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display()),
            )
        })
    }
}

/// Hex SHA-256 over the outcome, fixed and selectable blocks in order.
pub fn dataset_hash(dataset: &Dataset) -> String {
    let mut hasher = Sha256::new();
    let blocks = [
        dataset.outcomes(),
        dataset.fixed_predictors(),
        dataset.selectable_predictors(),
    ];
    for block in &blocks {
        hasher.update((block.nrows() as u64).to_le_bytes());
        hasher.update((block.ncols() as u64).to_le_bytes());
        for value in block.iter() {
            hasher.update(value.to_le_bytes());
        }
    }
    hex::encode(hasher.finalize())
}
