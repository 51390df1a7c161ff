use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{PartError, Result};
use crate::graph::Variable;
use crate::session::{Session, StoredTensor};

pub const INDEX_EXTENSION: &str = "index";
pub const DATA_EXTENSION: &str = "data";

/// Metadata written next to the checkpoint data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointIndex {
    pub scope: String,
    pub variables: Vec<IndexEntry>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub shape: Vec<usize>,
}

/// A checkpoint found on disk by [`list_checkpoints`]
#[derive(Debug, Clone)]
pub struct CheckpointEntry {
    pub path: PathBuf,
    pub scope: String,
    pub num_variables: usize,
    pub timestamp: u64,
}

/// `<path>.<ext>`, keeping any dots already present in `path`.
fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Persists and restores a fixed list of variables.
#[derive(Debug, Clone)]
pub struct Saver {
    scope: String,
    var_list: Vec<Variable>,
}

impl Saver {
    pub fn new(scope: impl Into<String>, var_list: Vec<Variable>) -> Self {
        Self {
            scope: scope.into(),
            var_list,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn variables(&self) -> &[Variable] {
        &self.var_list
    }

    /// Writes `<path>.data` and `<path>.index`, returning the index path.
    pub fn save<B: Backend>(&self, session: &Session<B>, path: &Path) -> Result<PathBuf> {
        require_path(path, &self.scope)?;
        if self.var_list.is_empty() {
            warn!(
                "No variables to save for scope '{}', writing an empty checkpoint to {:?}",
                self.scope, path
            );
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PartError::io(parent, e))?;
        }

        let mut values = BTreeMap::new();
        for variable in &self.var_list {
            values.insert(variable.name().to_string(), session.value(variable.name())?.clone());
        }

        let data_path = sibling(path, DATA_EXTENSION);
        let data = bincode::serialize(&values)?;
        fs::write(&data_path, data).map_err(|e| PartError::io(&data_path, e))?;

        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let index = CheckpointIndex {
            scope: self.scope.clone(),
            variables: self
                .var_list
                .iter()
                .map(|v| IndexEntry {
                    name: v.name().to_string(),
                    shape: v.shape().to_vec(),
                })
                .collect(),
            timestamp,
        };

        let index_path = sibling(path, INDEX_EXTENSION);
        let index_json = serde_json::to_string_pretty(&index)?;
        fs::write(&index_path, index_json).map_err(|e| PartError::io(&index_path, e))?;

        debug!("Wrote {} variables to {:?}", values.len(), data_path);
        Ok(index_path)
    }

    /// Loads `<path>.data` into `session`.
    ///
    /// Every variable of the list must be present with its declared shape;
    /// nothing is assigned unless all of them are.
    pub fn restore<B: Backend>(&self, session: &mut Session<B>, path: &Path) -> Result<()> {
        require_path(path, &self.scope)?;
        let data_path = sibling(path, DATA_EXTENSION);
        let data = fs::read(&data_path).map_err(|e| PartError::io(&data_path, e))?;
        let mut values: BTreeMap<String, StoredTensor> = bincode::deserialize(&data)?;

        let mut restored = Vec::with_capacity(self.var_list.len());
        for variable in &self.var_list {
            let value = values
                .remove(variable.name())
                .ok_or_else(|| PartError::NotInCheckpoint {
                    path: path.to_path_buf(),
                    name: variable.name().to_string(),
                })?;
            if value.shape() != variable.shape() {
                return Err(PartError::ShapeMismatch {
                    name: variable.name().to_string(),
                    expected: variable.shape().to_vec(),
                    found: value.shape().to_vec(),
                });
            }
            restored.push((variable.name(), value));
        }

        if !values.is_empty() {
            debug!("Ignoring {} extra variables in {:?}", values.len(), data_path);
        }

        for (name, value) in restored {
            session.assign(name, value)?;
        }
        Ok(())
    }
}

fn require_path(path: &Path, scope: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(PartError::Config(format!(
            "empty checkpoint path for scope '{}'",
            scope
        )));
    }
    Ok(())
}

pub fn read_index(path: &Path) -> Result<CheckpointIndex> {
    let index_path = sibling(path, INDEX_EXTENSION);
    let json = fs::read_to_string(&index_path).map_err(|e| PartError::io(&index_path, e))?;
    Ok(serde_json::from_str(&json)?)
}

/// List the checkpoints stored directly in a directory
pub fn list_checkpoints(checkpoint_dir: &Path) -> Result<Vec<CheckpointEntry>> {
    if !checkpoint_dir.exists() {
        warn!("Checkpoint directory does not exist: {:?}", checkpoint_dir);
        return Ok(Vec::new());
    }

    let mut checkpoints = Vec::new();

    for entry in WalkDir::new(checkpoint_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some(INDEX_EXTENSION) {
            continue;
        }
        let base = path.with_extension("");
        match read_index(&base) {
            Ok(index) => checkpoints.push(CheckpointEntry {
                path: base,
                scope: index.scope,
                num_variables: index.variables.len(),
                timestamp: index.timestamp,
            }),
            Err(e) => warn!("Skipping unreadable checkpoint index {:?}: {}", path, e),
        }
    }

    checkpoints.sort_by(|a, b| a.scope.cmp(&b.scope).then_with(|| a.path.cmp(&b.path)));

    Ok(checkpoints)
}
