//! Saved projects: an append-only, save-time ordered list of editor states.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{app_data_path, data_env_dirs, APP_DIR};
use crate::editor::EditorState;

const PROJECTS_FILE: &str = "projects.json";
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("missing HOME environment variable")]
    MissingHomeDirectory,
    #[error("project {0} not found")]
    ProjectNotFound(String),
    #[error("storage quota exceeded: {required} bytes needed, {quota} allowed")]
    QuotaExceeded { required: u64, quota: u64 },
    #[error("project data is not valid json: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Milliseconds since the unix epoch.
    pub saved_at: u64,
    pub state: EditorState,
}

pub trait ProjectStorage {
    /// Appends a new project; earlier saves are never replaced.
    fn save(&mut self, state: &EditorState, name: &str) -> StorageResult<Project>;
    fn list(&self) -> StorageResult<Vec<Project>>;
    fn load(&self, id: &str) -> StorageResult<EditorState>;
    fn delete(&mut self, id: &str) -> StorageResult<bool>;
}

/// `projects.json` under the application data directory.
#[derive(Debug, Clone)]
pub struct FileProjectStore {
    path: PathBuf,
    quota_bytes: u64,
}

impl FileProjectStore {
    pub fn with_path(path: PathBuf, quota_bytes: u64) -> Self {
        Self { path, quota_bytes }
    }

    pub fn with_default_path(quota_bytes: u64) -> StorageResult<Self> {
        let (xdg_data_home, home) = data_env_dirs();
        let path = app_data_path(
            APP_DIR,
            PROJECTS_FILE,
            xdg_data_home.as_deref(),
            home.as_deref(),
        )
        .map_err(|_| StorageError::MissingHomeDirectory)?;
        Ok(Self::with_path(path, quota_bytes))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> StorageResult<Vec<Project>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Vec::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    fn write_all(&self, projects: &[Project]) -> StorageResult<()> {
        let encoded = serde_json::to_vec(projects)?;
        check_quota(encoded.len(), self.quota_bytes)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &encoded)?;
        if let Err(err) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::Io(err));
        }
        Ok(())
    }
}

impl ProjectStorage for FileProjectStore {
    fn save(&mut self, state: &EditorState, name: &str) -> StorageResult<Project> {
        let mut projects = self.read_all()?;
        let project = append_project(&mut projects, state, name);
        self.write_all(&projects)?;
        tracing::info!(id = %project.id, path = %self.path.display(), "project saved");
        Ok(project)
    }

    fn list(&self) -> StorageResult<Vec<Project>> {
        self.read_all()
    }

    fn load(&self, id: &str) -> StorageResult<EditorState> {
        find_state(self.read_all()?, id)
    }

    fn delete(&mut self, id: &str) -> StorageResult<bool> {
        let mut projects = self.read_all()?;
        let before = projects.len();
        projects.retain(|project| project.id != id);
        if projects.len() == before {
            return Ok(false);
        }
        self.write_all(&projects)?;
        tracing::info!(id, "project deleted");
        Ok(true)
    }
}

/// Volatile store for hosts without a filesystem.
#[derive(Debug, Clone)]
pub struct MemoryProjectStore {
    projects: Vec<Project>,
    quota_bytes: u64,
}

impl Default for MemoryProjectStore {
    fn default() -> Self {
        Self::with_quota(DEFAULT_QUOTA_BYTES)
    }
}

impl MemoryProjectStore {
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            projects: Vec::new(),
            quota_bytes,
        }
    }
}

impl ProjectStorage for MemoryProjectStore {
    fn save(&mut self, state: &EditorState, name: &str) -> StorageResult<Project> {
        let mut projects = self.projects.clone();
        let project = append_project(&mut projects, state, name);
        check_quota(serde_json::to_vec(&projects)?.len(), self.quota_bytes)?;
        self.projects = projects;
        Ok(project)
    }

    fn list(&self) -> StorageResult<Vec<Project>> {
        Ok(self.projects.clone())
    }

    fn load(&self, id: &str) -> StorageResult<EditorState> {
        find_state(self.projects.clone(), id)
    }

    fn delete(&mut self, id: &str) -> StorageResult<bool> {
        let before = self.projects.len();
        self.projects.retain(|project| project.id != id);
        Ok(self.projects.len() != before)
    }
}

fn append_project(projects: &mut Vec<Project>, state: &EditorState, name: &str) -> Project {
    let saved_at = epoch_millis();
    let mut sequence = projects.len();
    let id = loop {
        let candidate = format!("{saved_at}-{sequence}");
        if projects.iter().all(|project| project.id != candidate) {
            break candidate;
        }
        sequence += 1;
    };
    let project = Project {
        id,
        name: name.to_string(),
        saved_at,
        state: state.clone(),
    };
    projects.push(project.clone());
    project
}

fn find_state(projects: Vec<Project>, id: &str) -> StorageResult<EditorState> {
    projects
        .into_iter()
        .find(|project| project.id == id)
        .map(|project| project.state)
        .ok_or_else(|| StorageError::ProjectNotFound(id.to_string()))
}

fn check_quota(required: usize, quota_bytes: u64) -> StorageResult<()> {
    let required = u64::try_from(required).unwrap_or(u64::MAX);
    if required > quota_bytes {
        tracing::warn!(required, quota = quota_bytes, "project storage quota exceeded");
        return Err(StorageError::QuotaExceeded {
            required,
            quota: quota_bytes,
        });
    }
    Ok(())
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
