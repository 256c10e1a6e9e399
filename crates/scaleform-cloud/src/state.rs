//! State management for server resources
//!
//! Manages the `.scaleform/state.json` file which records the identifier and
//! last observed state of every server resource.

use crate::error::{CloudError, Result};
use crate::schema::ResourceData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".scaleform";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_STAGED: &str = "state.json.new";
const LOCK_FILE: &str = "lock.json";

/// Global state containing all resource records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by address
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a resource
    pub fn set_resource(&mut self, address: impl Into<String>, state: ResourceState) {
        self.resources.insert(address.into(), state);
        self.updated_at = Utc::now();
    }

    /// Remove a resource
    pub fn remove_resource(&mut self, address: &str) -> Option<ResourceState> {
        let result = self.resources.remove(address);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    /// Get a resource by address
    pub fn get_resource(&self, address: &str) -> Option<&ResourceState> {
        self.resources.get(address)
    }

    /// Recorded data of a resource
    pub fn data(&self, address: &str) -> Option<&ResourceData> {
        self.resources.get(address).map(|r| &r.data)
    }
}

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Identifier, declared config and computed fields
    pub data: ResourceData,

    /// Current status
    pub status: ResourceStatus,

    /// When the resource was first recorded
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(data: ResourceData) -> Self {
        let now = Utc::now();
        Self {
            data,
            status: ResourceStatus::Unknown,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    /// Replace the recorded data, keeping the creation timestamp
    pub fn update(&mut self, data: ResourceData, status: ResourceStatus) {
        self.data = data;
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Created and confirmed ready
    Ready,
    /// Created remotely but a later step of the creation failed
    Tainted,
    /// Status is unknown
    Unknown,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Ready => write!(f, "ready"),
            ResourceStatus::Tainted => write!(f, "tainted"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Reads and writes the state file of a project
pub struct StateManager {
    dir: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            dir: project_root.as_ref().join(STATE_DIR),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Load the current state; a missing file is an empty state
    pub async fn load(&self) -> Result<GlobalState> {
        let content = match fs::read_to_string(self.path(STATE_FILE)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No state file in {}, starting empty", self.dir.display());
                return Ok(GlobalState::new());
            }
            Err(e) => return Err(e.into()),
        };

        let state: GlobalState = serde_json::from_str(&content)?;
        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Save the state
    ///
    /// The new content is written next to the state file and renamed over it,
    /// after the previous file has been copied to the backup.
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.path(STATE_FILE);
        let staged = self.path(STATE_STAGED);
        fs::write(&staged, serde_json::to_vec_pretty(state)?).await?;

        match fs::copy(&path, self.path(STATE_BACKUP)).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::rename(&staged, &path).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Take the project lock
    ///
    /// The lock file is created exclusively. A lock held longer than
    /// [`LOCK_STALE_AFTER`] minutes is taken over.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.path(LOCK_FILE);
        let owner = LockOwner::current();
        let body = serde_json::to_vec_pretty(&owner)?;

        match create_exclusive(&path, &body).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let held: LockOwner = serde_json::from_slice(&fs::read(&path).await?)?;
                if !held.is_stale() {
                    return Err(CloudError::LockError(format!(
                        "state of {} is held by {} (pid {}) since {}",
                        self.dir.display(),
                        held.host,
                        held.pid,
                        held.since
                    )));
                }

                tracing::warn!(
                    "Taking over stale state lock of {} (pid {})",
                    held.host,
                    held.pid
                );
                fs::remove_file(&path).await?;
                create_exclusive(&path, &body).await?;
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!("Acquired state lock {}", path.display());
        Ok(StateLock { path: Some(path) })
    }
}

/// Minutes after which a lock is considered abandoned
pub const LOCK_STALE_AFTER: i64 = 60;

#[derive(Debug, Serialize, Deserialize)]
struct LockOwner {
    host: String,
    pid: u32,
    since: DateTime<Utc>,
}

impl LockOwner {
    fn current() -> Self {
        Self {
            host: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            since: Utc::now(),
        }
    }

    fn is_stale(&self) -> bool {
        Utc::now().signed_duration_since(self.since).num_minutes() >= LOCK_STALE_AFTER
    }
}

async fn create_exclusive(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(body).await?;
    file.flush().await
}

/// Held project lock, removed on release or drop
pub struct StateLock {
    path: Option<PathBuf>,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if let Some(path) = self.path.take() {
            fs::remove_file(&path).await?;
            tracing::debug!("Released state lock {}", path.display());
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}
