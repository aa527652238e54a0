use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub type TaskId = String;

/// The `(media_id, episode)` pair that uniquely identifies a download.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Identity {
    pub media_id: String,
    pub episode: String,
}

impl Identity {
    pub fn new(media_id: impl Into<String>, episode: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            episode: episode.into(),
        }
    }

    /// Deterministic task id: the same identity always maps to the same id,
    /// which is what makes duplicate detection possible.
    pub fn task_id(&self) -> TaskId {
        format!("{}_{}", self.media_id, self.episode)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} episode {}", self.media_id, self.episode)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TaskState::Pending),
            "running" => Some(TaskState::Running),
            "completed" => Some(TaskState::Completed),
            "failed" => Some(TaskState::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: TaskId,
    pub media_id: String,
    pub episode: String,
    pub url: String,
    pub title: Option<String>,
    pub state: TaskState,
    pub headers: HashMap<String, String>,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub created_at: u64,
    pub updated_at: u64,
    pub error: Option<String>,
}

impl DownloadTask {
    pub fn new(identity: &Identity, url: String) -> Self {
        let now = now_epoch();
        Self {
            id: identity.task_id(),
            media_id: identity.media_id.clone(),
            episode: identity.episode.clone(),
            url,
            title: None,
            state: TaskState::Pending,
            headers: HashMap::new(),
            downloaded_bytes: 0,
            total_bytes: 0,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now_epoch();
    }

    /// Human-facing label used in notifications and fallback file names.
    pub fn episode_title(&self) -> String {
        let name = self.title.as_deref().unwrap_or(&self.media_id);
        format!("{}; Episode {}", name, self.episode)
    }
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
