use serde::{Deserialize, Serialize};
use std::sync::mpsc::{Receiver, Sender};

use crate::downloader::{DownloadOutcome, DownloadProgress};
use crate::task::TaskId;

/// Worker-to-UI traffic. Workers only ever send; the UI-owning loop holds
/// the receiver and marshals each event onto its own thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskEvent {
    Started {
        task_id: TaskId,
    },
    Progress {
        task_id: TaskId,
        progress: DownloadProgress,
    },
    Completed {
        task_id: TaskId,
        outcome: DownloadOutcome,
    },
    Failed {
        task_id: TaskId,
        error: String,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> &TaskId {
        match self {
            TaskEvent::Started { task_id }
            | TaskEvent::Progress { task_id, .. }
            | TaskEvent::Completed { task_id, .. }
            | TaskEvent::Failed { task_id, .. } => task_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskEvent::Completed { .. } | TaskEvent::Failed { .. })
    }
}

pub type EventSender = Sender<TaskEvent>;
pub type EventReceiver = Receiver<TaskEvent>;

/// Callback surface for consumers that prefer methods over matching on
/// [`TaskEvent`]. Implementations run on whatever thread drains the
/// receiver, never on a worker.
pub trait UiCallbacks {
    fn on_task_started(&mut self, task_id: &TaskId);
    fn on_task_progress(&mut self, task_id: &TaskId, progress: &DownloadProgress);
    fn on_task_completed(&mut self, task_id: &TaskId, outcome: &DownloadOutcome);
    fn on_task_failed(&mut self, task_id: &TaskId, error: &str);
}

pub fn dispatch(event: &TaskEvent, ui: &mut dyn UiCallbacks) {
    match event {
        TaskEvent::Started { task_id } => ui.on_task_started(task_id),
        TaskEvent::Progress { task_id, progress } => ui.on_task_progress(task_id, progress),
        TaskEvent::Completed { task_id, outcome } => ui.on_task_completed(task_id, outcome),
        TaskEvent::Failed { task_id, error } => ui.on_task_failed(task_id, error),
    }
}
