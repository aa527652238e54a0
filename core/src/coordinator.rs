use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::downloader::{DownloadParams, DownloadProgress, Downloader};
use crate::error::{CoreError, CoreResult};
use crate::events::{EventSender, TaskEvent};
use crate::notify::{LogNotifier, NotificationSink};
use crate::spawn::{Spawner, ThreadSpawner};
use crate::task::{DownloadTask, Identity, TaskId, TaskState};

type Registry = Mutex<HashMap<TaskId, DownloadTask>>;

/// Tracks in-flight downloads by identity, rejects duplicates, hands each
/// accepted request to a worker, and relays lifecycle events to the
/// UI-owning loop through the event channel.
pub struct DownloadTaskCoordinator {
    downloader: Arc<dyn Downloader>,
    spawner: Arc<dyn Spawner>,
    notifier: Arc<dyn NotificationSink>,
    events: EventSender,
    active: Arc<Registry>,
}

impl DownloadTaskCoordinator {
    pub fn new(downloader: Arc<dyn Downloader>, events: EventSender) -> Self {
        Self {
            downloader,
            spawner: Arc::new(ThreadSpawner::default()),
            notifier: Arc::new(LogNotifier),
            events,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Is a download for this identity currently running?
    pub fn is_active(&self, identity: &Identity) -> bool {
        lock_registry(&self.active).contains_key(&identity.task_id())
    }

    /// Snapshot of the active set, for a downloads screen to poll.
    pub fn active_tasks(&self) -> Vec<DownloadTask> {
        lock_registry(&self.active).values().cloned().collect()
    }

    /// Accept or reject a download request. Acceptance registers the task
    /// as running and returns immediately; the transfer happens on a
    /// worker. A request for an identity that is already active is
    /// rejected with no side effects, the caller tells the user.
    pub fn request_download(
        &self,
        identity: &Identity,
        url: String,
        headers: HashMap<String, String>,
        title: Option<String>,
    ) -> CoreResult<TaskId> {
        let task_id = identity.task_id();
        let task = {
            // Check and insert under one lock, otherwise two near-simultaneous
            // requests could both observe "not present".
            let mut active = lock_registry(&self.active);
            if active.contains_key(&task_id) {
                return Err(CoreError::DuplicateInProgress(task_id));
            }
            let mut task = DownloadTask::new(identity, url);
            task.title = title;
            task.headers = headers;
            task.state = TaskState::Running;
            active.insert(task_id.clone(), task.clone());
            task
        };

        debug!("accepted download task {}", task_id);
        self.notifier.notify("New Download", &task.episode_title());
        let _ = self.events.send(TaskEvent::Started {
            task_id: task_id.clone(),
        });

        let downloader = Arc::clone(&self.downloader);
        let active = Arc::clone(&self.active);
        let events = self.events.clone();
        let notifier = Arc::clone(&self.notifier);
        let worker_task = task;
        self.spawner.spawn(Box::new(move || {
            run_worker(worker_task, downloader, active, events, notifier);
        }));

        Ok(task_id)
    }

    /// Block until every worker spawned so far has finished. Mainly for
    /// shutdown paths and tests; the UI never needs it.
    pub fn wait_all(&self) {
        self.spawner.wait_all();
    }
}

/// One download, end to end, on a worker thread. The guard removes the task
/// from the active set before any terminal event becomes observable, and it
/// does so even if the downloader panics.
fn run_worker(
    task: DownloadTask,
    downloader: Arc<dyn Downloader>,
    active: Arc<Registry>,
    events: EventSender,
    notifier: Arc<dyn NotificationSink>,
) {
    let task_id = task.id.clone();
    let episode_title = task.episode_title();
    let params = DownloadParams {
        url: task.url.clone(),
        headers: task.headers.clone(),
        episode_title: episode_title.clone(),
    };

    let result = {
        let _guard = ActiveGuard {
            task_id: task_id.clone(),
            active: Arc::clone(&active),
            events: events.clone(),
            notifier: Arc::clone(&notifier),
            episode_title: episode_title.clone(),
        };

        let mut on_progress = |progress: DownloadProgress| {
            {
                let mut registry = lock_registry(&active);
                if let Some(entry) = registry.get_mut(&task_id) {
                    entry.downloaded_bytes = progress.downloaded_bytes;
                    if let Some(total) = progress.total_bytes {
                        entry.total_bytes = total;
                    }
                    entry.touch();
                }
            }
            let _ = events.send(TaskEvent::Progress {
                task_id: task_id.clone(),
                progress,
            });
        };

        downloader.download(&params, &mut on_progress)
        // Guard drops here: the identity is free again before anyone can
        // observe the terminal event below.
    };

    match result {
        Ok(outcome) => {
            debug!("download task {} completed: {}", task_id, outcome.dest_path);
            notifier.notify("Download Complete", &episode_title);
            let _ = events.send(TaskEvent::Completed { task_id, outcome });
        }
        Err(err) => {
            warn!("download task {} failed: {}", task_id, err);
            notifier.notify("Download Failed", &format!("{}: {}", episode_title, err));
            let _ = events.send(TaskEvent::Failed {
                task_id,
                error: err.to_string(),
            });
        }
    }
}

struct ActiveGuard {
    task_id: TaskId,
    active: Arc<Registry>,
    events: EventSender,
    notifier: Arc<dyn NotificationSink>,
    episode_title: String,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        lock_registry(&self.active).remove(&self.task_id);
        if std::thread::panicking() {
            self.notifier.notify(
                "Download Failed",
                &format!("{}: download worker panicked", self.episode_title),
            );
            let _ = self.events.send(TaskEvent::Failed {
                task_id: self.task_id.clone(),
                error: "download worker panicked".to_string(),
            });
        }
    }
}

// The registry holds plain task records, so a panic mid-update cannot leave
// it inconsistent. Recover from poisoning instead of propagating it: a
// task id stuck in the map would block that identity forever.
fn lock_registry(active: &Registry) -> MutexGuard<'_, HashMap<TaskId, DownloadTask>> {
    match active.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
