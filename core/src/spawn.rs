use std::sync::Mutex;
use std::thread::{self, JoinHandle};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Seam for how workers get scheduled, so the strategy can change without
/// touching the coordinator contract.
pub trait Spawner: Send + Sync {
    fn spawn(&self, job: Job);

    /// Block until every job handed out so far has finished.
    fn wait_all(&self) {}
}

/// One OS thread per job. Finished handles are reaped on the next spawn.
#[derive(Default)]
pub struct ThreadSpawner {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadSpawner {
    fn reap(&self) {
        if let Ok(mut handles) = self.handles.lock() {
            let mut index = 0usize;
            while index < handles.len() {
                if handles[index].is_finished() {
                    let handle = handles.remove(index);
                    let _ = handle.join();
                } else {
                    index += 1;
                }
            }
        }
    }
}

impl Spawner for ThreadSpawner {
    fn spawn(&self, job: Job) {
        self.reap();
        let handle = thread::spawn(job);
        if let Ok(mut handles) = self.handles.lock() {
            handles.push(handle);
        }
    }

    fn wait_all(&self) {
        loop {
            let handle = {
                let Ok(mut handles) = self.handles.lock() else {
                    return;
                };
                handles.pop()
            };
            match handle {
                // A panicked worker already cleaned up after itself.
                Some(handle) => {
                    let _ = handle.join();
                }
                None => return,
            }
        }
    }
}
