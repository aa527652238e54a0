pub mod config;
pub mod coordinator;
pub mod downloader;
pub mod error;
pub mod events;
pub mod net;
pub mod notify;
pub mod spawn;
pub mod task;


pub use crate::coordinator::DownloadTaskCoordinator;
pub use crate::downloader::{DownloadOutcome, DownloadProgress, Downloader, HttpDownloader};
pub use crate::error::{CoreError, CoreResult};
pub use crate::events::{TaskEvent, UiCallbacks};
pub use crate::task::{DownloadTask, Identity, TaskId, TaskState};
