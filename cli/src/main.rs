use std::collections::HashMap;
use std::env;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anidm_core::config::DownloadConfig;
use anidm_core::events::{dispatch, EventReceiver, UiCallbacks};
use anidm_core::{
    CoreError, DownloadOutcome, DownloadProgress, DownloadTaskCoordinator, HttpDownloader,
    Identity, TaskId,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "get" => {
            let (Some(media_id), Some(episode), Some(url)) =
                (args.get(2), args.get(3), args.get(4))
            else {
                print_usage();
                return;
            };
            let title = args.get(5).map(|value| value.to_string());
            run_get(media_id, episode, url, title);
        }
        _ => print_usage(),
    }
}

fn run_get(media_id: &str, episode: &str, url: &str, title: Option<String>) {
    let downloader = match HttpDownloader::new(DownloadConfig::default()) {
        Ok(downloader) => downloader,
        Err(err) => {
            eprintln!("error: {}", err);
            return;
        }
    };

    let (events, receiver) = mpsc::channel();
    let coordinator = DownloadTaskCoordinator::new(Arc::new(downloader), events);
    let identity = Identity::new(media_id, episode);

    let task_id = match coordinator.request_download(
        &identity,
        url.to_string(),
        HashMap::new(),
        title,
    ) {
        Ok(id) => id,
        Err(CoreError::DuplicateInProgress(id)) => {
            println!("Download In Progress: {} is already downloading", id);
            return;
        }
        Err(err) => {
            eprintln!("error: {}", err);
            return;
        }
    };

    render_events(&receiver, &task_id);
    coordinator.wait_all();
}

/// The UI loop: we own the receiver, events arrive from worker threads and
/// get rendered here on the main thread.
fn render_events(receiver: &EventReceiver, task_id: &TaskId) {
    let mut ui = ConsoleUi::default();
    while let Ok(event) = receiver.recv_timeout(Duration::from_secs(300)) {
        let done = event.is_terminal() && event.task_id() == task_id;
        dispatch(&event, &mut ui);
        if done {
            return;
        }
    }
    eprintln!("error: timed out waiting for download events");
}

#[derive(Default)]
struct ConsoleUi {
    last: HashMap<TaskId, (u64, Instant)>,
}

impl UiCallbacks for ConsoleUi {
    fn on_task_started(&mut self, task_id: &TaskId) {
        println!("started task: {}", task_id);
    }

    fn on_task_progress(&mut self, task_id: &TaskId, progress: &DownloadProgress) {
        let now = Instant::now();
        let (prev_bytes, prev_time) = self
            .last
            .get(task_id)
            .cloned()
            .unwrap_or((progress.downloaded_bytes, now));
        let delta_bytes = progress.downloaded_bytes.saturating_sub(prev_bytes);
        let delta_secs = now.duration_since(prev_time).as_secs_f64();
        let speed_bps = if delta_secs > 0.0 {
            (delta_bytes as f64 / delta_secs) as u64
        } else {
            0
        };
        self.last
            .insert(task_id.clone(), (progress.downloaded_bytes, now));

        let (percent, eta) = match progress.total_bytes {
            Some(total) if total > 0 => {
                let percent = format!(
                    "{:.1}%",
                    (progress.downloaded_bytes as f64 / total as f64) * 100.0
                );
                let remaining = total.saturating_sub(progress.downloaded_bytes);
                let eta = if speed_bps > 0 {
                    format_duration(remaining / speed_bps)
                } else {
                    "--:--".to_string()
                };
                (percent, eta)
            }
            _ => ("--".to_string(), "--:--".to_string()),
        };

        println!(
            "[{}] {} {}/{} ({}/s) eta {}",
            task_id,
            percent,
            format_bytes(progress.downloaded_bytes),
            progress
                .total_bytes
                .map(format_bytes)
                .unwrap_or_else(|| "?".to_string()),
            format_bytes(speed_bps),
            eta,
        );
    }

    fn on_task_completed(&mut self, task_id: &TaskId, outcome: &DownloadOutcome) {
        println!(
            "completed task {}: {} ({})",
            task_id,
            outcome.dest_path,
            format_bytes(outcome.total_bytes)
        );
    }

    fn on_task_failed(&mut self, task_id: &TaskId, error: &str) {
        eprintln!("task {} failed: {}", task_id, error);
    }
}

fn print_usage() {
    eprintln!(
        "Usage: anidm-cli <command> [args]\n\
Commands:\n\
  get <media-id> <episode> <url> [title]   Download one episode and wait\n\
Environment:\n\
  ANIDM_DOWNLOAD_DIR   Destination directory (defaults to ~/Downloads)\n\
  RUST_LOG             Log filter (defaults to info)"
    );
}

fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let b = bytes as f64;
    if b >= GB {
        format!("{:.2}GB", b / GB)
    } else if b >= MB {
        format!("{:.2}MB", b / MB)
    } else if b >= KB {
        format!("{:.2}KB", b / KB)
    } else {
        format!("{}B", bytes)
    }
}

fn format_duration(mut seconds: u64) -> String {
    let hours = seconds / 3600;
    seconds %= 3600;
    let minutes = seconds / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
