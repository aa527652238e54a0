use std::collections::HashMap;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::DownloadConfig;
use crate::error::{CoreError, CoreResult};
use crate::net::{FetchRequest, NetClient, ReqwestNetClient};

/// Most recent byte counts for an in-flight download. Relayed as-is to
/// whoever listens; the coordinator never interprets it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub dest_path: String,
    pub total_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct DownloadParams {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub episode_title: String,
}

/// The downloader capability the coordinator dispatches to. The progress
/// callback may be invoked at arbitrary frequency from the worker thread.
pub trait Downloader: Send + Sync {
    fn download(
        &self,
        params: &DownloadParams,
        progress: &mut dyn FnMut(DownloadProgress),
    ) -> CoreResult<DownloadOutcome>;
}

/// Plain single-stream HTTP downloader: probe, resolve a destination file,
/// stream the body to disk. Retries transfer errors with a fixed backoff.
pub struct HttpDownloader {
    config: DownloadConfig,
    net: Arc<dyn NetClient>,
}

impl HttpDownloader {
    pub fn new(config: DownloadConfig) -> CoreResult<Self> {
        let net = ReqwestNetClient::new(&config.user_agent)?;
        Ok(Self {
            config,
            net: Arc::new(net),
        })
    }

    pub fn with_net_client(mut self, net: Box<dyn NetClient>) -> Self {
        self.net = Arc::from(net);
        self
    }

    fn fetch_to_file(
        &self,
        req: &FetchRequest,
        dest_path: &Path,
        mut total_bytes: Option<u64>,
        progress: &mut dyn FnMut(DownloadProgress),
    ) -> CoreResult<u64> {
        let mut stream = self.net.get_stream(req)?;
        if !(200..300).contains(&stream.status_code) {
            return Err(CoreError::Network(format!(
                "download failed with status {}",
                stream.status_code
            )));
        }
        if total_bytes.is_none() {
            total_bytes = stream.total_bytes;
        }

        if let Some(parent) = dest_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| CoreError::Io(err.to_string()))?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(dest_path)
            .map_err(|err| CoreError::Io(err.to_string()))?;

        let mut buffer = vec![0u8; 1024 * 64];
        let mut downloaded = 0u64;
        let mut last_emit = 0u64;
        loop {
            let read = stream
                .reader
                .read(&mut buffer)
                .map_err(|err| CoreError::Network(err.to_string()))?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .map_err(|err| CoreError::Io(err.to_string()))?;
            downloaded += read as u64;
            if downloaded - last_emit >= self.config.progress_interval_bytes {
                last_emit = downloaded;
                progress(DownloadProgress {
                    downloaded_bytes: downloaded,
                    total_bytes,
                });
            }
        }

        // Final update so listeners always see the finished byte count.
        progress(DownloadProgress {
            downloaded_bytes: downloaded,
            total_bytes: total_bytes.or(Some(downloaded)),
        });
        Ok(downloaded)
    }
}

impl Downloader for HttpDownloader {
    fn download(
        &self,
        params: &DownloadParams,
        progress: &mut dyn FnMut(DownloadProgress),
    ) -> CoreResult<DownloadOutcome> {
        let mut req = FetchRequest::new(params.url.clone(), self.config.user_agent.clone());
        req.headers = params.headers.clone();

        // A failed or unsuccessful probe is not fatal, servers that reject
        // HEAD can still serve the GET.
        let probe = self
            .net
            .probe(&req)
            .ok()
            .filter(|probe| (200..400).contains(&probe.status_code));
        let total_bytes = probe.as_ref().and_then(|p| p.total_bytes);
        let content_disposition = probe.as_ref().and_then(|p| p.content_disposition.clone());

        let dest_path = resolve_dest_path(
            self.config.download_dir.as_deref(),
            &params.url,
            content_disposition.as_deref(),
            &params.episode_title,
        );

        let backoff = Duration::from_secs(self.config.retry_backoff_secs);
        let mut last_error: Option<CoreError> = None;
        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                thread::sleep(backoff);
            }
            match self.fetch_to_file(&req, &dest_path, total_bytes, progress) {
                Ok(written) => {
                    return Ok(DownloadOutcome {
                        dest_path: dest_path.to_string_lossy().to_string(),
                        total_bytes: total_bytes.unwrap_or(written),
                    });
                }
                Err(err) => last_error = Some(err),
            }
        }

        Err(last_error
            .unwrap_or_else(|| CoreError::Download(format!("failed to download {}", params.url))))
    }
}

pub(crate) fn resolve_dest_path(
    download_dir: Option<&str>,
    url: &str,
    content_disposition: Option<&str>,
    episode_title: &str,
) -> PathBuf {
    let dir = match download_dir {
        Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => default_download_dir(),
    };
    let filename = filename_from_content_disposition(content_disposition)
        .or_else(|| filename_from_url(url))
        .unwrap_or_else(|| format!("{}.mp4", episode_title));
    dir.join(sanitize_filename(&filename))
}

pub(crate) fn default_download_dir() -> PathBuf {
    if let Ok(dir) = env::var("ANIDM_DOWNLOAD_DIR") {
        return PathBuf::from(dir);
    }
    let home = env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    let downloads = PathBuf::from(&home).join("Downloads");
    if downloads.exists() {
        return downloads;
    }
    PathBuf::from("/tmp")
}

pub(crate) fn filename_from_content_disposition(value: Option<&str>) -> Option<String> {
    let value = value?;
    for part in value.split(';') {
        let part = part.trim();
        if part.to_ascii_lowercase().starts_with("filename=") {
            let raw = part.splitn(2, '=').nth(1)?.trim().trim_matches('"');
            if !raw.is_empty() {
                return Some(raw.to_string());
            }
        }
    }
    None
}

pub(crate) fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let name = parsed.path().rsplit('/').next().unwrap_or("");
    if name.is_empty() {
        return None;
    }
    let decoded = percent_decode(name).replace('+', " ");
    if decoded.contains('.') {
        Some(decoded)
    } else {
        None
    }
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut index = 0usize;
    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[index + 1]), hex_value(bytes[index + 2]))
            {
                let decoded = (hi << 4) | lo;
                if decoded == b' ' || decoded.is_ascii_graphic() {
                    out.push(decoded as char);
                } else {
                    out.push('_');
                }
                index += 3;
                continue;
            }
        }
        let ch = bytes[index];
        if ch.is_ascii() {
            out.push(ch as char);
        } else {
            out.push('_');
        }
        index += 1;
    }
    out
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

pub(crate) fn sanitize_filename(name: &str) -> String {
    let mut out = String::new();
    let mut last_was_sep = false;
    for ch in name.chars() {
        let allowed = ch.is_ascii_alphanumeric()
            || matches!(ch, '.' | '_' | '-' | ' ' | ';' | '(' | ')' | '[' | ']');
        let mapped = if allowed { ch } else { '_' };
        if mapped == '_' || mapped == ' ' {
            if last_was_sep {
                continue;
            }
            last_was_sep = true;
        } else {
            last_was_sep = false;
        }
        out.push(mapped);
    }
    let trimmed = out.trim_matches(&[' ', '.', '_'][..]);
    if trimmed.is_empty() {
        "episode.mp4".to_string()
    } else {
        trimmed.to_string()
    }
}
