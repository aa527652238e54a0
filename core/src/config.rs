#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub download_dir: Option<String>,
    pub user_agent: String,
    pub progress_interval_bytes: u64,
    pub retry_count: u32,
    pub retry_backoff_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: None,
            user_agent: "AniDM/0.1".to_string(),
            progress_interval_bytes: 256 * 1024,
            retry_count: 3,
            retry_backoff_secs: 2,
        }
    }
}
