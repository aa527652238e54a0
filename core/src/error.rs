use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("download already in progress: {0}")]
    DuplicateInProgress(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("io error: {0}")]
    Io(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
