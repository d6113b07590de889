use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    Unknown,
    InvalidArgument,
    ObjectNotFound,
    Unauthorized,
    Network,
    NoDownloadUrl,
}

impl StorageErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageErrorCode::Unknown => "storage/unknown",
            StorageErrorCode::InvalidArgument => "storage/invalid-argument",
            StorageErrorCode::ObjectNotFound => "storage/object-not-found",
            StorageErrorCode::Unauthorized => "storage/unauthorized",
            StorageErrorCode::Network => "storage/network-request-failed",
            StorageErrorCode::NoDownloadUrl => "storage/no-download-url",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    pub code: StorageErrorCode,
    message: String,
    pub status: Option<u16>,
}

impl StorageError {
    pub fn new(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({}, HTTP {status})", self.message, self.code_str()),
            None => write!(f, "{} ({})", self.message, self.code_str()),
        }
    }
}

impl Error for StorageError {}

pub type StorageResult<T> = Result<T, StorageError>;

pub fn invalid_argument(message: impl Into<String>) -> StorageError {
    StorageError::new(StorageErrorCode::InvalidArgument, message)
}

pub fn no_download_url(path: &str) -> StorageError {
    StorageError::new(
        StorageErrorCode::NoDownloadUrl,
        format!("The object at '{path}' does not expose a download URL yet."),
    )
}
