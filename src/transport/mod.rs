pub mod http;
#[cfg(test)]
pub mod mock;

use crate::models::Document;
use crate::session::upload::check as check_upload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A file picked or dropped by the user, held in memory until uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct FileBlob {
    pub filename: String,
    pub bytes: Vec<u8>,
    size: u64,
}

impl FileBlob {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            size: bytes.len() as u64,
            bytes,
        }
    }

    /// Stats the file first. Contents are only read when the name and size
    /// pass upload validation; otherwise the blob carries just the size.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let size = std::fs::metadata(path)?.len();
        if check_upload(&filename, size).is_err() {
            return Ok(Self {
                filename,
                bytes: Vec::new(),
                size,
            });
        }
        let bytes = std::fs::read(path)?;
        Ok(Self::new(filename, bytes))
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadReceipt {
    pub document: Document,
    /// Confirmation text from the service, e.g. page and chunk totals.
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Answer {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Health {
    pub status: String,
    pub service: String,
}

/// The remote operations, used to pick the fallback error message.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Upload,
    Query,
    List,
    Fetch,
    Delete,
    Health,
}

impl Operation {
    pub fn default_message(self) -> &'static str {
        match self {
            Operation::Upload => "Upload failed",
            Operation::Query => "Failed to get response",
            Operation::List => "Failed to load documents",
            Operation::Fetch => "Failed to load document",
            Operation::Delete => "Failed to delete document",
            Operation::Health => "Service unavailable",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Upload => "upload",
            Operation::Query => "query",
            Operation::List => "list",
            Operation::Fetch => "fetch",
            Operation::Delete => "delete",
            Operation::Health => "health",
        };
        f.write_str(name)
    }
}

/// Normalized failure of any remote operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub operation: Operation,
    /// HTTP status when the service answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(operation: Operation, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            operation,
            status,
            message: message.into(),
        }
    }

    /// Failure with no usable message from the service.
    pub fn fallback(operation: Operation, status: Option<u16>) -> Self {
        Self::new(operation, status, operation.default_message())
    }

    /// Build from a non-success response body. A `detail` string is surfaced
    /// verbatim; a list of validation entries is joined from their `msg`.
    pub fn from_body(operation: Operation, status: u16, body: &str) -> Self {
        match detail_message(body) {
            Some(message) => Self::new(operation, Some(status), message),
            None => Self::fallback(operation, Some(status)),
        }
    }
}

fn detail_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

/// The remote document service. At most one network attempt per call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn upload(&self, file: &FileBlob) -> Result<UploadReceipt, RemoteError>;
    async fn query(&self, document_id: &str, question: &str) -> Result<Answer, RemoteError>;
    async fn list(&self) -> Result<Vec<Document>, RemoteError>;
    async fn fetch(&self, document_id: &str) -> Result<Document, RemoteError>;
    /// Returns the acknowledgement message.
    async fn delete(&self, document_id: &str) -> Result<String, RemoteError>;
    async fn health(&self) -> Result<Health, RemoteError>;
}
