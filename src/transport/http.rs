use super::{Answer, FileBlob, Health, Operation, RemoteError, Transport, UploadReceipt};
use crate::models::Document;
use async_trait::async_trait;
use reqwest::{multipart, Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    document_id: &'a str,
    question: &'a str,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    document: Option<Document>,
}

#[derive(Deserialize)]
struct DocumentListResponse {
    documents: Vec<Document>,
}

#[derive(Deserialize)]
struct DeleteResponse {
    success: bool,
    #[serde(default)]
    message: String,
}

/// Talks to the document service over HTTP.
pub struct HttpTransport {
    client: Client,
    config: HttpConfig,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// `/documents/{id}` with the id escaped as a single path segment.
    fn document_url(&self, operation: Operation, document_id: &str) -> Result<Url, RemoteError> {
        let mut url = Url::parse(&self.url("/documents")).map_err(|e| {
            warn!(%operation, error = %e, "invalid base url");
            RemoteError::fallback(operation, None)
        })?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::fallback(operation, None))?
            .push(document_id);
        Ok(url)
    }

    async fn read<T: DeserializeOwned>(
        operation: Operation,
        sent: Result<Response, reqwest::Error>,
    ) -> Result<T, RemoteError> {
        let resp = sent.map_err(|e| {
            warn!(%operation, error = %e, "request did not complete");
            RemoteError::fallback(operation, None)
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let err = RemoteError::from_body(operation, status.as_u16(), &text);
            warn!(%operation, status = status.as_u16(), message = %err.message, "request rejected");
            return Err(err);
        }

        resp.json::<T>().await.map_err(|e| {
            warn!(%operation, error = %e, "malformed response body");
            RemoteError::fallback(operation, Some(status.as_u16()))
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn upload(&self, file: &FileBlob) -> Result<UploadReceipt, RemoteError> {
        debug!(filename = %file.filename, size = file.size(), "uploading document");
        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str("application/pdf")
            .map_err(|_| RemoteError::fallback(Operation::Upload, None))?;
        let form = multipart::Form::new().part("file", part);

        let sent = self
            .client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await;
        let data: UploadResponse = Self::read(Operation::Upload, sent).await?;

        match data.document {
            Some(document) if data.success => Ok(UploadReceipt {
                document,
                message: data.message,
            }),
            _ if !data.message.is_empty() => {
                Err(RemoteError::new(Operation::Upload, None, data.message))
            }
            _ => Err(RemoteError::fallback(Operation::Upload, None)),
        }
    }

    async fn query(&self, document_id: &str, question: &str) -> Result<Answer, RemoteError> {
        debug!(document_id, "querying document");
        let sent = self
            .client
            .post(self.url("/query"))
            .json(&QueryRequest {
                document_id,
                question,
            })
            .send()
            .await;
        Self::read(Operation::Query, sent).await
    }

    async fn list(&self) -> Result<Vec<Document>, RemoteError> {
        let sent = self.client.get(self.url("/documents")).send().await;
        let data: DocumentListResponse = Self::read(Operation::List, sent).await?;
        Ok(data.documents)
    }

    async fn fetch(&self, document_id: &str) -> Result<Document, RemoteError> {
        let url = self.document_url(Operation::Fetch, document_id)?;
        let sent = self.client.get(url).send().await;
        Self::read(Operation::Fetch, sent).await
    }

    async fn delete(&self, document_id: &str) -> Result<String, RemoteError> {
        debug!(document_id, "deleting document");
        let url = self.document_url(Operation::Delete, document_id)?;
        let sent = self.client.delete(url).send().await;
        let data: DeleteResponse = Self::read(Operation::Delete, sent).await?;
        if data.success {
            Ok(data.message)
        } else if data.message.is_empty() {
            Err(RemoteError::fallback(Operation::Delete, None))
        } else {
            Err(RemoteError::new(Operation::Delete, None, data.message))
        }
    }

    async fn health(&self) -> Result<Health, RemoteError> {
        let sent = self.client.get(self.url("/")).send().await;
        Self::read(Operation::Health, sent).await
    }
}
