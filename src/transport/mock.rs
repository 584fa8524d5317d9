//! Scripted transport for tests.
//!
//! Responses are queued per operation and consumed in order; an empty queue
//! yields the operation's fallback error. Every call is recorded.

use super::{Answer, FileBlob, Health, Operation, RemoteError, Transport, UploadReceipt};
use crate::models::Document;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub operation: Operation,
    pub input: String,
}

#[derive(Default)]
struct Script {
    uploads: VecDeque<Result<UploadReceipt, RemoteError>>,
    answers: VecDeque<Result<Answer, RemoteError>>,
    lists: VecDeque<Result<Vec<Document>, RemoteError>>,
    fetches: VecDeque<Result<Document, RemoteError>>,
    deletes: VecDeque<Result<String, RemoteError>>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    latency: Duration,
    op_latency: HashMap<Operation, Duration>,
}

pub fn doc(id: &str, filename: &str, page_count: u32, chunk_count: u32) -> Document {
    Document {
        id: id.to_string(),
        filename: filename.to_string(),
        page_count,
        chunk_count,
        upload_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Latency for one operation only, overriding `with_latency`.
    pub fn with_op_latency(mut self, operation: Operation, latency: Duration) -> Self {
        self.op_latency.insert(operation, latency);
        self
    }

    pub fn push_upload(&self, result: Result<Document, RemoteError>) {
        let receipt = result.map(|document| UploadReceipt {
            message: format!(
                "Successfully processed '{}' ({} pages, {} chunks)",
                document.filename, document.page_count, document.chunk_count
            ),
            document,
        });
        self.script.lock().unwrap().uploads.push_back(receipt);
    }

    pub fn push_answer(&self, result: Result<Answer, RemoteError>) {
        self.script.lock().unwrap().answers.push_back(result);
    }

    pub fn push_list(&self, result: Result<Vec<Document>, RemoteError>) {
        self.script.lock().unwrap().lists.push_back(result);
    }

    pub fn push_fetch(&self, result: Result<Document, RemoteError>) {
        self.script.lock().unwrap().fetches.push_back(result);
    }

    pub fn push_delete(&self, result: Result<String, RemoteError>) {
        self.script.lock().unwrap().deletes.push_back(result);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    async fn record(&self, operation: Operation, input: impl Into<String>) {
        self.calls.lock().unwrap().push(MockCall {
            operation,
            input: input.into(),
        });
        let latency = self.op_latency.get(&operation).copied().unwrap_or(self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

fn next<T>(queue: &mut VecDeque<Result<T, RemoteError>>, operation: Operation) -> Result<T, RemoteError> {
    queue
        .pop_front()
        .unwrap_or_else(|| Err(RemoteError::fallback(operation, None)))
}

#[async_trait]
impl Transport for MockTransport {
    async fn upload(&self, file: &FileBlob) -> Result<UploadReceipt, RemoteError> {
        self.record(Operation::Upload, file.filename.clone()).await;
        next(&mut self.script.lock().unwrap().uploads, Operation::Upload)
    }

    async fn query(&self, document_id: &str, question: &str) -> Result<Answer, RemoteError> {
        self.record(Operation::Query, format!("{document_id}:{question}")).await;
        next(&mut self.script.lock().unwrap().answers, Operation::Query)
    }

    async fn list(&self) -> Result<Vec<Document>, RemoteError> {
        self.record(Operation::List, "").await;
        next(&mut self.script.lock().unwrap().lists, Operation::List)
    }

    async fn fetch(&self, document_id: &str) -> Result<Document, RemoteError> {
        self.record(Operation::Fetch, document_id).await;
        next(&mut self.script.lock().unwrap().fetches, Operation::Fetch)
    }

    async fn delete(&self, document_id: &str) -> Result<String, RemoteError> {
        self.record(Operation::Delete, document_id).await;
        next(&mut self.script.lock().unwrap().deletes, Operation::Delete)
    }

    async fn health(&self) -> Result<Health, RemoteError> {
        self.record(Operation::Health, "").await;
        Ok(Health {
            status: "healthy".into(),
            service: "Document RAG API".into(),
        })
    }
}
