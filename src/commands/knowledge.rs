use crate::coordinator::SessionCoordinator;
use crate::models::Document;
use crate::registry::Refreshed;
use crate::session::UploadOutcome;
use crate::transport::{FileBlob, UploadReceipt};
use std::path::Path;

pub fn list_documents(coordinator: &SessionCoordinator) -> Vec<Document> {
    coordinator.registry().snapshot().documents().to_vec()
}

pub async fn refresh_documents(coordinator: &SessionCoordinator) -> Result<Vec<Document>, String> {
    coordinator.refresh().await.map_err(|e| e.to_string())?;
    Ok(list_documents(coordinator))
}

pub async fn upload_document(
    coordinator: &SessionCoordinator,
    file_path: String,
) -> Result<UploadReceipt, String> {
    let file = FileBlob::from_path(Path::new(&file_path))
        .map_err(|e| format!("Cannot read {file_path}: {e}"))?;

    match coordinator.upload(file).await {
        UploadOutcome::Uploaded(receipt) => Ok(receipt),
        UploadOutcome::Failed(failure) => Err(failure.to_string()),
        UploadOutcome::Busy => Err("An upload is already in progress".into()),
    }
}

pub async fn delete_document(coordinator: &SessionCoordinator, id: String) -> Result<(), String> {
    coordinator.delete(&id).await.map_err(|e| e.to_string())?;
    Ok(())
}

pub fn select_document(coordinator: &SessionCoordinator, id: Option<String>) -> Option<Document> {
    coordinator.select(id.as_deref())
}

/// Returns `None` when the service no longer knows the document.
pub async fn refresh_document(
    coordinator: &SessionCoordinator,
    id: String,
) -> Result<Option<Document>, String> {
    match coordinator.refresh_document(&id).await.map_err(|e| e.to_string())? {
        Refreshed::Updated(doc) => Ok(Some(doc)),
        Refreshed::Gone(_) => Ok(None),
    }
}
