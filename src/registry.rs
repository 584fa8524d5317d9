use crate::models::Document;
use crate::transport::{RemoteError, Transport};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Ordered documents (newest first) plus at most one selection.
///
/// A non-null `selected_id` always names a document in `documents`, and ids
/// are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryState {
    documents: Vec<Document>,
    selected_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Removed {
    pub document: Document,
    pub was_selected: bool,
}

impl RegistryState {
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    pub fn selected(&self) -> Option<&Document> {
        let id = self.selected_id.as_deref()?;
        self.get(id)
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// Replace everything with a server listing. Returns true when the
    /// selection had to be cleared because its document is gone.
    pub fn replace_all(&mut self, documents: Vec<Document>) -> bool {
        let mut unique: Vec<Document> = Vec::with_capacity(documents.len());
        for doc in documents {
            if unique.iter().any(|d| d.id == doc.id) {
                warn!(document_id = %doc.id, "duplicate id in listing, keeping first");
                continue;
            }
            unique.push(doc);
        }
        self.documents = unique;

        let dangling = self
            .selected_id
            .as_deref()
            .is_some_and(|id| self.get(id).is_none());
        if dangling {
            self.selected_id = None;
        }
        dangling
    }

    /// Insert at the head, or replace in place when the id is already known.
    pub fn add_front(&mut self, doc: Document) {
        match self.documents.iter_mut().find(|d| d.id == doc.id) {
            Some(existing) => *existing = doc,
            None => self.documents.insert(0, doc),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Removed> {
        let index = self.documents.iter().position(|d| d.id == id)?;
        let document = self.documents.remove(index);
        let was_selected = self.selected_id.as_deref() == Some(id);
        if was_selected {
            self.selected_id = None;
        }
        Some(Removed {
            document,
            was_selected,
        })
    }

    /// Unknown ids select nothing. Returns the resulting selection.
    pub fn select(&mut self, id: Option<&str>) -> Option<Document> {
        let doc = id.and_then(|id| self.get(id)).cloned();
        self.selected_id = doc.as_ref().map(|d| d.id.clone());
        doc
    }
}

/// What a refresh of one document did to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Refreshed {
    Updated(Document),
    Gone(Option<Removed>),
}

/// Client-side registry of known documents, reconciled against the service.
pub struct DocumentRegistry {
    transport: Arc<dyn Transport>,
    state: Mutex<RegistryState>,
}

impl DocumentRegistry {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: Mutex::new(RegistryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> RegistryState {
        self.state().clone()
    }

    pub fn selected(&self) -> Option<Document> {
        self.state().selected().cloned()
    }

    /// Replace the list with the server's. On failure the stale list stays.
    /// Returns true when the selection was cleared.
    pub async fn load_all(&self) -> Result<bool, RemoteError> {
        let documents = self.transport.list().await?;
        let count = documents.len();
        let cleared = self.state().replace_all(documents);
        info!(count, selection_cleared = cleared, "document list loaded");
        Ok(cleared)
    }

    pub fn add_front(&self, doc: Document) {
        debug!(document_id = %doc.id, filename = %doc.filename, "document added");
        self.state().add_front(doc);
    }

    pub fn remove(&self, id: &str) -> Option<Removed> {
        self.state().remove(id)
    }

    pub fn select(&self, id: Option<&str>) -> Option<Document> {
        let selected = self.state().select(id);
        if id.is_some() && selected.is_none() {
            debug!(document_id = ?id, "unknown document selected, clearing selection");
        }
        selected
    }

    /// Delete remotely, then drop locally once acknowledged.
    pub async fn delete(&self, id: &str) -> Result<Option<Removed>, RemoteError> {
        let message = self.transport.delete(id).await?;
        info!(document_id = id, %message, "document deleted");
        Ok(self.remove(id))
    }

    /// Re-read one document. A 404 drops it from the registry.
    pub async fn refresh_one(&self, id: &str) -> Result<Refreshed, RemoteError> {
        match self.transport.fetch(id).await {
            Ok(doc) => {
                self.state().add_front(doc.clone());
                Ok(Refreshed::Updated(doc))
            }
            Err(err) if err.status == Some(404) => Ok(Refreshed::Gone(self.remove(id))),
            Err(err) => Err(err),
        }
    }
}
