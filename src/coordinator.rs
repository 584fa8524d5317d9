use crate::models::{ConversationTurn, Document};
use crate::registry::{DocumentRegistry, Refreshed, Removed};
use crate::session::{QueryPhase, QuerySession, SubmitOutcome, UploadOutcome, UploadPhase, UploadSession};
use crate::transport::{FileBlob, RemoteError, Transport};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Everything a front end needs to draw the current state.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub documents: Vec<Document>,
    pub selected: Option<Document>,
    pub turns: Vec<ConversationTurn>,
    pub query_phase: QueryPhase,
    pub can_ask: bool,
    pub upload_phase: UploadPhase,
}

/// Binds registry events to the upload and query sessions.
pub struct SessionCoordinator {
    transport: Arc<dyn Transport>,
    registry: DocumentRegistry,
    upload: UploadSession,
    query: Mutex<Arc<QuerySession>>,
}

impl SessionCoordinator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            registry: DocumentRegistry::new(transport.clone()),
            upload: UploadSession::new(transport.clone()),
            query: Mutex::new(Arc::new(QuerySession::new(transport.clone(), None))),
            transport,
        }
    }

    pub fn with_upload_timing(mut self, tick: Duration, success_delay: Duration) -> Self {
        self.upload = self.upload.with_timing(tick, success_delay);
        self
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    pub fn upload_session(&self) -> &UploadSession {
        &self.upload
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    fn query_slot(&self) -> MutexGuard<'_, Arc<QuerySession>> {
        self.query.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_query(&self) -> Arc<QuerySession> {
        self.query_slot().clone()
    }

    fn reset_query(&self, document: Option<Document>) {
        let session = Arc::new(QuerySession::new(self.transport.clone(), document));
        debug!(
            instance = %session.instance_id(),
            document_id = ?session.document().map(|d| d.id.as_str()),
            "conversation reset"
        );
        *self.query_slot() = session;
    }

    /// Reload the document list from the service.
    pub async fn refresh(&self) -> Result<(), RemoteError> {
        if self.registry.load_all().await? {
            self.reset_query(None);
        }
        Ok(())
    }

    /// Upload, then add the new document and select it.
    pub async fn upload(&self, file: FileBlob) -> UploadOutcome {
        let outcome = self.upload.upload(file).await;
        if let UploadOutcome::Uploaded(receipt) = &outcome {
            self.registry.add_front(receipt.document.clone());
            self.select(Some(&receipt.document.id));
        }
        outcome
    }

    /// Always starts a fresh conversation, even when nothing changed.
    pub fn select(&self, id: Option<&str>) -> Option<Document> {
        let selected = self.registry.select(id);
        self.reset_query(selected.clone());
        selected
    }

    pub async fn delete(&self, id: &str) -> Result<Option<Removed>, RemoteError> {
        let removed = self.registry.delete(id).await?;
        if removed.as_ref().is_some_and(|r| r.was_selected) {
            self.reset_query(None);
        }
        Ok(removed)
    }

    pub async fn refresh_document(&self, id: &str) -> Result<Refreshed, RemoteError> {
        let refreshed = self.registry.refresh_one(id).await?;
        if let Refreshed::Gone(Some(removed)) = &refreshed {
            if removed.was_selected {
                self.reset_query(None);
            }
        }
        Ok(refreshed)
    }

    /// Ask the current conversation. An answer that lands after the
    /// conversation was replaced is reported as `Superseded`.
    pub async fn ask(&self, question: &str) -> SubmitOutcome {
        let session = self.current_query();
        let outcome = session.submit(question).await;
        if matches!(outcome, SubmitOutcome::Rejected(_)) {
            return outcome;
        }
        if self.current_query().instance_id() != session.instance_id() {
            info!(instance = %session.instance_id(), "discarding answer for a replaced conversation");
            return SubmitOutcome::Superseded;
        }
        outcome
    }

    pub fn view(&self) -> SessionView {
        let registry = self.registry.snapshot();
        let query = self.current_query();
        SessionView {
            documents: registry.documents().to_vec(),
            selected: registry.selected().cloned(),
            turns: query.turns(),
            query_phase: query.phase(),
            can_ask: query.is_enabled() && query.phase() == QueryPhase::Idle,
            upload_phase: self.upload.phase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TurnRole;
    use crate::session::Rejection;
    use crate::transport::mock::{doc, MockTransport};
    use crate::transport::{Answer, Operation};

    fn coordinator(mock: &MockTransport) -> SessionCoordinator {
        SessionCoordinator::new(Arc::new(mock.clone()))
            .with_upload_timing(Duration::from_millis(50), Duration::from_millis(100))
    }

    async fn uploaded(mock: &MockTransport, coord: &SessionCoordinator) {
        mock.push_upload(Ok(doc("d1", "report.pdf", 5, 12)));
        let file = FileBlob::new("report.pdf", vec![0u8; 10 * 1024 * 1024]);
        assert!(matches!(coord.upload(file).await, UploadOutcome::Uploaded(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_adds_selects_and_seeds() {
        let mock = MockTransport::new();
        let coord = coordinator(&mock);
        uploaded(&mock, &coord).await;

        let view = coord.view();
        assert_eq!(view.documents.len(), 1);
        assert_eq!(view.selected.as_ref().map(|d| d.id.as_str()), Some("d1"));
        assert_eq!(view.turns.len(), 1);
        assert!(view.turns[0].text.contains("5 pages"));
        assert!(view.turns[0].text.contains("12 chunks"));
        assert!(view.can_ask);
        assert_eq!(view.upload_phase, UploadPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_question_round_trip() {
        let mock = MockTransport::new();
        let coord = coordinator(&mock);
        uploaded(&mock, &coord).await;
        mock.push_answer(Ok(Answer {
            answer: "It is a summary.".into(),
            sources: vec!["p.2: ...".into()],
        }));

        assert!(matches!(coord.ask("What is the summary?").await, SubmitOutcome::Answered(_)));
        let turns = coord.view().turns;
        assert_eq!(turns.len(), 3);
        assert_eq!((turns[1].role, turns[1].text.as_str()), (TurnRole::User, "What is the summary?"));
        assert_eq!(turns[2].text, "It is a summary.");
        assert_eq!(turns[2].sources.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_question_is_ignored() {
        let mock = MockTransport::new();
        let coord = coordinator(&mock);
        uploaded(&mock, &coord).await;

        assert_eq!(coord.ask("").await, SubmitOutcome::Rejected(Rejection::EmptyQuestion));
        assert_eq!(coord.view().turns.len(), 1);
        assert_eq!(mock.calls_to(Operation::Query), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_selected_clears_conversation() {
        let mock = MockTransport::new();
        let coord = coordinator(&mock);
        uploaded(&mock, &coord).await;
        mock.push_delete(Ok("Document deleted successfully".into()));

        let removed = coord.delete("d1").await.unwrap().unwrap();
        assert!(removed.was_selected);
        let view = coord.view();
        assert!(view.documents.is_empty());
        assert!(view.selected.is_none());
        assert!(view.turns.is_empty());
        assert!(!view.can_ask);
    }

    #[tokio::test]
    async fn test_delete_other_keeps_conversation() {
        let mock = MockTransport::new();
        mock.push_list(Ok(vec![doc("a", "a.pdf", 1, 1), doc("b", "b.pdf", 2, 2)]));
        mock.push_delete(Ok("Document deleted successfully".into()));
        let coord = coordinator(&mock);
        coord.refresh().await.unwrap();
        coord.select(Some("a"));
        let instance = coord.current_query().instance_id();

        coord.delete("b").await.unwrap();
        assert_eq!(coord.current_query().instance_id(), instance);
        assert_eq!(coord.view().documents.len(), 1);
    }

    #[tokio::test]
    async fn test_select_resets_every_time() {
        let mock = MockTransport::new();
        mock.push_list(Ok(vec![doc("a", "a.pdf", 3, 7)]));
        let coord = coordinator(&mock);
        coord.refresh().await.unwrap();

        coord.select(Some("a"));
        let first = coord.current_query().instance_id();
        coord.select(Some("a"));
        assert_ne!(coord.current_query().instance_id(), first);
        assert_eq!(coord.view().turns.len(), 1);

        assert!(coord.select(Some("missing")).is_none());
        let view = coord.view();
        assert!(view.selected.is_none());
        assert!(view.turns.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_drops_vanished_selection() {
        let mock = MockTransport::new();
        mock.push_list(Ok(vec![doc("a", "a.pdf", 1, 1)]));
        mock.push_list(Ok(vec![doc("b", "b.pdf", 1, 1)]));
        let coord = coordinator(&mock);
        coord.refresh().await.unwrap();
        coord.select(Some("a"));

        coord.refresh().await.unwrap();
        let view = coord.view();
        assert!(view.selected.is_none());
        assert!(view.turns.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_for_deleted_document_is_discarded() {
        let mock = MockTransport::new().with_op_latency(Operation::Query, Duration::from_secs(1));
        mock.push_list(Ok(vec![doc("d1", "report.pdf", 5, 12)]));
        mock.push_answer(Ok(Answer {
            answer: "late answer".into(),
            sources: vec![],
        }));
        mock.push_delete(Ok("Document deleted successfully".into()));
        let coord = coordinator(&mock);
        coord.refresh().await.unwrap();
        coord.select(Some("d1"));

        let delete = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            coord.delete("d1").await
        };
        let (asked, deleted) = tokio::join!(coord.ask("still there?"), delete);
        assert!(deleted.unwrap().unwrap().was_selected);
        assert_eq!(asked, SubmitOutcome::Superseded);
        assert!(coord.view().turns.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_upload_leaves_registry_alone() {
        let mock = MockTransport::new();
        mock.push_upload(Err(RemoteError::new(Operation::Upload, Some(500), "Error processing document: empty")));
        let coord = coordinator(&mock);

        let outcome = coord.upload(FileBlob::new("empty.pdf", Vec::new())).await;
        assert!(matches!(outcome, UploadOutcome::Failed(_)));
        let view = coord.view();
        assert!(view.documents.is_empty());
        assert!(view.upload_phase.error().is_some());
    }
}
