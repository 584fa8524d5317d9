use crate::models::{ConversationTurn, Document};
use crate::transport::Transport;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The service refuses longer questions.
pub const MAX_QUESTION_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryPhase {
    #[default]
    Idle,
    Submitting,
    AwaitingResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEvent {
    Accepted,
    Sent,
    Resolved,
}

pub fn transition(phase: QueryPhase, event: QueryEvent) -> Option<QueryPhase> {
    match (phase, event) {
        (QueryPhase::Idle, QueryEvent::Accepted) => Some(QueryPhase::Submitting),
        (QueryPhase::Submitting, QueryEvent::Sent) => Some(QueryPhase::AwaitingResponse),
        (QueryPhase::AwaitingResponse, QueryEvent::Resolved) => Some(QueryPhase::Idle),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Question is empty")]
    EmptyQuestion,
    #[error("Question is longer than 1000 characters")]
    TooLong,
    #[error("No document selected")]
    NoDocument,
    #[error("Still waiting for the previous answer")]
    InFlight,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Answered(ConversationTurn),
    /// The failure was recorded as an error turn.
    Failed(ConversationTurn),
    Rejected(Rejection),
    /// The session was replaced while the answer was outstanding.
    Superseded,
}

#[derive(Debug, Default)]
struct Conversation {
    turns: Vec<ConversationTurn>,
    phase: QueryPhase,
    next_id: u64,
}

impl Conversation {
    fn push(&mut self, make: impl FnOnce(u64) -> ConversationTurn) -> ConversationTurn {
        self.next_id += 1;
        let turn = make(self.next_id);
        self.turns.push(turn.clone());
        turn
    }

    fn advance(&mut self, event: QueryEvent) -> bool {
        match transition(self.phase, event) {
            Some(next) => {
                self.phase = next;
                true
            }
            None => false,
        }
    }
}

fn plural(n: u32, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

pub fn ready_message(doc: &Document) -> String {
    format!(
        "Document \"{}\" is ready ({}, {}). Ask me anything about it.",
        doc.filename,
        plural(doc.page_count, "page"),
        plural(doc.chunk_count, "chunk")
    )
}

/// Conversation about one selected document, or a disabled empty one.
///
/// Sessions are never retargeted: a selection change builds a new one.
pub struct QuerySession {
    instance: Uuid,
    document: Option<Document>,
    transport: Arc<dyn Transport>,
    state: Mutex<Conversation>,
}

impl QuerySession {
    pub fn new(transport: Arc<dyn Transport>, document: Option<Document>) -> Self {
        let mut conversation = Conversation::default();
        if let Some(doc) = &document {
            conversation.push(|id| ConversationTurn::assistant(id, ready_message(doc), Vec::new()));
        }
        Self {
            instance: Uuid::new_v4(),
            document,
            transport,
            state: Mutex::new(conversation),
        }
    }

    fn state(&self) -> MutexGuard<'_, Conversation> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.document.is_some()
    }

    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.state().turns.clone()
    }

    pub fn phase(&self) -> QueryPhase {
        self.state().phase
    }

    /// Ask one question. The user turn is appended before the request goes
    /// out; failures come back as an error turn, never as an `Err`.
    pub async fn submit(&self, question: &str) -> SubmitOutcome {
        let question = question.trim();
        let Some(doc) = &self.document else {
            return SubmitOutcome::Rejected(Rejection::NoDocument);
        };
        if question.is_empty() {
            return SubmitOutcome::Rejected(Rejection::EmptyQuestion);
        }
        if question.chars().count() > MAX_QUESTION_CHARS {
            return SubmitOutcome::Rejected(Rejection::TooLong);
        }

        {
            let mut state = self.state();
            if !state.advance(QueryEvent::Accepted) {
                debug!(document_id = %doc.id, "question already in flight, ignoring");
                return SubmitOutcome::Rejected(Rejection::InFlight);
            }
            state.push(|id| ConversationTurn::user(id, question));
            state.advance(QueryEvent::Sent);
        }

        let result = self.transport.query(&doc.id, question).await;

        let mut state = self.state();
        state.advance(QueryEvent::Resolved);
        match result {
            Ok(answer) => {
                info!(document_id = %doc.id, sources = answer.sources.len(), "answer received");
                let turn = state.push(|id| ConversationTurn::assistant(id, answer.answer, answer.sources));
                SubmitOutcome::Answered(turn)
            }
            Err(err) => {
                warn!(document_id = %doc.id, message = %err.message, "query failed");
                let turn = state.push(|id| ConversationTurn::error(id, &err.message));
                SubmitOutcome::Failed(turn)
            }
        }
    }
}
