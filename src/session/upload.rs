use crate::models::Document;
use crate::transport::{FileBlob, RemoteError, Transport, UploadReceipt};
use futures::future::{select, Either};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const ACCEPTED_EXTENSION: &str = ".pdf";
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Cosmetic progress never passes this while the request is outstanding.
pub const PROGRESS_CEILING: u8 = 90;
pub const PROGRESS_STEP: u8 = 10;
pub const PROGRESS_TICK: Duration = Duration::from_millis(200);
pub const SUCCESS_DISPLAY_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Only PDF files are allowed")]
    UnsupportedType { filename: String },
    #[error("File size must be less than 50MB")]
    TooLarge { size: u64, limit: u64 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UploadFailure {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum UploadPhase {
    #[default]
    Idle,
    /// `failure` is the previous attempt's error, restored if the drag is cancelled.
    Dragging { failure: Option<UploadFailure> },
    Validating { filename: String },
    Uploading { filename: String, progress: u8 },
    Succeeded { document: Document },
    Failed(UploadFailure),
}

impl UploadPhase {
    pub fn progress(&self) -> u8 {
        match self {
            UploadPhase::Uploading { progress, .. } => *progress,
            UploadPhase::Succeeded { .. } => 100,
            _ => 0,
        }
    }

    /// The upload control is disabled in these phases.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            UploadPhase::Validating { .. } | UploadPhase::Uploading { .. } | UploadPhase::Succeeded { .. }
        )
    }

    pub fn error(&self) -> Option<&UploadFailure> {
        match self {
            UploadPhase::Failed(failure) => Some(failure),
            UploadPhase::Dragging { failure } => failure.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    DragEnter,
    DragLeave,
    FileChosen(String),
    Validated,
    Rejected(ValidationError),
    Tick,
    Completed(Document),
    Errored(RemoteError),
    Reset,
}

/// Next phase for `event`, or `None` when the event does not apply.
pub fn transition(phase: &UploadPhase, event: UploadEvent) -> Option<UploadPhase> {
    use UploadEvent as E;
    use UploadPhase as P;

    match (phase, event) {
        (P::Idle, E::DragEnter) => Some(P::Dragging { failure: None }),
        (P::Failed(failure), E::DragEnter) => Some(P::Dragging {
            failure: Some(failure.clone()),
        }),
        (P::Dragging { failure }, E::DragLeave) => Some(match failure {
            Some(failure) => P::Failed(failure.clone()),
            None => P::Idle,
        }),
        (P::Idle | P::Dragging { .. } | P::Failed(_), E::FileChosen(filename)) => {
            Some(P::Validating { filename })
        }
        (P::Validating { filename }, E::Validated) => Some(P::Uploading {
            filename: filename.clone(),
            progress: 0,
        }),
        (P::Validating { .. }, E::Rejected(err)) => Some(P::Failed(err.into())),
        (P::Uploading { filename, progress }, E::Tick) if *progress < PROGRESS_CEILING => {
            Some(P::Uploading {
                filename: filename.clone(),
                progress: progress.saturating_add(PROGRESS_STEP).min(PROGRESS_CEILING),
            })
        }
        (P::Uploading { .. }, E::Completed(document)) => Some(P::Succeeded { document }),
        (P::Uploading { .. }, E::Errored(err)) => Some(P::Failed(err.into())),
        (P::Succeeded { .. }, E::Reset) => Some(P::Idle),
        _ => None,
    }
}

/// Name and size rules, usable before the contents are read.
pub fn check(filename: &str, size: u64) -> Result<(), ValidationError> {
    if !filename.to_lowercase().ends_with(ACCEPTED_EXTENSION) {
        return Err(ValidationError::UnsupportedType {
            filename: filename.to_string(),
        });
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(ValidationError::TooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

pub fn validate(file: &FileBlob) -> Result<(), ValidationError> {
    check(&file.filename, file.size())
}

#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Uploaded(UploadReceipt),
    Failed(UploadFailure),
    /// Another attempt is still running; nothing was done.
    Busy,
}

/// One upload attempt at a time, with a heuristic progress value.
pub struct UploadSession {
    transport: Arc<dyn Transport>,
    phase: watch::Sender<UploadPhase>,
    tick: Duration,
    success_delay: Duration,
}

impl UploadSession {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (phase, _) = watch::channel(UploadPhase::Idle);
        Self {
            transport,
            phase,
            tick: PROGRESS_TICK,
            success_delay: SUCCESS_DISPLAY_DELAY,
        }
    }

    pub fn with_timing(mut self, tick: Duration, success_delay: Duration) -> Self {
        self.tick = tick;
        self.success_delay = success_delay;
        self
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadPhase> {
        self.phase.subscribe()
    }

    /// Check and apply in one step so two callers cannot both start.
    fn apply(&self, event: UploadEvent) -> bool {
        self.phase.send_if_modified(|phase| match transition(phase, event) {
            Some(next) => {
                *phase = next;
                true
            }
            None => false,
        })
    }

    pub fn drag_enter(&self) -> bool {
        self.apply(UploadEvent::DragEnter)
    }

    pub fn drag_leave(&self) -> bool {
        self.apply(UploadEvent::DragLeave)
    }

    /// Run one attempt to completion. On success the phase stays at
    /// `Succeeded` for the display delay, then returns to `Idle`.
    pub async fn upload(&self, file: FileBlob) -> UploadOutcome {
        if !self.apply(UploadEvent::FileChosen(file.filename.clone())) {
            debug!(filename = %file.filename, "upload already in progress, ignoring");
            return UploadOutcome::Busy;
        }

        if let Err(err) = validate(&file) {
            info!(filename = %file.filename, reason = %err, "upload rejected locally");
            self.apply(UploadEvent::Rejected(err.clone()));
            return UploadOutcome::Failed(err.into());
        }
        self.apply(UploadEvent::Validated);

        let result = self.send_with_progress(&file).await;
        match result {
            Ok(receipt) => {
                info!(document_id = %receipt.document.id, filename = %file.filename, "upload succeeded");
                self.apply(UploadEvent::Completed(receipt.document.clone()));
                tokio::time::sleep(self.success_delay).await;
                self.apply(UploadEvent::Reset);
                UploadOutcome::Uploaded(receipt)
            }
            Err(err) => {
                warn!(filename = %file.filename, message = %err.message, "upload failed");
                self.apply(UploadEvent::Errored(err.clone()));
                UploadOutcome::Failed(err.into())
            }
        }
    }

    async fn send_with_progress(&self, file: &FileBlob) -> Result<UploadReceipt, RemoteError> {
        let mut call = self.transport.upload(file);
        loop {
            let tick = Box::pin(tokio::time::sleep(self.tick));
            match select(call, tick).await {
                Either::Left((result, _)) => return result,
                Either::Right(((), pending)) => {
                    self.apply(UploadEvent::Tick);
                    call = pending;
                }
            }
        }
    }
}
