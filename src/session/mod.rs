pub mod query;
pub mod upload;

pub use query::{QueryPhase, QuerySession, Rejection, SubmitOutcome};
pub use upload::{UploadFailure, UploadOutcome, UploadPhase, UploadSession, ValidationError};
