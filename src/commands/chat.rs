use crate::coordinator::SessionCoordinator;
use crate::models::ConversationTurn;
use crate::session::SubmitOutcome;

/// Ask about the selected document. An `Ok` turn may still be an error turn;
/// `Err` means nothing was asked or the answer no longer applies.
pub async fn ask(coordinator: &SessionCoordinator, question: String) -> Result<ConversationTurn, String> {
    match coordinator.ask(&question).await {
        SubmitOutcome::Answered(turn) | SubmitOutcome::Failed(turn) => Ok(turn),
        SubmitOutcome::Rejected(reason) => Err(reason.to_string()),
        SubmitOutcome::Superseded => Err("The document changed before the answer arrived".into()),
    }
}

pub fn get_turns(coordinator: &SessionCoordinator) -> Vec<ConversationTurn> {
    coordinator.current_query().turns()
}
