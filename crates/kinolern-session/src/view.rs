use crate::Session;
use kinolern_core::{chunk, Candidate, FeedbackMap, Round, ROW_SIZE};
use serde::Serialize;

/// Read-only snapshot of a session for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    /// Number the active round gets once it is committed.
    pub round_number: u32,
    pub rounds: Vec<Round>,
    /// Active candidates in display rows of [`ROW_SIZE`].
    pub candidate_rows: Vec<Vec<Candidate>>,
    pub feedback: FeedbackMap,
    pub buttons_disabled: bool,
    pub expand_disabled: bool,
    pub error_message: Option<String>,
}

impl Session {
    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            round_number: self.next_round_number(),
            rounds: self.rounds(),
            candidate_rows: chunk(self.candidates(), ROW_SIZE),
            feedback: self.feedback().clone(),
            buttons_disabled: self.is_pending(),
            expand_disabled: !self.expand_available(),
            error_message: self.error_message().map(str::to_string),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use kinolern_core::{ItemIndex, RecommendResponse};
    use serde_json::json;

    #[test]
    fn view_chunks_candidates_and_tracks_pending() {
        let mut session = Session::new();
        let call = session.begin_start().unwrap();
        assert!(session.view().buttons_disabled);
        assert!(session.view().expand_disabled);

        let candidates = (1..=7).map(|i| Candidate::new(ItemIndex(i))).collect();
        session
            .complete(call, Ok(RecommendResponse { candidates }))
            .unwrap();

        let view = session.view();
        assert_eq!(view.round_number, 1);
        assert_eq!(view.candidate_rows.len(), 2);
        assert_eq!(view.candidate_rows[1].len(), 2);
        assert!(!view.buttons_disabled);
        assert!(!view.expand_disabled);
        assert!(view.error_message.is_none());
    }

    #[test]
    fn view_serializes_for_renderers() {
        let session = Session::new();
        let value = serde_json::to_value(session.view()).unwrap();
        assert_eq!(
            value,
            json!({
                "round_number": 1,
                "rounds": [],
                "candidate_rows": [],
                "feedback": {},
                "buttons_disabled": false,
                "expand_disabled": false,
                "error_message": null
            })
        );
    }
}
