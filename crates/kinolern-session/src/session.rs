use crate::{RecommendationService, Result, ServiceError, SessionError};
use kinolern_core::{
    neutral_feedback, Candidate, FeedbackMap, ItemIndex, Preference, RecommendRequest,
    RecommendResponse, Round,
};
use std::collections::HashSet;
use std::fmt;

/// The four network-bound operations; also the failure context reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    StartSession,
    SaveRound,
    RefreshRound,
    ExpandRound,
}

impl Operation {
    #[must_use]
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::StartSession => "Unable to start session.",
            Operation::SaveRound => "Unable to save round.",
            Operation::RefreshRound => "Unable to refresh round.",
            Operation::ExpandRound => "Unable to add more movies to round.",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::StartSession => "session-start",
            Operation::SaveRound => "save-round",
            Operation::RefreshRound => "refresh-round",
            Operation::ExpandRound => "expand-round",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to restore the active state of a committed round.
///
/// `exclude` is the exclusion set that was in effect when the round was
/// requested; `feedback` is what the user submitted to leave it.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSnapshot {
    pub candidates: Vec<Candidate>,
    pub feedback: FeedbackMap,
    pub exclude: Vec<ItemIndex>,
    pub expanded: bool,
}

impl RoundSnapshot {
    #[must_use]
    pub fn to_round(&self, number: u32) -> Round {
        Round::new(number, &self.candidates, &self.feedback)
    }
}

/// A request that has been issued but not yet completed.
///
/// Hand it back to [`Session::complete`] together with the service outcome.
#[derive(Debug)]
#[must_use = "a pending call must be completed or the session stays pending"]
pub struct PendingCall {
    ticket: u64,
    operation: Operation,
    request: RecommendRequest,
}

impl PendingCall {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn request(&self) -> &RecommendRequest {
        &self.request
    }
}

// State captured at call time and applied only if the call succeeds.
#[derive(Debug)]
enum Staged {
    Start,
    Advance { submitted: FeedbackMap },
    Refresh { exclude: Vec<ItemIndex> },
    Expand,
}

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    Pending {
        ticket: u64,
        operation: Operation,
        staged: Staged,
    },
}

/// Round/history/exclusion state of one recommendation session.
///
/// Network-bound operations come in two flavours: the async methods
/// ([`Session::initialize`], [`Session::advance_round`], ...) that call the
/// service themselves, and `begin_*` + [`Session::complete`] for callers that
/// drive the request on their own. Either way at most one request is pending;
/// every other mutation is rejected with [`SessionError::Busy`] until it completes.
#[derive(Debug, Default)]
pub struct Session {
    history: Vec<RoundSnapshot>,
    candidates: Vec<Candidate>,
    feedback: FeedbackMap,
    exclude: Vec<ItemIndex>,
    expanded: bool,
    phase: Phase,
    error_message: Option<String>,
    last_ticket: u64,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- async operations -------------------------------------------------

    /// Requests the first candidates with empty history and exclusions.
    pub async fn initialize<S>(&mut self, service: &S) -> Result<()>
    where
        S: RecommendationService + ?Sized,
    {
        let call = self.begin_start()?;
        self.dispatch(service, call).await
    }

    /// Submits the active round's feedback and moves on to the next round.
    pub async fn advance_round<S>(&mut self, service: &S) -> Result<()>
    where
        S: RecommendationService + ?Sized,
    {
        let call = self.begin_advance()?;
        self.dispatch(service, call).await
    }

    /// Replaces the active round's candidates. `confirmed` must be true when
    /// [`Session::refresh_needs_confirmation`] is.
    pub async fn refresh_round<S>(&mut self, service: &S, confirmed: bool) -> Result<()>
    where
        S: RecommendationService + ?Sized,
    {
        let call = self.begin_refresh(confirmed)?;
        self.dispatch(service, call).await
    }

    /// Appends more candidates to the active round. Once per round.
    pub async fn expand_round<S>(&mut self, service: &S) -> Result<()>
    where
        S: RecommendationService + ?Sized,
    {
        let call = self.begin_expand()?;
        self.dispatch(service, call).await
    }

    /// Discards all state, including a pending request, and starts over.
    pub async fn new_session<S>(&mut self, service: &S) -> Result<()>
    where
        S: RecommendationService + ?Sized,
    {
        self.reset();
        self.initialize(service).await
    }

    async fn dispatch<S>(&mut self, service: &S, call: PendingCall) -> Result<()>
    where
        S: RecommendationService + ?Sized,
    {
        debug_event!("{} issued as ticket {}", call.operation(), call.ticket());
        let outcome = service.recommend(call.request()).await;
        self.complete(call, outcome)
    }

    // --- begin / complete -------------------------------------------------

    pub fn begin_start(&mut self) -> Result<PendingCall> {
        self.ensure_idle()?;
        Ok(self.stage(Operation::StartSession, Staged::Start, RecommendRequest::default()))
    }

    pub fn begin_advance(&mut self) -> Result<PendingCall> {
        self.ensure_idle()?;
        let mut rounds = self.committed_feedback();
        rounds.push(self.feedback.clone());
        let request = RecommendRequest {
            rounds,
            exclude: self.exclude.clone(),
        };
        let staged = Staged::Advance {
            submitted: self.feedback.clone(),
        };
        Ok(self.stage(Operation::SaveRound, staged, request))
    }

    pub fn begin_refresh(&mut self, confirmed: bool) -> Result<PendingCall> {
        self.ensure_idle()?;
        if self.refresh_needs_confirmation() && !confirmed {
            return Err(SessionError::ConfirmationRequired);
        }
        // Every candidate of the abandoned round is excluded for good, even
        // though the round itself is never committed.
        let exclude: Vec<ItemIndex> = self
            .feedback
            .keys()
            .copied()
            .chain(self.exclude.iter().copied())
            .collect();
        let request = RecommendRequest {
            rounds: self.committed_feedback(),
            exclude: exclude.clone(),
        };
        Ok(self.stage(Operation::RefreshRound, Staged::Refresh { exclude }, request))
    }

    pub fn begin_expand(&mut self) -> Result<PendingCall> {
        self.ensure_idle()?;
        if self.expanded {
            return Err(SessionError::ExpandUnavailable);
        }
        // Only the visible candidates are excluded here, not the accumulated
        // exclusion set; the service contract decides what that means.
        let request = RecommendRequest {
            rounds: self.committed_feedback(),
            exclude: self.feedback.keys().copied().collect(),
        };
        Ok(self.stage(Operation::ExpandRound, Staged::Expand, request))
    }

    /// Applies the outcome of `call`. On failure nothing but the error
    /// message changes and the session returns to idle.
    pub fn complete(
        &mut self,
        call: PendingCall,
        outcome: std::result::Result<RecommendResponse, ServiceError>,
    ) -> Result<()> {
        match std::mem::take(&mut self.phase) {
            Phase::Pending {
                ticket,
                operation,
                staged,
            } if ticket == call.ticket => self.apply(operation, staged, outcome),
            other => {
                self.phase = other;
                warn_event!(
                    "dropping stale {} completion for ticket {}",
                    call.operation,
                    call.ticket
                );
                Err(SessionError::StaleCompletion {
                    ticket: call.ticket,
                })
            }
        }
    }

    /// Abandons the pending request, if any. Its completion will be rejected
    /// as stale; no other state changes.
    pub fn cancel_pending(&mut self) -> Option<Operation> {
        match std::mem::take(&mut self.phase) {
            Phase::Pending {
                ticket, operation, ..
            } => {
                debug_event!("cancelled {} (ticket {})", operation, ticket);
                Some(operation)
            }
            Phase::Idle => None,
        }
    }

    /// Drops everything, including a pending request. Ticket numbers keep
    /// counting so late completions from before the reset stay detectable.
    pub fn reset(&mut self) {
        let last_ticket = self.last_ticket;
        *self = Session {
            last_ticket,
            ..Session::default()
        };
    }

    // --- synchronous operations -------------------------------------------

    /// Restores the active state to what it was right before round `target`
    /// was requested and drops that round and everything after it.
    pub fn rewind_round(&mut self, target: u32) -> Result<()> {
        self.ensure_idle()?;
        let available = self.history.len();
        let out_of_range = SessionError::RoundOutOfRange {
            requested: target,
            available,
        };
        let idx = match usize::try_from(target) {
            Ok(t) if (1..=available).contains(&t) => t - 1,
            _ => return Err(out_of_range),
        };

        let snapshot = match self.history.split_off(idx).into_iter().next() {
            Some(snapshot) => snapshot,
            None => return Err(out_of_range),
        };
        debug_event!("rewound to round {}", target);

        self.candidates = snapshot.candidates;
        self.feedback = snapshot.feedback;
        self.exclude = snapshot.exclude;
        self.expanded = snapshot.expanded;
        Ok(())
    }

    /// Toggles `item` to `value`, or back to neutral if it already is `value`.
    /// Returns the resulting preference.
    pub fn set_feedback(&mut self, item: ItemIndex, value: Preference) -> Result<Preference> {
        self.ensure_idle()?;
        let slot = self
            .feedback
            .get_mut(&item)
            .ok_or(SessionError::UnknownItem(item))?;
        *slot = if *slot == value {
            Preference::Neutral
        } else {
            value
        };
        Ok(*slot)
    }

    // --- read access ------------------------------------------------------

    /// Completed rounds, numbered 1..=n.
    pub fn rounds(&self) -> Vec<Round> {
        self.history
            .iter()
            .zip(1u32..)
            .map(|(snapshot, number)| snapshot.to_round(number))
            .collect()
    }

    pub fn history(&self) -> &[RoundSnapshot] {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Feedback of every committed round, oldest first.
    pub fn committed_feedback(&self) -> Vec<FeedbackMap> {
        self.history.iter().map(|s| s.feedback.clone()).collect()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn feedback(&self) -> &FeedbackMap {
        &self.feedback
    }

    pub fn exclude(&self) -> &[ItemIndex] {
        &self.exclude
    }

    pub fn preference(&self, item: ItemIndex) -> Option<Preference> {
        self.feedback.get(&item).copied()
    }

    /// Looks up a candidate in the active round first, then in the history.
    pub fn find_candidate(&self, item: ItemIndex) -> Option<&Candidate> {
        self.candidates
            .iter()
            .chain(self.history.iter().rev().flat_map(|s| s.candidates.iter()))
            .find(|c| c.item_index == item)
    }

    /// Number the active round gets once it is committed.
    pub fn next_round_number(&self) -> u32 {
        u32::try_from(self.history.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1)
    }

    /// Sum of absolute preference values in the active round.
    pub fn dirtiness(&self) -> u32 {
        self.feedback.values().map(|p| p.magnitude()).sum()
    }

    pub fn refresh_needs_confirmation(&self) -> bool {
        self.dirtiness() > 0
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Pending { .. })
    }

    pub fn pending_operation(&self) -> Option<Operation> {
        match self.phase {
            Phase::Pending { operation, .. } => Some(operation),
            Phase::Idle => None,
        }
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn expand_available(&self) -> bool {
        !self.expanded && !self.is_pending()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    // --- internals --------------------------------------------------------

    fn ensure_idle(&self) -> Result<()> {
        if self.is_pending() {
            return Err(SessionError::Busy);
        }
        Ok(())
    }

    fn stage(&mut self, operation: Operation, staged: Staged, request: RecommendRequest) -> PendingCall {
        self.last_ticket += 1;
        let ticket = self.last_ticket;
        debug_event!(
            "{} pending (ticket {}, {} rounds, {} exclusions)",
            operation,
            ticket,
            request.rounds.len(),
            request.exclude.len()
        );
        self.phase = Phase::Pending {
            ticket,
            operation,
            staged,
        };
        PendingCall {
            ticket,
            operation,
            request,
        }
    }

    fn apply(
        &mut self,
        operation: Operation,
        staged: Staged,
        outcome: std::result::Result<RecommendResponse, ServiceError>,
    ) -> Result<()> {
        let incoming = match outcome {
            Ok(resp) => resp.candidates,
            Err(source) => {
                warn_event!("{} failed, state rolled back: {}", operation, source);
                self.error_message = Some(operation.failure_message().to_string());
                return Err(SessionError::OperationFailed { operation, source });
            }
        };

        match staged {
            Staged::Start => {
                self.history.clear();
                self.exclude.clear();
                self.expanded = false;
                self.load(operation, incoming);
            }
            Staged::Advance { submitted } => {
                let shown: Vec<ItemIndex> = self.candidates.iter().map(|c| c.item_index).collect();
                self.history.push(RoundSnapshot {
                    candidates: std::mem::take(&mut self.candidates),
                    feedback: submitted,
                    exclude: self.exclude.clone(),
                    expanded: self.expanded,
                });
                // Completed rounds stay excluded on this branch.
                for item in shown {
                    if !self.exclude.contains(&item) {
                        self.exclude.push(item);
                    }
                }
                self.expanded = false;
                self.load(operation, incoming);
            }
            Staged::Refresh { exclude } => {
                self.exclude = exclude;
                self.expanded = false;
                self.load(operation, incoming);
            }
            Staged::Expand => {
                report_reoffered(operation, &incoming, &self.expand_guard());
                for cand in &incoming {
                    self.feedback.entry(cand.item_index).or_insert(Preference::Neutral);
                }
                self.candidates.extend(incoming);
                self.expanded = true;
            }
        }

        self.error_message = None;
        debug_event!(
            "{} committed; {} rounds, {} candidates, {} exclusions",
            operation,
            self.history.len(),
            self.candidates.len(),
            self.exclude.len()
        );
        Ok(())
    }

    // Expand does not send the accumulated exclusions, so the service may
    // hand back items from earlier rounds.
    fn expand_guard(&self) -> HashSet<ItemIndex> {
        self.feedback
            .keys()
            .chain(self.exclude.iter())
            .copied()
            .collect()
    }

    fn load(&mut self, operation: Operation, incoming: Vec<Candidate>) {
        let excluded: HashSet<ItemIndex> = self.exclude.iter().copied().collect();
        report_reoffered(operation, &incoming, &excluded);
        self.feedback = neutral_feedback(&incoming);
        self.candidates = incoming;
    }
}

// The service is trusted to honour exclusions; violations are logged, not filtered.
fn report_reoffered(
    context: impl fmt::Display,
    incoming: &[Candidate],
    forbidden: &HashSet<ItemIndex>,
) {
    let offenders = reoffered(incoming, forbidden);
    if !offenders.is_empty() {
        let ids: Vec<String> = offenders.iter().map(ToString::to_string).collect();
        warn_event!(
            "{} re-offered excluded or visible items: {}",
            context,
            ids.join(", ")
        );
    }
}

fn reoffered(incoming: &[Candidate], forbidden: &HashSet<ItemIndex>) -> Vec<ItemIndex> {
    incoming
        .iter()
        .map(|c| c.item_index)
        .filter(|id| forbidden.contains(id))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn cands(ids: &[u64]) -> Vec<Candidate> {
        ids.iter().map(|&i| Candidate::new(ItemIndex(i))).collect()
    }

    fn ok(ids: &[u64]) -> std::result::Result<RecommendResponse, ServiceError> {
        Ok(RecommendResponse {
            candidates: cands(ids),
        })
    }

    fn started(ids: &[u64]) -> Session {
        let mut session = Session::new();
        let call = session.begin_start().unwrap();
        session.complete(call, ok(ids)).unwrap();
        session
    }

    #[test]
    fn second_request_is_rejected_while_pending() {
        let mut session = started(&[1, 2]);
        let call = session.begin_advance().unwrap();

        assert!(session.is_pending());
        assert_eq!(session.pending_operation(), Some(Operation::SaveRound));
        assert!(matches!(session.begin_refresh(true), Err(SessionError::Busy)));
        assert!(matches!(session.begin_expand(), Err(SessionError::Busy)));
        assert!(matches!(
            session.set_feedback(ItemIndex(1), Preference::Like),
            Err(SessionError::Busy)
        ));
        assert!(matches!(session.rewind_round(1), Err(SessionError::Busy)));
        assert!(!session.expand_available());

        session.complete(call, ok(&[3])).unwrap();
        assert!(!session.is_pending());
        assert_eq!(session.history_len(), 1);
    }

    #[test]
    fn cancelled_call_completes_as_stale() {
        let mut session = started(&[1, 2]);
        let call = session.begin_expand().unwrap();
        assert_eq!(call.operation(), Operation::ExpandRound);

        assert_eq!(session.cancel_pending(), Some(Operation::ExpandRound));
        assert!(!session.is_pending());

        let err = session.complete(call, ok(&[9])).unwrap_err();
        assert!(matches!(err, SessionError::StaleCompletion { .. }));
        assert_eq!(session.candidates().len(), 2);
        assert!(!session.is_expanded());
        assert_eq!(session.cancel_pending(), None);
    }

    #[test]
    fn completion_from_before_reset_is_ignored() {
        let mut session = started(&[1, 2]);
        let old = session.begin_advance().unwrap();

        session.reset();
        let fresh = session.begin_start().unwrap();
        assert!(fresh.ticket() > old.ticket());

        assert!(matches!(
            session.complete(old, ok(&[7])),
            Err(SessionError::StaleCompletion { .. })
        ));
        assert!(session.is_pending());
        session.complete(fresh, ok(&[5])).unwrap();
        assert_eq!(session.candidates(), cands(&[5]).as_slice());
        assert_eq!(session.history_len(), 0);
    }

    #[test]
    fn dirty_refresh_needs_confirmation() {
        let mut session = started(&[1, 2]);
        assert!(!session.refresh_needs_confirmation());
        let call = session.begin_refresh(false).unwrap();
        session.complete(call, ok(&[3, 4])).unwrap();

        session.set_feedback(ItemIndex(3), Preference::Dislike).unwrap();
        assert_eq!(session.dirtiness(), 1);
        assert!(matches!(
            session.begin_refresh(false),
            Err(SessionError::ConfirmationRequired)
        ));
        assert!(!session.is_pending());
        assert!(session.begin_refresh(true).is_ok());
    }

    #[test]
    fn set_feedback_toggles() {
        let mut session = started(&[1, 2]);
        let item = ItemIndex(1);

        assert_eq!(session.set_feedback(item, Preference::Like).unwrap(), Preference::Like);
        assert_eq!(session.set_feedback(item, Preference::Like).unwrap(), Preference::Neutral);

        session.set_feedback(item, Preference::Like).unwrap();
        assert_eq!(
            session.set_feedback(item, Preference::Dislike).unwrap(),
            Preference::Dislike
        );
        assert_eq!(session.preference(item), Some(Preference::Dislike));
    }

    #[test]
    fn set_feedback_outside_active_round_is_rejected() {
        let mut session = started(&[1, 2]);
        assert!(matches!(
            session.set_feedback(ItemIndex(99), Preference::Like),
            Err(SessionError::UnknownItem(ItemIndex(99)))
        ));
        assert_eq!(session.feedback().len(), 2);
    }

    #[test]
    fn rewind_rejects_rounds_that_do_not_exist() {
        let mut session = started(&[1]);
        assert!(matches!(
            session.rewind_round(1),
            Err(SessionError::RoundOutOfRange { requested: 1, available: 0 })
        ));

        let call = session.begin_advance().unwrap();
        session.complete(call, ok(&[2])).unwrap();
        assert!(session.rewind_round(0).is_err());
        assert!(session.rewind_round(2).is_err());
        assert_eq!(session.history_len(), 1);
    }

    #[test]
    fn failed_start_commits_nothing() {
        let mut session = Session::new();
        let call = session.begin_start().unwrap();
        let err = session
            .complete(call, Err(ServiceError::Unavailable("down".into())))
            .unwrap_err();

        assert_eq!(err.to_string(), "Unable to start session.");
        assert_eq!(session.error_message(), Some("Unable to start session."));
        assert!(session.candidates().is_empty());
        assert!(session.feedback().is_empty());
        assert!(!session.is_pending());
    }

    #[test]
    fn rewind_restores_expand_state_of_the_round() {
        let mut session = started(&[1]);
        let call = session.begin_expand().unwrap();
        session.complete(call, ok(&[2])).unwrap();
        assert!(session.is_expanded());

        let call = session.begin_advance().unwrap();
        session.complete(call, ok(&[3])).unwrap();
        assert!(!session.is_expanded());

        session.rewind_round(1).unwrap();
        assert!(session.is_expanded());
        assert_eq!(session.candidates().len(), 2);
        assert!(matches!(session.begin_expand(), Err(SessionError::ExpandUnavailable)));
    }

    #[test]
    fn expand_flags_items_from_earlier_rounds() {
        let mut session = started(&[1, 2]);
        let call = session.begin_advance().unwrap();
        session.complete(call, ok(&[3])).unwrap();

        let call = session.begin_expand().unwrap();
        assert_eq!(call.request().exclude, vec![ItemIndex(3)]);
        let guard = session.expand_guard();
        assert_eq!(
            reoffered(&cands(&[1, 4, 3]), &guard),
            vec![ItemIndex(1), ItemIndex(3)]
        );

        // Logged, not filtered.
        session.complete(call, ok(&[1])).unwrap();
        let ids: Vec<u64> = session.candidates().iter().map(|c| c.item_index.0).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(session.exclude(), &[ItemIndex(1), ItemIndex(2)]);
        assert_eq!(session.preference(ItemIndex(1)), Some(Preference::Neutral));
    }
}
