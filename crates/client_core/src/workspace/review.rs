use shared::{
    domain::{AssignmentId, SubmissionId},
    protocol::ReviewAssignment,
};

use crate::error::{ClientError, ClientResult};

/// A fetched peer submission together with whatever the reviewer has typed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewDraft {
    pub assignment_id: AssignmentId,
    pub review: ReviewAssignment,
    pub score: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ReviewState {
    #[default]
    Idle,
    Loaded(ReviewDraft),
    Submitting(ReviewDraft),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPhase {
    Idle,
    Loaded,
    Submitting,
}

impl ReviewState {
    pub fn phase(&self) -> ReviewPhase {
        match self {
            Self::Idle => ReviewPhase::Idle,
            Self::Loaded(_) => ReviewPhase::Loaded,
            Self::Submitting(_) => ReviewPhase::Submitting,
        }
    }

    pub fn draft(&self) -> Option<&ReviewDraft> {
        match self {
            Self::Idle => None,
            Self::Loaded(draft) | Self::Submitting(draft) => Some(draft),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewTicket {
    pub assignment_id: AssignmentId,
    epoch: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReview {
    pub ticket: ReviewTicket,
    pub submission_id: SubmissionId,
    pub score: f64,
    pub comment: String,
}

/// Idle -> Loaded -> Submitting -> Idle. `reset` starts a new epoch so that
/// completions issued before it are ignored.
#[derive(Debug, Default)]
pub struct ReviewWorkflow {
    state: ReviewState,
    epoch: u64,
    pending: Option<ReviewTicket>,
}

impl ReviewWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ReviewState {
        &self.state
    }

    pub fn phase(&self) -> ReviewPhase {
        self.state.phase()
    }

    pub fn is_request_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn reset(&mut self) {
        self.state = ReviewState::Idle;
        self.pending = None;
        self.epoch += 1;
    }

    pub fn request(
        &mut self,
        assignment_id: AssignmentId,
        selected: Option<AssignmentId>,
    ) -> ClientResult<ReviewTicket> {
        if selected != Some(assignment_id) {
            return Err(ClientError::conflict(format!(
                "assignment {assignment_id} is not selected"
            )));
        }
        if let Some(draft) = self.state.draft() {
            return Err(ClientError::conflict(format!(
                "a review is already in progress for assignment {}",
                draft.assignment_id
            )));
        }
        if self.pending.is_some() {
            return Err(ClientError::conflict("a review request is already pending"));
        }
        let ticket = ReviewTicket {
            assignment_id,
            epoch: self.epoch,
        };
        self.pending = Some(ticket);
        Ok(ticket)
    }

    /// Applies an allocation answer. A failure leaves the workflow `Idle`.
    pub fn allocation_finished(
        &mut self,
        ticket: ReviewTicket,
        result: &ClientResult<ReviewAssignment>,
    ) -> bool {
        if self.pending != Some(ticket) {
            return false;
        }
        self.pending = None;
        if let Ok(review) = result {
            self.state = ReviewState::Loaded(ReviewDraft {
                assignment_id: ticket.assignment_id,
                review: review.clone(),
                score: String::new(),
                comment: String::new(),
            });
        }
        true
    }

    /// Records the inputs on the loaded draft, then validates them. Invalid
    /// input leaves the workflow `Loaded` with the inputs kept.
    pub fn begin_submit(&mut self, score: &str, comment: &str) -> ClientResult<SubmitReview> {
        let draft = match &mut self.state {
            ReviewState::Idle => return Err(ClientError::conflict("no review is loaded")),
            ReviewState::Submitting(_) => {
                return Err(ClientError::conflict("the review is already being submitted"))
            }
            ReviewState::Loaded(draft) => draft,
        };
        draft.score = score.to_string();
        draft.comment = comment.to_string();
        let parsed = parse_score(score)?;
        let request = SubmitReview {
            ticket: ReviewTicket {
                assignment_id: draft.assignment_id,
                epoch: self.epoch,
            },
            submission_id: draft.review.submission_id,
            score: parsed,
            comment: comment.to_string(),
        };
        let next = ReviewState::Submitting(draft.clone());
        self.state = next;
        Ok(request)
    }

    /// Success returns to `Idle`; a failure goes back to `Loaded` with the
    /// fetched review and the typed inputs intact.
    pub fn submit_finished(&mut self, request: &SubmitReview, result: &ClientResult<()>) -> bool {
        if request.ticket.epoch != self.epoch {
            return false;
        }
        let ReviewState::Submitting(draft) = &self.state else {
            return false;
        };
        self.state = match result {
            Ok(()) => ReviewState::Idle,
            Err(_) => ReviewState::Loaded(draft.clone()),
        };
        true
    }
}

fn parse_score(raw: &str) -> ClientResult<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClientError::validation("score is required"));
    }
    match trimmed.parse::<f64>() {
        Ok(score) if score.is_finite() => Ok(score),
        _ => Err(ClientError::validation(format!(
            "score must be a number, got '{trimmed}'"
        ))),
    }
}

#[cfg(test)]
#[path = "tests/review_tests.rs"]
mod tests;
