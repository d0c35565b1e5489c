use shared::{domain::AssignmentId, protocol::SubmitOutcome};

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitSolution {
    pub assignment_id: AssignmentId,
    pub repository_url: String,
    scope: u64,
}

/// Solution form for the selected assignment.
#[derive(Debug, Default)]
pub struct SubmissionForm {
    assignment_id: Option<AssignmentId>,
    repository_url: String,
    in_flight: bool,
    scope: u64,
    last_outcome: Option<SubmitOutcome>,
}

impl SubmissionForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assignment_id(&self) -> Option<AssignmentId> {
        self.assignment_id
    }

    /// Last URL the learner tried to submit; kept across failures.
    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn last_outcome(&self) -> Option<&SubmitOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn scope_to(&mut self, assignment_id: Option<AssignmentId>) {
        self.assignment_id = assignment_id;
        self.repository_url.clear();
        self.in_flight = false;
        self.last_outcome = None;
        self.scope += 1;
    }

    pub fn prepare(&mut self, assignment_id: AssignmentId, repository_url: &str) -> ClientResult<SubmitSolution> {
        let trimmed = repository_url.trim();
        if trimmed.is_empty() {
            return Err(ClientError::validation("repository url must not be empty"));
        }
        if self.assignment_id != Some(assignment_id) {
            return Err(ClientError::conflict(format!(
                "assignment {assignment_id} is not selected"
            )));
        }
        if self.in_flight {
            return Err(ClientError::conflict(format!(
                "a submission for assignment {assignment_id} is already in progress"
            )));
        }
        self.repository_url = repository_url.to_string();
        self.in_flight = true;
        Ok(SubmitSolution {
            assignment_id,
            repository_url: trimmed.to_string(),
            scope: self.scope,
        })
    }

    /// Returns false when the form was rescoped while the request was in flight.
    pub fn finish(&mut self, request: &SubmitSolution, result: &ClientResult<SubmitOutcome>) -> bool {
        if request.scope != self.scope {
            return false;
        }
        self.in_flight = false;
        if let Ok(outcome) = result {
            self.repository_url.clear();
            self.last_outcome = Some(outcome.clone());
        }
        true
    }
}
