//! Synchronous state of one track's workspace.
//!
//! Every transition happens under a single `&mut Workspace` and returns the
//! effects it wants as [`Command`]s. The async driver executes them and feeds
//! completions back through the tagged `*_loaded` / `*_finished` methods, which
//! drop anything issued for a scope that is no longer current.

pub mod comments;
pub mod notifications;
pub mod review;
pub mod selection;
pub mod submission;

use shared::{
    domain::{AssignmentId, TrackId},
    protocol::{Assignment, Comment, Notification, ReviewAssignment, SubmitOutcome},
};

use crate::error::{ClientError, ClientResult};

pub use comments::{CommentThread, CommentsRequest, PostComment};
pub use notifications::NotificationFeed;
pub use review::{ReviewDraft, ReviewPhase, ReviewState, ReviewTicket, ReviewWorkflow, SubmitReview};
pub use selection::{AssignmentSelection, AssignmentsApplied, AssignmentsRequest, SelectionChange};
pub use submission::{SubmissionForm, SubmitSolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    LoadAssignments(AssignmentsRequest),
    LoadComments(CommentsRequest),
    /// Starts polling for `TrackId`, replacing any poller already running.
    StartPolling(TrackId),
    StopPolling,
}

/// Owned copy of everything a front end renders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkspaceSnapshot {
    pub track_id: Option<TrackId>,
    pub assignments: Vec<Assignment>,
    pub assignments_loaded: bool,
    pub selected: Option<AssignmentId>,
    pub comments: Vec<Comment>,
    pub comments_loaded: bool,
    pub comment_draft: String,
    pub repository_url: String,
    pub submission_in_flight: bool,
    pub last_submission: Option<SubmitOutcome>,
    pub review: ReviewState,
    pub notifications: Vec<Notification>,
    pub notification_error: Option<ClientError>,
}

#[derive(Debug, Default)]
pub struct Workspace {
    selection: AssignmentSelection,
    comments: CommentThread,
    submission: SubmissionForm,
    review: ReviewWorkflow,
    notifications: NotificationFeed,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &AssignmentSelection {
        &self.selection
    }

    pub fn comments(&self) -> &CommentThread {
        &self.comments
    }

    pub fn submission(&self) -> &SubmissionForm {
        &self.submission
    }

    pub fn review(&self) -> &ReviewWorkflow {
        &self.review
    }

    pub fn notifications(&self) -> &NotificationFeed {
        &self.notifications
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            track_id: self.selection.track_id(),
            assignments: self.selection.assignments().to_vec(),
            assignments_loaded: self.selection.is_loaded(),
            selected: self.selection.selected(),
            comments: self.comments.comments().to_vec(),
            comments_loaded: self.comments.is_loaded(),
            comment_draft: self.comments.draft().to_string(),
            repository_url: self.submission.repository_url().to_string(),
            submission_in_flight: self.submission.is_in_flight(),
            last_submission: self.submission.last_outcome().cloned(),
            review: self.review.state().clone(),
            notifications: self.notifications.notifications().to_vec(),
            notification_error: self.notifications.last_error().cloned(),
        }
    }

    pub fn open_track(&mut self, track_id: TrackId) -> Vec<Command> {
        self.rescope(None);
        self.notifications.clear();
        let request = self.selection.open_track(track_id);
        vec![
            Command::LoadAssignments(request),
            Command::StartPolling(track_id),
        ]
    }

    pub fn close_track(&mut self) -> Vec<Command> {
        self.selection.close_track();
        self.rescope(None);
        self.notifications.clear();
        vec![Command::StopPolling]
    }

    /// The review reset and the comment rescope both happen here, before any
    /// load for the new selection is handed out.
    fn rescope(&mut self, selected: Option<AssignmentId>) -> Option<CommentsRequest> {
        self.review.reset();
        self.submission.scope_to(selected);
        self.comments.scope_to(selected)
    }

    pub fn select(
        &mut self,
        assignment_id: Option<AssignmentId>,
    ) -> ClientResult<(SelectionChange, Vec<Command>)> {
        let change = self.selection.select(assignment_id)?;
        let commands = match change {
            SelectionChange::Unchanged => Vec::new(),
            SelectionChange::Changed { current, .. } => self
                .rescope(current)
                .map(Command::LoadComments)
                .into_iter()
                .collect(),
        };
        Ok((change, commands))
    }

    /// Reloads the assignment list and, if something is selected, its thread.
    pub fn reload(&mut self) -> ClientResult<Vec<Command>> {
        let request = self
            .selection
            .reload()
            .ok_or_else(|| ClientError::conflict("no track is open"))?;
        let mut commands = vec![Command::LoadAssignments(request)];
        commands.extend(self.comments.reload().map(Command::LoadComments));
        Ok(commands)
    }

    pub fn load_assignments_for(&mut self, track_id: TrackId) -> ClientResult<AssignmentsRequest> {
        if self.selection.track_id() != Some(track_id) {
            return Err(ClientError::conflict(format!("track {track_id} is not open")));
        }
        self.selection
            .reload()
            .ok_or_else(|| ClientError::conflict("no track is open"))
    }

    pub fn is_assignments_request_current(&self, request: &AssignmentsRequest) -> bool {
        self.selection.is_current(request)
    }

    pub fn assignments_loaded(
        &mut self,
        request: &AssignmentsRequest,
        assignments: Vec<Assignment>,
    ) -> AssignmentsApplied {
        let applied = self.selection.apply_loaded(request, assignments);
        if let AssignmentsApplied::Applied {
            selection_dropped: true,
        } = applied
        {
            self.rescope(None);
        }
        applied
    }

    pub fn load_comments_for(&mut self, assignment_id: AssignmentId) -> ClientResult<CommentsRequest> {
        self.comments.reload_for(assignment_id)
    }

    pub fn is_comments_request_current(&self, request: &CommentsRequest) -> bool {
        self.comments.is_current(request)
    }

    pub fn comments_loaded(&mut self, request: &CommentsRequest, comments: Vec<Comment>) -> bool {
        self.comments.apply_loaded(request, comments)
    }

    pub fn prepare_comment(&mut self, assignment_id: AssignmentId, text: &str) -> ClientResult<PostComment> {
        self.comments.prepare_post(assignment_id, text)
    }

    pub fn comment_posted(&mut self, post: &PostComment, result: &ClientResult<Comment>) -> Vec<Command> {
        self.comments
            .post_finished(post, result)
            .map(Command::LoadComments)
            .into_iter()
            .collect()
    }

    pub fn prepare_submission(
        &mut self,
        assignment_id: AssignmentId,
        repository_url: &str,
    ) -> ClientResult<SubmitSolution> {
        self.submission.prepare(assignment_id, repository_url)
    }

    /// A successful submission always refreshes the assignment list, even
    /// when the form has moved on to another assignment meanwhile.
    pub fn submission_finished(
        &mut self,
        request: &SubmitSolution,
        result: &ClientResult<SubmitOutcome>,
    ) -> Vec<Command> {
        self.submission.finish(request, result);
        self.reload_after_success(result.is_ok())
    }

    pub fn prepare_review_request(&mut self, assignment_id: AssignmentId) -> ClientResult<ReviewTicket> {
        self.review.request(assignment_id, self.selection.selected())
    }

    pub fn review_allocated(
        &mut self,
        ticket: ReviewTicket,
        result: &ClientResult<ReviewAssignment>,
    ) -> bool {
        self.review.allocation_finished(ticket, result)
    }

    pub fn prepare_review_submission(&mut self, score: &str, comment: &str) -> ClientResult<SubmitReview> {
        self.review.begin_submit(score, comment)
    }

    pub fn review_submitted(&mut self, request: &SubmitReview, result: &ClientResult<()>) -> Vec<Command> {
        self.review.submit_finished(request, result);
        self.reload_after_success(result.is_ok())
    }

    fn reload_after_success(&mut self, succeeded: bool) -> Vec<Command> {
        if !succeeded {
            return Vec::new();
        }
        self.selection
            .reload()
            .map(Command::LoadAssignments)
            .into_iter()
            .collect()
    }

    pub fn begin_poll(&mut self) -> u64 {
        self.notifications.issue()
    }

    pub fn notifications_fetched(&mut self, sequence: u64, batch: Vec<Notification>) -> bool {
        self.notifications.apply(sequence, batch)
    }

    pub fn notifications_failed(&mut self, sequence: u64, error: &ClientError) -> bool {
        self.notifications.record_failure(sequence, error)
    }
}

#[cfg(test)]
#[path = "tests/workspace_tests.rs"]
mod tests;
