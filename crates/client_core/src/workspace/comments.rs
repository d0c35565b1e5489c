use shared::{domain::AssignmentId, protocol::Comment};

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentsRequest {
    pub assignment_id: AssignmentId,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostComment {
    pub assignment_id: AssignmentId,
    pub text: String,
}

/// Orders a thread oldest first; ties on `created_at` fall back to the id.
pub fn chronological(mut comments: Vec<Comment>) -> Vec<Comment> {
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    comments
}

/// Comment thread of exactly one assignment. The thread never shows comments
/// loaded for a different scope.
#[derive(Debug, Default)]
pub struct CommentThread {
    assignment_id: Option<AssignmentId>,
    comments: Vec<Comment>,
    draft: String,
    generation: u64,
    loaded: bool,
}

impl CommentThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assignment_id(&self) -> Option<AssignmentId> {
        self.assignment_id
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Clears the thread and rescopes it. Any load issued before this call is stale.
    pub fn scope_to(&mut self, assignment_id: Option<AssignmentId>) -> Option<CommentsRequest> {
        self.assignment_id = assignment_id;
        self.comments.clear();
        self.draft.clear();
        self.loaded = false;
        self.generation += 1;
        assignment_id.map(|assignment_id| CommentsRequest {
            assignment_id,
            generation: self.generation,
        })
    }

    pub fn reload(&mut self) -> Option<CommentsRequest> {
        let assignment_id = self.assignment_id?;
        self.generation += 1;
        Some(CommentsRequest {
            assignment_id,
            generation: self.generation,
        })
    }

    pub fn reload_for(&mut self, assignment_id: AssignmentId) -> ClientResult<CommentsRequest> {
        if self.assignment_id != Some(assignment_id) {
            return Err(ClientError::conflict(format!(
                "assignment {assignment_id} is not selected"
            )));
        }
        self.reload()
            .ok_or_else(|| ClientError::conflict("no assignment is selected"))
    }

    pub fn is_current(&self, request: &CommentsRequest) -> bool {
        self.assignment_id == Some(request.assignment_id) && self.generation == request.generation
    }

    pub fn apply_loaded(&mut self, request: &CommentsRequest, comments: Vec<Comment>) -> bool {
        if !self.is_current(request) {
            return false;
        }
        self.comments = chronological(comments);
        self.loaded = true;
        true
    }

    /// Validates a new comment and keeps its text as the draft until the
    /// server confirms it.
    pub fn prepare_post(&mut self, assignment_id: AssignmentId, text: &str) -> ClientResult<PostComment> {
        if text.trim().is_empty() {
            return Err(ClientError::validation("comment text must not be empty"));
        }
        if self.assignment_id != Some(assignment_id) {
            return Err(ClientError::conflict(format!(
                "assignment {assignment_id} is not selected"
            )));
        }
        self.draft = text.to_string();
        Ok(PostComment {
            assignment_id,
            text: text.to_string(),
        })
    }

    /// On success the draft is cleared and the thread reloaded from the
    /// server; nothing is inserted locally.
    pub fn post_finished(
        &mut self,
        post: &PostComment,
        result: &ClientResult<Comment>,
    ) -> Option<CommentsRequest> {
        if result.is_err() || self.assignment_id != Some(post.assignment_id) {
            return None;
        }
        if self.draft == post.text {
            self.draft.clear();
        }
        self.reload()
    }
}
