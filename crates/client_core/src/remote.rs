use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{AssignmentId, SubmissionId, TrackId},
    error::ErrorBody,
    protocol::{
        AccessToken, Assignment, Comment, CreateCommentRequest, LoginForm,
        Notification, RegisterRequest, ReviewAllocation, ReviewAssignment, SubmitOutcome,
        SubmitReviewRequest, SubmitSolutionRequest, Track, UserProfile,
    },
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::{ClientError, ClientResult, ErrorKind},
    session::{Session, SessionStore},
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Calls the workspace needs from the platform API.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn list_assignments(&self, track_id: TrackId) -> ClientResult<Vec<Assignment>>;
    async fn submit_solution(
        &self,
        assignment_id: AssignmentId,
        repository_url: &str,
    ) -> ClientResult<SubmitOutcome>;
    async fn request_review(&self, assignment_id: AssignmentId) -> ClientResult<ReviewAssignment>;
    async fn submit_review(
        &self,
        submission_id: SubmissionId,
        score: f64,
        comment: &str,
    ) -> ClientResult<()>;
    async fn list_comments(&self, assignment_id: AssignmentId) -> ClientResult<Vec<Comment>>;
    async fn add_comment(&self, assignment_id: AssignmentId, text: &str) -> ClientResult<Comment>;
    async fn list_notifications(&self) -> ClientResult<Vec<Notification>>;
}

/// Track enrollment calls used by the track directory.
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    async fn list_tracks(&self) -> ClientResult<Vec<Track>>;
    async fn join_track(&self, track_id: TrackId) -> ClientResult<()>;
    async fn leave_track(&self, track_id: TrackId) -> ClientResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Login,
    ListTracks,
    JoinTrack,
    LeaveTrack,
    ListAssignments,
    SubmitSolution,
    RequestReview,
    SubmitReview,
    ListComments,
    AddComment,
    ListNotifications,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
            Self::ListTracks => "list_tracks",
            Self::JoinTrack => "join_track",
            Self::LeaveTrack => "leave_track",
            Self::ListAssignments => "list_assignments",
            Self::SubmitSolution => "submit_solution",
            Self::RequestReview => "request_review",
            Self::SubmitReview => "submit_review",
            Self::ListComments => "list_comments",
            Self::AddComment => "add_comment",
            Self::ListNotifications => "list_notifications",
        }
    }

    pub fn requires_session(self) -> bool {
        !matches!(self, Self::Register | Self::Login)
    }

    /// Kind given to a plain 400/403/404 rejection of this operation.
    pub fn rejection_kind(self, status: StatusCode) -> ErrorKind {
        match self {
            Self::RequestReview if status == StatusCode::NOT_FOUND => ErrorKind::NotAvailable,
            Self::SubmitReview | Self::AddComment | Self::Register | Self::Login => {
                ErrorKind::Validation
            }
            _ => ErrorKind::Conflict,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct HttpRemoteService {
    http: Client,
    base_url: String,
    session: SessionStore,
}

impl HttpRemoteService {
    pub fn new(config: ServiceConfig, session: SessionStore) -> ClientResult<Self> {
        let base_url = normalize_base_url(&config.base_url)?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ClientError::network(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn register(&self, email: &str, password: &str) -> ClientResult<UserProfile> {
        let request = self.http.post(self.endpoint("/register")).json(&RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
        });
        self.execute(Operation::Register, request).await
    }

    /// Exchanges credentials for a bearer token and installs it in the session store.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Session> {
        let request = self.http.post(self.endpoint("/token")).form(&LoginForm {
            username: email.to_string(),
            password: password.to_string(),
        });
        let token: AccessToken = self.execute(Operation::Login, request).await?;
        let session = Session::new(token.access_token, token.token_type);
        self.session.install(session.clone());
        info!("session: established");
        Ok(session)
    }

    pub fn logout(&self) {
        if self.session.clear() {
            info!("session: cleared on logout");
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> ClientResult<T> {
        let response = self.send(operation, request).await?;
        response.json::<T>().await.map_err(|err| {
            warn!(operation = operation.name(), error = %err, "remote: undecodable response");
            ClientError::from(err)
        })
    }

    /// Like `execute` for endpoints whose success body carries nothing we use.
    async fn execute_unit(&self, operation: Operation, request: RequestBuilder) -> ClientResult<()> {
        self.send(operation, request).await.map(|_| ())
    }

    async fn send(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> ClientResult<Response> {
        let request = if operation.requires_session() {
            let session = self.session.current().ok_or_else(|| {
                ClientError::auth(format!("not logged in: {} needs a session", operation.name()))
            })?;
            request.bearer_auth(session.token())
        } else {
            request
        };

        let response = request.send().await.map_err(|err| {
            warn!(operation = operation.name(), error = %err, "remote: request failed");
            ClientError::from(err)
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message());
        let err = ClientError::from_status(status, detail, operation.rejection_kind(status));
        debug!(
            operation = operation.name(),
            status = status.as_u16(),
            error = %err,
            "remote: request rejected"
        );
        if err.requires_reauth() && operation.requires_session() && self.session.clear() {
            warn!(operation = operation.name(), "session: credential rejected, cleared");
        }
        Err(err)
    }
}

fn normalize_base_url(raw: &str) -> ClientResult<String> {
    let parsed = Url::parse(raw.trim())
        .map_err(|err| ClientError::validation(format!("invalid server url '{raw}': {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ClientError::validation(format!(
            "server url must start with http:// or https://, got '{raw}'"
        )));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    async fn list_assignments(&self, track_id: TrackId) -> ClientResult<Vec<Assignment>> {
        let request = self
            .http
            .get(self.endpoint(&format!("/tracks/{track_id}/assignments")));
        let mut assignments: Vec<Assignment> =
            self.execute(Operation::ListAssignments, request).await?;
        for assignment in &mut assignments {
            assignment.track_id.get_or_insert(track_id);
        }
        Ok(assignments)
    }

    async fn submit_solution(
        &self,
        assignment_id: AssignmentId,
        repository_url: &str,
    ) -> ClientResult<SubmitOutcome> {
        let request = self
            .http
            .post(self.endpoint(&format!("/assignments/{assignment_id}/submit")))
            .json(&SubmitSolutionRequest {
                repository_url: repository_url.to_string(),
            });
        self.execute(Operation::SubmitSolution, request).await
    }

    async fn request_review(&self, assignment_id: AssignmentId) -> ClientResult<ReviewAssignment> {
        let request = self
            .http
            .get(self.endpoint(&format!("/assignments/{assignment_id}/review")));
        match self.execute(Operation::RequestReview, request).await? {
            ReviewAllocation::Assigned(review) => Ok(review),
            ReviewAllocation::Exhausted(ack) => Err(ClientError::not_available(ack.message)),
        }
    }

    async fn submit_review(
        &self,
        submission_id: SubmissionId,
        score: f64,
        comment: &str,
    ) -> ClientResult<()> {
        let request = self
            .http
            .post(self.endpoint(&format!("/submissions/{submission_id}/review")))
            .json(&SubmitReviewRequest {
                score,
                comment: comment.to_string(),
            });
        self.execute_unit(Operation::SubmitReview, request).await
    }

    async fn list_comments(&self, assignment_id: AssignmentId) -> ClientResult<Vec<Comment>> {
        let request = self
            .http
            .get(self.endpoint(&format!("/assignments/{assignment_id}/comments")));
        let mut comments: Vec<Comment> = self.execute(Operation::ListComments, request).await?;
        for comment in &mut comments {
            comment.assignment_id.get_or_insert(assignment_id);
        }
        Ok(comments)
    }

    async fn add_comment(&self, assignment_id: AssignmentId, text: &str) -> ClientResult<Comment> {
        let request = self
            .http
            .post(self.endpoint(&format!("/assignments/{assignment_id}/comments")))
            .json(&CreateCommentRequest {
                text: text.to_string(),
            });
        let mut comment: Comment = self.execute(Operation::AddComment, request).await?;
        comment.assignment_id.get_or_insert(assignment_id);
        Ok(comment)
    }

    async fn list_notifications(&self) -> ClientResult<Vec<Notification>> {
        let request = self.http.get(self.endpoint("/notifications"));
        self.execute(Operation::ListNotifications, request).await
    }
}

#[async_trait]
impl TrackCatalog for HttpRemoteService {
    async fn list_tracks(&self) -> ClientResult<Vec<Track>> {
        let request = self.http.get(self.endpoint("/tracks"));
        self.execute(Operation::ListTracks, request).await
    }

    async fn join_track(&self, track_id: TrackId) -> ClientResult<()> {
        let request = self
            .http
            .post(self.endpoint(&format!("/tracks/{track_id}/join")));
        self.execute_unit(Operation::JoinTrack, request).await
    }

    async fn leave_track(&self, track_id: TrackId) -> ClientResult<()> {
        let request = self
            .http
            .post(self.endpoint(&format!("/tracks/{track_id}/leave")));
        self.execute_unit(Operation::LeaveTrack, request).await
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
