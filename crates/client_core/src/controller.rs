use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use shared::{
    domain::{AssignmentId, TrackId},
    protocol::{Assignment, Comment, Notification, ReviewAssignment, SubmitOutcome},
};
use tokio::sync::{broadcast, Mutex as AsyncMutex, Notify};
use tracing::{debug, info, warn};

use crate::{
    error::{ClientError, ClientResult},
    poller::{NotificationPoller, NotificationSink, PollerHandle, NOTIFICATION_POLL_INTERVAL},
    remote::RemoteService,
    workspace::{
        comments::chronological, AssignmentsApplied, AssignmentsRequest, Command, CommentsRequest,
        ReviewPhase, SelectionChange, Workspace, WorkspaceSnapshot,
    },
};

const UPDATE_CHANNEL_CAPACITY: usize = 256;
const CANCELLED: &str = "request cancelled";

#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    pub poll_interval: Duration,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            poll_interval: NOTIFICATION_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTarget {
    Assignments(TrackId),
    Comments(AssignmentId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkspaceUpdate {
    TrackOpened(TrackId),
    TrackClosed,
    AssignmentsChanged,
    SelectionChanged(Option<AssignmentId>),
    CommentsChanged(Option<AssignmentId>),
    SubmissionChanged,
    ReviewChanged(ReviewPhase),
    NotificationsChanged,
    LoadFailed {
        target: LoadTarget,
        error: ClientError,
    },
    PollFailed(ClientError),
    SessionExpired,
}

/// Counts spawned effect tasks so callers can wait for the workspace to go quiet.
#[derive(Default)]
struct TaskTracker {
    active: AtomicUsize,
    idle: Notify,
}

impl TaskTracker {
    fn enter(self: &Arc<Self>) -> TaskGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        TaskGuard(Arc::clone(self))
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct TaskGuard(Arc<TaskTracker>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.0.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Applies a failed completion if a mutation is dropped while its request is
/// in flight. Disarmed once the real result has been applied.
struct CompletionGuard<'a, F>
where
    F: FnOnce(&mut Workspace) -> Option<WorkspaceUpdate>,
{
    state: &'a Mutex<Workspace>,
    updates: &'a broadcast::Sender<WorkspaceUpdate>,
    on_cancel: Option<F>,
}

impl<F> CompletionGuard<'_, F>
where
    F: FnOnce(&mut Workspace) -> Option<WorkspaceUpdate>,
{
    fn disarm(mut self) {
        self.on_cancel = None;
    }
}

impl<F> Drop for CompletionGuard<'_, F>
where
    F: FnOnce(&mut Workspace) -> Option<WorkspaceUpdate>,
{
    fn drop(&mut self) {
        let Some(on_cancel) = self.on_cancel.take() else {
            return;
        };
        debug!("workspace: request dropped before completion");
        let update = on_cancel(&mut lock_workspace(self.state));
        if let Some(update) = update {
            let _ = self.updates.send(update);
        }
    }
}

fn lock_workspace(state: &Mutex<Workspace>) -> std::sync::MutexGuard<'_, Workspace> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Feeds poll results of one track into the shared workspace. Holds the state
/// rather than the controller so the poll task never keeps the controller alive.
struct FeedSink {
    track_id: TrackId,
    state: Arc<Mutex<Workspace>>,
    updates: broadcast::Sender<WorkspaceUpdate>,
}

impl FeedSink {
    fn is_current_track(workspace: &Workspace, track_id: TrackId) -> bool {
        workspace.selection().track_id() == Some(track_id)
    }
}

impl NotificationSink for FeedSink {
    fn begin_fetch(&self) -> u64 {
        lock_workspace(&self.state).begin_poll()
    }

    fn publish(&self, sequence: u64, notifications: Vec<Notification>) {
        let applied = {
            let mut workspace = lock_workspace(&self.state);
            Self::is_current_track(&workspace, self.track_id)
                && workspace.notifications_fetched(sequence, notifications)
        };
        if applied {
            let _ = self.updates.send(WorkspaceUpdate::NotificationsChanged);
        } else {
            debug!(track_id = %self.track_id, sequence, "workspace: discarded stale notifications");
        }
    }

    fn report_failure(&self, sequence: u64, error: &ClientError) {
        let recorded = {
            let mut workspace = lock_workspace(&self.state);
            Self::is_current_track(&workspace, self.track_id)
                && workspace.notifications_failed(sequence, error)
        };
        if recorded {
            let _ = self.updates.send(WorkspaceUpdate::PollFailed(error.clone()));
        }
        if error.requires_reauth() {
            let _ = self.updates.send(WorkspaceUpdate::SessionExpired);
        }
    }
}

/// Async driver of a [`Workspace`]. The state mutex is only ever held for a
/// single synchronous transition.
pub struct WorkspaceController {
    remote: Arc<dyn RemoteService>,
    poller: NotificationPoller,
    state: Arc<Mutex<Workspace>>,
    polling: AsyncMutex<Option<PollerHandle>>,
    updates: broadcast::Sender<WorkspaceUpdate>,
    tasks: Arc<TaskTracker>,
}

impl WorkspaceController {
    pub fn new(remote: Arc<dyn RemoteService>, config: WorkspaceConfig) -> Arc<Self> {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Arc::new(Self {
            poller: NotificationPoller::new(Arc::clone(&remote), config.poll_interval),
            remote,
            state: Arc::new(Mutex::new(Workspace::new())),
            polling: AsyncMutex::new(None),
            updates,
            tasks: Arc::new(TaskTracker::default()),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceUpdate> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        lock_workspace(&self.state).snapshot()
    }

    pub async fn is_polling(&self) -> bool {
        self.polling
            .lock()
            .await
            .as_ref()
            .is_some_and(PollerHandle::is_running)
    }

    /// Resolves once every background load spawned so far has completed.
    pub async fn settle(&self) {
        self.tasks.wait_idle().await;
    }

    fn with_state<R>(&self, transition: impl FnOnce(&mut Workspace) -> R) -> R {
        transition(&mut lock_workspace(&self.state))
    }

    fn guard_completion<F>(&self, on_cancel: F) -> CompletionGuard<'_, F>
    where
        F: FnOnce(&mut Workspace) -> Option<WorkspaceUpdate>,
    {
        CompletionGuard {
            state: &self.state,
            updates: &self.updates,
            on_cancel: Some(on_cancel),
        }
    }

    fn emit(&self, update: WorkspaceUpdate) {
        let _ = self.updates.send(update);
    }

    fn observe<T>(&self, result: &ClientResult<T>) {
        if let Err(err) = result {
            if err.requires_reauth() {
                warn!(error = %err, "workspace: session expired");
                self.emit(WorkspaceUpdate::SessionExpired);
            }
        }
    }

    pub async fn open_track(self: &Arc<Self>, track_id: TrackId) {
        let commands = self.with_state(|workspace| workspace.open_track(track_id));
        info!(track_id = %track_id, "workspace: track opened");
        self.emit(WorkspaceUpdate::TrackOpened(track_id));
        self.run(commands).await;
    }

    /// Stops the poller and clears all state. Safe to call more than once.
    pub async fn close(self: &Arc<Self>) {
        let commands = self.with_state(Workspace::close_track);
        self.run(commands).await;
        info!("workspace: closed");
        self.emit(WorkspaceUpdate::TrackClosed);
    }

    pub async fn select(self: &Arc<Self>, assignment_id: Option<AssignmentId>) -> ClientResult<()> {
        let (change, commands) = self.with_state(|workspace| workspace.select(assignment_id))?;
        if let SelectionChange::Changed { previous, current } = change {
            debug!(?previous, ?current, "workspace: selection changed");
            self.emit(WorkspaceUpdate::SelectionChanged(current));
            self.emit(WorkspaceUpdate::ReviewChanged(ReviewPhase::Idle));
            self.emit(WorkspaceUpdate::SubmissionChanged);
            self.emit(WorkspaceUpdate::CommentsChanged(current));
        }
        self.run(commands).await;
        Ok(())
    }

    pub async fn reload(self: &Arc<Self>) -> ClientResult<()> {
        let commands = self.with_state(Workspace::reload)?;
        self.run(commands).await;
        Ok(())
    }

    /// Loads the list for the open track and returns it. The result reaches
    /// the workspace only if no newer load was issued meanwhile.
    pub async fn load_assignments(&self, track_id: TrackId) -> ClientResult<Vec<Assignment>> {
        let request = self.with_state(|workspace| workspace.load_assignments_for(track_id))?;
        let result = self.remote.list_assignments(track_id).await;
        self.assignments_completed(request, &result);
        result
    }

    pub async fn load_comments(&self, assignment_id: AssignmentId) -> ClientResult<Vec<Comment>> {
        let request = self.with_state(|workspace| workspace.load_comments_for(assignment_id))?;
        let result = self.remote.list_comments(assignment_id).await.map(chronological);
        self.comments_completed(request, &result);
        result
    }

    pub async fn submit(
        self: &Arc<Self>,
        assignment_id: AssignmentId,
        repository_url: &str,
    ) -> ClientResult<SubmitOutcome> {
        let request = self
            .with_state(|workspace| workspace.prepare_submission(assignment_id, repository_url))?;
        self.emit(WorkspaceUpdate::SubmissionChanged);
        let cancel = self.guard_completion(|workspace| {
            workspace.submission_finished(&request, &Err(ClientError::network(CANCELLED)));
            Some(WorkspaceUpdate::SubmissionChanged)
        });
        let result = self
            .remote
            .submit_solution(request.assignment_id, &request.repository_url)
            .await;
        cancel.disarm();
        match &result {
            Ok(_) => info!(assignment_id = %assignment_id, "workspace: solution submitted"),
            Err(err) => debug!(assignment_id = %assignment_id, error = %err, "workspace: submission rejected"),
        }
        let commands = self.with_state(|workspace| workspace.submission_finished(&request, &result));
        self.emit(WorkspaceUpdate::SubmissionChanged);
        self.observe(&result);
        self.run(commands).await;
        result
    }

    pub async fn request_review(
        &self,
        assignment_id: AssignmentId,
    ) -> ClientResult<ReviewAssignment> {
        let ticket = self.with_state(|workspace| workspace.prepare_review_request(assignment_id))?;
        let cancel = self.guard_completion(|workspace| {
            workspace
                .review_allocated(ticket, &Err(ClientError::network(CANCELLED)))
                .then(|| WorkspaceUpdate::ReviewChanged(workspace.review().phase()))
        });
        let result = self.remote.request_review(assignment_id).await;
        cancel.disarm();
        let (applied, phase) = self.with_state(|workspace| {
            let applied = workspace.review_allocated(ticket, &result);
            (applied, workspace.review().phase())
        });
        if applied {
            self.emit(WorkspaceUpdate::ReviewChanged(phase));
        } else {
            debug!(assignment_id = %assignment_id, "workspace: discarded stale review allocation");
        }
        self.observe(&result);
        result
    }

    /// Sends the loaded review. Invalid input and server rejections leave the
    /// review loaded with the typed score and comment intact.
    pub async fn submit_review(self: &Arc<Self>, score: &str, comment: &str) -> ClientResult<()> {
        let request = self.with_state(|workspace| workspace.prepare_review_submission(score, comment))?;
        self.emit(WorkspaceUpdate::ReviewChanged(ReviewPhase::Submitting));
        let cancel = self.guard_completion(|workspace| {
            workspace.review_submitted(&request, &Err(ClientError::network(CANCELLED)));
            Some(WorkspaceUpdate::ReviewChanged(workspace.review().phase()))
        });
        let result = self
            .remote
            .submit_review(request.submission_id, request.score, &request.comment)
            .await;
        cancel.disarm();
        let (commands, phase) = self.with_state(|workspace| {
            let commands = workspace.review_submitted(&request, &result);
            (commands, workspace.review().phase())
        });
        match &result {
            Ok(()) => info!(submission_id = %request.submission_id, "workspace: review submitted"),
            Err(err) => debug!(submission_id = %request.submission_id, error = %err, "workspace: review rejected"),
        }
        self.emit(WorkspaceUpdate::ReviewChanged(phase));
        self.observe(&result);
        self.run(commands).await;
        result
    }

    pub async fn add_comment(
        self: &Arc<Self>,
        assignment_id: AssignmentId,
        text: &str,
    ) -> ClientResult<Comment> {
        let post = self.with_state(|workspace| workspace.prepare_comment(assignment_id, text))?;
        let result = self.remote.add_comment(post.assignment_id, &post.text).await;
        let commands = self.with_state(|workspace| workspace.comment_posted(&post, &result));
        self.observe(&result);
        self.run(commands).await;
        result
    }

    async fn run(self: &Arc<Self>, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::LoadAssignments(request) => self.spawn_assignments_load(request),
                Command::LoadComments(request) => self.spawn_comments_load(request),
                Command::StartPolling(track_id) => self.start_polling(track_id).await,
                Command::StopPolling => self.stop_polling().await,
            }
        }
    }

    fn spawn_assignments_load(self: &Arc<Self>, request: AssignmentsRequest) {
        let guard = self.tasks.enter();
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            let result = controller.remote.list_assignments(request.track_id).await;
            controller.assignments_completed(request, &result);
        });
    }

    fn spawn_comments_load(self: &Arc<Self>, request: CommentsRequest) {
        let guard = self.tasks.enter();
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            let result = controller
                .remote
                .list_comments(request.assignment_id)
                .await
                .map(chronological);
            controller.comments_completed(request, &result);
        });
    }

    fn assignments_completed(&self, request: AssignmentsRequest, result: &ClientResult<Vec<Assignment>>) {
        match result {
            Ok(assignments) => {
                let applied =
                    self.with_state(|workspace| workspace.assignments_loaded(&request, assignments.clone()));
                match applied {
                    AssignmentsApplied::Stale => debug!(
                        track_id = %request.track_id,
                        generation = request.generation,
                        "workspace: discarded stale assignment list"
                    ),
                    AssignmentsApplied::Applied { selection_dropped } => {
                        self.emit(WorkspaceUpdate::AssignmentsChanged);
                        if selection_dropped {
                            info!(track_id = %request.track_id, "workspace: selected assignment no longer listed");
                            self.emit(WorkspaceUpdate::SelectionChanged(None));
                            self.emit(WorkspaceUpdate::ReviewChanged(ReviewPhase::Idle));
                            self.emit(WorkspaceUpdate::SubmissionChanged);
                            self.emit(WorkspaceUpdate::CommentsChanged(None));
                        }
                    }
                }
            }
            Err(err) => {
                if self.with_state(|workspace| workspace.is_assignments_request_current(&request)) {
                    warn!(track_id = %request.track_id, error = %err, "workspace: assignment load failed");
                    self.emit(WorkspaceUpdate::LoadFailed {
                        target: LoadTarget::Assignments(request.track_id),
                        error: err.clone(),
                    });
                }
            }
        }
        self.observe(result);
    }

    fn comments_completed(&self, request: CommentsRequest, result: &ClientResult<Vec<Comment>>) {
        match result {
            Ok(comments) => {
                if self.with_state(|workspace| workspace.comments_loaded(&request, comments.clone())) {
                    self.emit(WorkspaceUpdate::CommentsChanged(Some(request.assignment_id)));
                } else {
                    debug!(
                        assignment_id = %request.assignment_id,
                        generation = request.generation,
                        "workspace: discarded stale comments"
                    );
                }
            }
            Err(err) => {
                if self.with_state(|workspace| workspace.is_comments_request_current(&request)) {
                    warn!(assignment_id = %request.assignment_id, error = %err, "workspace: comment load failed");
                    self.emit(WorkspaceUpdate::LoadFailed {
                        target: LoadTarget::Comments(request.assignment_id),
                        error: err.clone(),
                    });
                }
            }
        }
        self.observe(result);
    }

    async fn start_polling(&self, track_id: TrackId) {
        let mut slot = self.polling.lock().await;
        if let Some(mut previous) = slot.take() {
            previous.stop().await;
        }
        if self.with_state(|workspace| workspace.selection().track_id()) != Some(track_id) {
            debug!(track_id = %track_id, "poller: track closed before polling started");
            return;
        }
        let sink = Arc::new(FeedSink {
            track_id,
            state: Arc::clone(&self.state),
            updates: self.updates.clone(),
        });
        *slot = Some(self.poller.start(track_id, sink));
    }

    /// Leaves a poller alone when its track was reopened before the stop ran.
    async fn stop_polling(&self) {
        let mut slot = self.polling.lock().await;
        let open_track = self.with_state(|workspace| workspace.selection().track_id());
        if let Some(handle) = slot.as_ref() {
            if open_track == Some(handle.track_id()) {
                debug!(track_id = %handle.track_id(), "poller: track reopened, keeping poller");
                return;
            }
        }
        if let Some(mut handle) = slot.take() {
            handle.stop().await;
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
