use super::*;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use shared::{
    domain::{AssignmentId, SubmissionId},
    protocol::{Assignment, Comment, NotificationKind, ReviewAssignment, SubmitOutcome},
};

use crate::{error::ClientResult, workspace::NotificationFeed};

fn note(message: &str) -> Notification {
    Notification {
        kind: NotificationKind::CodeReview,
        message: message.to_string(),
        assignment_id: None,
    }
}

/// Only the notification endpoint is scripted. The first `failures` calls
/// fail; call number `slow_call` (if any) takes 90 seconds.
#[derive(Default)]
struct ScriptedFeed {
    calls: AtomicUsize,
    failures: usize,
    slow_call: Option<usize>,
}

impl ScriptedFeed {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteService for ScriptedFeed {
    async fn list_assignments(&self, _track_id: TrackId) -> ClientResult<Vec<Assignment>> {
        Err(ClientError::network("unused"))
    }

    async fn submit_solution(
        &self,
        _assignment_id: AssignmentId,
        _repository_url: &str,
    ) -> ClientResult<SubmitOutcome> {
        Err(ClientError::network("unused"))
    }

    async fn request_review(&self, _assignment_id: AssignmentId) -> ClientResult<ReviewAssignment> {
        Err(ClientError::network("unused"))
    }

    async fn submit_review(
        &self,
        _submission_id: SubmissionId,
        _score: f64,
        _comment: &str,
    ) -> ClientResult<()> {
        Err(ClientError::network("unused"))
    }

    async fn list_comments(&self, _assignment_id: AssignmentId) -> ClientResult<Vec<Comment>> {
        Err(ClientError::network("unused"))
    }

    async fn add_comment(&self, _assignment_id: AssignmentId, _text: &str) -> ClientResult<Comment> {
        Err(ClientError::network("unused"))
    }

    async fn list_notifications(&self) -> ClientResult<Vec<Notification>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(ClientError::network("connection reset"));
        }
        if self.slow_call == Some(call) {
            tokio::time::sleep(Duration::from_secs(90)).await;
            return Ok(vec![note(&format!("slow {call}"))]);
        }
        Ok(vec![note(&format!("fetch {call}"))])
    }
}

#[derive(Default)]
struct FeedSink {
    feed: Mutex<NotificationFeed>,
    failures: AtomicUsize,
}

impl FeedSink {
    fn messages(&self) -> Vec<String> {
        self.feed
            .lock()
            .expect("feed")
            .notifications()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }
}

impl NotificationSink for FeedSink {
    fn begin_fetch(&self) -> u64 {
        self.feed.lock().expect("feed").issue()
    }

    fn publish(&self, sequence: u64, notifications: Vec<Notification>) {
        self.feed.lock().expect("feed").apply(sequence, notifications);
    }

    fn report_failure(&self, sequence: u64, error: &ClientError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        self.feed.lock().expect("feed").record_failure(sequence, error);
    }
}

fn poller(remote: Arc<ScriptedFeed>) -> NotificationPoller {
    NotificationPoller::new(remote, NOTIFICATION_POLL_INTERVAL)
}

#[tokio::test(start_paused = true)]
async fn first_fetch_is_immediate_then_periodic() {
    let remote = Arc::new(ScriptedFeed::default());
    let sink = Arc::new(FeedSink::default());
    let mut handle = poller(Arc::clone(&remote)).start(TrackId(7), sink.clone());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(remote.calls(), 1);
    assert_eq!(sink.messages(), vec!["fetch 1".to_string()]);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(remote.calls(), 2);
    assert_eq!(sink.messages(), vec!["fetch 2".to_string()]);
    assert!(handle.is_running());
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn no_fetch_happens_after_stop() {
    let remote = Arc::new(ScriptedFeed::default());
    let sink = Arc::new(FeedSink::default());
    let mut handle = poller(Arc::clone(&remote)).start(TrackId(7), sink);

    tokio::time::sleep(Duration::from_secs(125)).await;
    assert_eq!(remote.calls(), 3);

    handle.stop().await;
    assert!(!handle.is_running());
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(remote.calls(), 3);

    handle.stop().await;
    assert_eq!(remote.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_polling() {
    let remote = Arc::new(ScriptedFeed::default());
    let handle = poller(Arc::clone(&remote)).start(TrackId(7), Arc::new(FeedSink::default()));
    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(handle);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(remote.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn failures_are_reported_and_polling_continues() {
    let remote = Arc::new(ScriptedFeed {
        failures: 2,
        ..ScriptedFeed::default()
    });
    let sink = Arc::new(FeedSink::default());
    let mut handle = poller(Arc::clone(&remote)).start(TrackId(7), sink.clone());

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(sink.failures.load(Ordering::SeqCst), 2);
    assert!(sink.messages().is_empty());
    assert!(handle.is_running());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(remote.calls(), 3);
    assert_eq!(sink.messages(), vec!["fetch 3".to_string()]);
    assert!(sink.feed.lock().expect("feed").last_error().is_none());
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn slow_response_never_overwrites_a_newer_one() {
    let remote = Arc::new(ScriptedFeed {
        slow_call: Some(1),
        ..ScriptedFeed::default()
    });
    let sink = Arc::new(FeedSink::default());
    let mut handle = poller(Arc::clone(&remote)).start(TrackId(7), sink.clone());

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(sink.messages(), vec!["fetch 2".to_string()]);

    // the first fetch completes at t=90 with sequence 1
    tokio::time::sleep(Duration::from_secs(39)).await;
    assert_eq!(remote.calls(), 2);
    assert_eq!(sink.messages(), vec!["fetch 2".to_string()]);
    handle.stop().await;
}

#[test]
fn zero_period_falls_back_to_default() {
    let poller = NotificationPoller::new(Arc::new(ScriptedFeed::default()), Duration::ZERO);
    assert_eq!(poller.period(), NOTIFICATION_POLL_INTERVAL);
}
