use shared::protocol::Notification;

use crate::error::ClientError;

/// Latest notification batch. Fetches are numbered as they are issued and a
/// completion is kept only if it belongs to the newest one.
#[derive(Debug, Default)]
pub struct NotificationFeed {
    issued: u64,
    notifications: Vec<Notification>,
    last_error: Option<ClientError>,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    pub fn is_latest(&self, sequence: u64) -> bool {
        sequence == self.issued
    }

    pub fn apply(&mut self, sequence: u64, notifications: Vec<Notification>) -> bool {
        if !self.is_latest(sequence) {
            return false;
        }
        self.notifications = notifications;
        self.last_error = None;
        true
    }

    /// A failed fetch keeps the previous batch on display.
    pub fn record_failure(&mut self, sequence: u64, error: &ClientError) -> bool {
        if !self.is_latest(sequence) {
            return false;
        }
        self.last_error = Some(error.clone());
        true
    }

    pub fn clear(&mut self) {
        self.issued += 1;
        self.notifications.clear();
        self.last_error = None;
    }
}
