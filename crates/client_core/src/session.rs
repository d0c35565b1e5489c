use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

/// Bearer credential issued by the identity endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    token_type: String,
}

impl Session {
    pub fn new(token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_type: token_type.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new(token, "bearer")
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Shared slot for the current credential. Presence of a session is the only
/// session-lifecycle signal the workspace looks at.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        let store = Self::new();
        store.install(session);
        store
    }

    pub fn install(&self, session: Session) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    /// Drops the credential; returns whether one was present.
    pub fn clear(&self) -> bool {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub fn current(&self) -> Option<Session> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_credential_slot() {
        let store = SessionStore::new();
        let other = store.clone();
        assert!(!other.is_authenticated());

        store.install(Session::bearer("token-1"));
        assert_eq!(other.current().map(|s| s.token().to_string()), Some("token-1".into()));

        assert!(other.clear());
        assert!(!store.is_authenticated());
        assert!(!store.clear());
    }

    #[test]
    fn debug_output_never_contains_the_token() {
        let rendered = format!("{:?}", Session::bearer("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }
}
