use tokio::sync::watch;
use tracing::{debug, info};

use crate::{policy::Role, users::dto::PublicUser};

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Active(Session),
    /// The server rejected the token; the user has to log in again.
    Expired,
}

impl SessionState {
    pub fn token(&self) -> Option<&str> {
        match self {
            SessionState::Active(s) => Some(&s.token),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&PublicUser> {
        match self {
            SessionState::Active(s) => Some(&s.user),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(|u| u.role == Role::Admin)
    }
}

/// Single writer, many readers. Clones share the same cell.
#[derive(Clone)]
pub struct SessionHandle {
    tx: watch::Sender<SessionState>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::Anonymous);
        Self { tx }
    }

    pub fn current(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.tx.borrow().token().map(str::to_owned)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn login(&self, token: String, user: PublicUser) {
        info!(user_id = %user.id, "session started");
        self.tx.send_replace(SessionState::Active(Session { token, user }));
    }

    pub fn logout(&self) {
        debug!("session cleared");
        self.tx.send_replace(SessionState::Anonymous);
    }

    /// Drop token and identity after the server refused them.
    pub fn expire(&self) {
        self.tx.send_if_modified(|state| {
            if matches!(state, SessionState::Expired) {
                return false;
            }
            info!("session expired");
            *state = SessionState::Expired;
            true
        });
    }

    /// Swap in a fresher copy of the signed-in user. No-op unless it is the same account.
    pub fn refresh_user(&self, user: PublicUser) {
        self.tx.send_if_modified(|state| match state {
            SessionState::Active(s) if s.user.id == user.id && s.user != user => {
                s.user = user;
                true
            }
            _ => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn user(role: Role) -> PublicUser {
        let now = OffsetDateTime::now_utc();
        PublicUser {
            id: Uuid::new_v4(),
            name: "Bob".into(),
            email: "bob@x.com".into(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn transitions() {
        let session = SessionHandle::new();
        assert_eq!(session.current(), SessionState::Anonymous);
        assert!(session.token().is_none());

        let bob = user(Role::Admin);
        session.login("t1".into(), bob.clone());
        assert_eq!(session.token().as_deref(), Some("t1"));
        assert!(session.current().is_admin());

        session.expire();
        assert_eq!(session.current(), SessionState::Expired);
        assert!(session.current().user().is_none());

        session.login("t2".into(), bob);
        session.logout();
        assert_eq!(session.current(), SessionState::Anonymous);
    }

    #[test]
    fn refresh_only_touches_the_same_account() {
        let session = SessionHandle::new();
        let bob = user(Role::User);
        session.login("t".into(), bob.clone());

        session.refresh_user(user(Role::Admin));
        assert_eq!(session.current().user(), Some(&bob));

        let renamed = PublicUser {
            name: "Robert".into(),
            ..bob
        };
        session.refresh_user(renamed.clone());
        assert_eq!(session.current().user(), Some(&renamed));
        assert_eq!(session.token().as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn subscribers_see_expiry() {
        let session = SessionHandle::new();
        let mut rx = session.subscribe();
        session.login("t".into(), user(Role::User));
        rx.changed().await.unwrap();
        assert!(matches!(*rx.borrow_and_update(), SessionState::Active(_)));

        session.expire();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SessionState::Expired);
    }
}
