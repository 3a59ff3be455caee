//! Session capability: who is signed in, and change notifications for it.
//!
//! The polling coordinator never talks to the auth stack directly. The host
//! application owns a [`SessionHandle`] and flips it on login/logout; the
//! coordinator follows the subscription side. Tests drive a handle of their
//! own instead of a real auth flow.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Minimal identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Backend user id.
    pub id: i64,

    /// Display username.
    pub username: String,
}

/// Writer side of the session state. Cheap to clone; all clones share the
/// same underlying channel.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: watch::Sender<Option<UserIdentity>>,
}

impl SessionHandle {
    /// Create a handle with no user signed in.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Record a successful login.
    pub fn sign_in(&self, user: UserIdentity) {
        self.tx.send_replace(Some(user));
    }

    /// Record a logout.
    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }

    /// The currently signed-in user, if any.
    pub fn current(&self) -> Option<UserIdentity> {
        self.tx.borrow().clone()
    }

    /// Subscribe to session changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.tx.subscribe()
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}
