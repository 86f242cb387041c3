//! Observable session state.
//!
//! # Design
//! `SessionStore` is an explicit handle passed to every consumer, not a
//! process global, so independent sessions can coexist (one per test, for
//! instance). Each mutation replaces the whole `SessionState` under a write
//! lock; readers observe either the old or the new record, never a mix.
//!
//! Listeners run after the state lock is released and receive the new
//! snapshot in registration order. A separate reentrant lock is held from
//! the write through the last notification, so transitions from different
//! threads reach listeners in the order they were applied. A listener may
//! call `current()`. Mutating the store from inside a listener is allowed,
//! but the order in which other listeners then see the two transitions is
//! unspecified.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};

/// Snapshot of the current authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub token: Option<String>,
    /// True iff `token` is present and non-empty.
    pub is_authenticated: bool,
    /// Riddle id to "has participated" flag.
    pub riddle_participation: BTreeMap<String, bool>,
}

type Listener = Arc<dyn Fn(&SessionState) + Send + Sync>;

#[derive(Default)]
struct Inner {
    state: RwLock<SessionState>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    transition: ReentrantMutex<()>,
}

/// Cloneable handle to one session. Clones share state and listeners.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `token`. No validation; an empty token leaves the session
    /// unauthenticated.
    pub fn set_session(&self, token: impl Into<String>) {
        let token = token.into();
        self.update(|state| {
            state.is_authenticated = !token.is_empty();
            state.token = Some(token);
        });
    }

    /// Return to the initial unauthenticated state.
    pub fn reset(&self) {
        self.replace(SessionState::default());
    }

    pub fn update_riddle_participation(&self, riddle_id: impl Into<String>, participated: bool) {
        let riddle_id = riddle_id.into();
        self.update(|state| {
            state.riddle_participation.insert(riddle_id, participated);
        });
    }

    pub fn current(&self) -> SessionState {
        self.inner.state.read().clone()
    }

    /// The bearer token, if one is set and non-empty.
    pub fn token(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .token
            .clone()
            .filter(|t| !t.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.read().is_authenticated
    }

    /// Register `listener` for every subsequent transition.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    fn update(&self, mutate: impl FnOnce(&mut SessionState)) {
        let _transition = self.inner.transition.lock();
        let snapshot = {
            let mut state = self.inner.state.write();
            let mut next = state.clone();
            mutate(&mut next);
            *state = next.clone();
            next
        };
        self.notify(&snapshot);
    }

    fn replace(&self, next: SessionState) {
        let _transition = self.inner.transition.lock();
        *self.inner.state.write() = next.clone();
        self.notify(&next);
    }

    fn notify(&self, snapshot: &SessionState) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("is_authenticated", &self.is_authenticated())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Detachment handle returned by `SessionStore::subscribe`.
///
/// Dropping the handle does not detach the listener; call `unsubscribe`.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}
