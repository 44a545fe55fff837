//! Connection registry for observers receiving archive pushes.
//!
//! A session is registered once its transport is open. The registry holds the
//! sending half of a per-session queue; the transport task holds the
//! [`Session`]. Dropping the `Session` closes it, and the next broadcast
//! prunes the entry instead of erroring.

use std::collections::BTreeMap;
use std::fmt;

use tokio::sync::mpsc;

use livesync_core::Archive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Which transport a session is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Push-only WebSocket observer.
    Socket,
    /// Host-process event subscriber.
    Host,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// Receiving end held by a transport task.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    kind: SessionKind,
    rx: mpsc::UnboundedReceiver<Archive>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Next archive pushed to this session, in publication order.
    pub async fn next(&mut self) -> Option<Archive> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`Session::next`].
    pub fn try_next(&mut self) -> Option<Archive> {
        self.rx.try_recv().ok()
    }
}

struct Entry {
    kind: SessionKind,
    tx: mpsc::UnboundedSender<Archive>,
}

impl Entry {
    fn state(&self) -> SessionState {
        if self.tx.is_closed() {
            SessionState::Closed
        } else {
            SessionState::Open
        }
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    next_id: u64,
    sessions: BTreeMap<SessionId, Entry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: SessionKind) -> Session {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.insert(id, Entry { kind, tx });
        Session { id, kind, rx }
    }

    /// Queue `archive` for a single session. Returns `false` if it is closed.
    pub fn send_to(&mut self, id: SessionId, archive: &Archive) -> bool {
        let delivered = self
            .sessions
            .get(&id)
            .map(|entry| entry.tx.send(archive.clone()).is_ok())
            .unwrap_or(false);
        if !delivered {
            self.sessions.remove(&id);
        }
        delivered
    }

    /// Queue `archive` for every open session except `exclude`.
    ///
    /// Closed sessions are dropped from the registry. Returns how many
    /// sessions received the archive.
    pub fn broadcast(&mut self, archive: &Archive, exclude: Option<SessionId>) -> usize {
        let mut delivered = 0;
        self.sessions.retain(|id, entry| {
            if entry.state() == SessionState::Closed {
                tracing::debug!(session = %id, "pruning closed session");
                return false;
            }
            if Some(*id) == exclude {
                return true;
            }
            match entry.tx.send(archive.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    /// Number of sessions still open.
    pub fn open_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|entry| entry.state() == SessionState::Open)
            .count()
    }

    pub fn open_count_of(&self, kind: SessionKind) -> usize {
        self.sessions
            .values()
            .filter(|entry| entry.kind == kind && entry.state() == SessionState::Open)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_skips_and_prunes_closed_sessions() {
        let mut registry = SessionRegistry::new();
        let mut open = registry.register(SessionKind::Socket);
        let closed = registry.register(SessionKind::Socket);
        drop(closed);

        let delivered = registry.broadcast(&Archive::from_bytes(vec![1]), None);
        assert_eq!(delivered, 1);
        assert_eq!(registry.open_count(), 1);
        assert_eq!(open.try_next(), Some(Archive::from_bytes(vec![1])));
    }

    #[test]
    fn broadcast_skips_only_the_excluded_session() {
        let mut registry = SessionRegistry::new();
        let mut socket = registry.register(SessionKind::Socket);
        let mut sender = registry.register(SessionKind::Host);
        let mut other_host = registry.register(SessionKind::Host);

        let delivered = registry.broadcast(&Archive::from_bytes(vec![7]), Some(sender.id()));
        assert_eq!(delivered, 2);
        assert!(socket.try_next().is_some());
        assert!(other_host.try_next().is_some());
        assert!(sender.try_next().is_none());
        assert_eq!(registry.open_count_of(SessionKind::Host), 2);
    }

    #[test]
    fn sessions_observe_publication_order() {
        let mut registry = SessionRegistry::new();
        let mut session = registry.register(SessionKind::Socket);
        for byte in 1..=3u8 {
            registry.broadcast(&Archive::from_bytes(vec![byte]), None);
        }
        let seen: Vec<u8> = std::iter::from_fn(|| session.try_next())
            .map(|a| a.as_bytes()[0])
            .collect();
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
