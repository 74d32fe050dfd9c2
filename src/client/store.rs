use std::sync::Arc;
use tokio::sync::watch;

use crate::models::session::{ title_from_message, ConversationTurn, Role, Session, TurnKind, NEW_CHAT_TITLE };

/// Immutable view of every session. Each effective action produces a new one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    /// Newest first.
    pub sessions: Vec<Session>,
    pub current: Option<String>,
}

impl Snapshot {
    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.current.as_deref().and_then(|id| self.session(id))
    }

    fn session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    CreateSession(Session),
    SelectSession {
        session_id: String,
    },
    DeleteSession {
        session_id: String,
    },
    ClearSession {
        session_id: String,
    },
    PushTurn {
        session_id: String,
        turn: ConversationTurn,
    },
    AppendFragment {
        session_id: String,
        turn_id: String,
        fragment: String,
    },
    CompleteTurn {
        session_id: String,
        turn_id: String,
    },
    /// Sets the final text of a streaming turn and completes it.
    ReplaceTurn {
        session_id: String,
        turn_id: String,
        text: String,
        kind: TurnKind,
    },
    RemoveTurn {
        session_id: String,
        turn_id: String,
    },
}

/// Applies `action` to `snapshot`. `None` means the action changed nothing.
pub fn reduce(snapshot: &Snapshot, action: &Action) -> Option<Snapshot> {
    let mut next = snapshot.clone();
    let changed = match action {
        Action::CreateSession(session) => {
            next.current = Some(session.id.clone());
            next.sessions.insert(0, session.clone());
            true
        }
        Action::SelectSession { session_id } => {
            if next.session(session_id).is_some() && next.current.as_ref() != Some(session_id) {
                next.current = Some(session_id.clone());
                true
            } else {
                false
            }
        }
        Action::DeleteSession { session_id } => {
            let before = next.sessions.len();
            next.sessions.retain(|s| &s.id != session_id);
            if next.sessions.len() == before {
                false
            } else {
                if next.current.as_ref() == Some(session_id) {
                    next.current = next.sessions.first().map(|s| s.id.clone());
                }
                true
            }
        }
        Action::ClearSession { session_id } =>
            match next.session_mut(session_id) {
                Some(session) if !session.turns.is_empty() => {
                    session.turns.clear();
                    true
                }
                _ => false,
            }
        Action::PushTurn { session_id, turn } =>
            match next.session_mut(session_id) {
                Some(session) => {
                    if turn.role == Role::User && session.title == NEW_CHAT_TITLE {
                        session.title = title_from_message(&turn.text);
                    }
                    session.turns.push(turn.clone());
                    true
                }
                None => false,
            }
        Action::AppendFragment { session_id, turn_id, fragment } =>
            match streaming_turn(&mut next, session_id, turn_id) {
                Some(turn) if !fragment.is_empty() => {
                    turn.text.push_str(fragment);
                    true
                }
                _ => false,
            }
        Action::CompleteTurn { session_id, turn_id } =>
            match streaming_turn(&mut next, session_id, turn_id) {
                Some(turn) => {
                    turn.streaming = false;
                    true
                }
                None => false,
            }
        Action::ReplaceTurn { session_id, turn_id, text, kind } =>
            match streaming_turn(&mut next, session_id, turn_id) {
                Some(turn) => {
                    turn.text = text.clone();
                    turn.kind = *kind;
                    turn.streaming = false;
                    true
                }
                None => false,
            }
        Action::RemoveTurn { session_id, turn_id } =>
            match next.session_mut(session_id) {
                Some(session) => {
                    let before = session.turns.len();
                    session.turns.retain(|t| &t.id != turn_id);
                    session.turns.len() != before
                }
                None => false,
            }
    };

    if changed {
        next.version = snapshot.version + 1;
        Some(next)
    } else {
        None
    }
}

/// Only turns still streaming accept changes.
fn streaming_turn<'a>(
    snapshot: &'a mut Snapshot,
    session_id: &str,
    turn_id: &str
) -> Option<&'a mut ConversationTurn> {
    snapshot
        .session_mut(session_id)
        .and_then(|s| s.turn_mut(turn_id))
        .filter(|t| t.streaming)
}

/// Owns the current snapshot and publishes every new one to subscribers.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Arc<Snapshot>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::default()));
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    /// Returns whether the action changed anything.
    pub fn apply(&self, action: Action) -> bool {
        self.tx.send_if_modified(|current| {
            match reduce(current.as_ref(), &action) {
                Some(next) => {
                    *current = Arc::new(next);
                    true
                }
                None => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_session() -> (Snapshot, String) {
        let session = Session::new();
        let id = session.id.clone();
        (reduce(&Snapshot::default(), &Action::CreateSession(session)).unwrap(), id)
    }

    fn push(snapshot: &Snapshot, session_id: &str, turn: ConversationTurn) -> Snapshot {
        reduce(snapshot, &Action::PushTurn { session_id: session_id.into(), turn }).unwrap()
    }

    #[test]
    fn versions_advance_once_per_effective_action() {
        let (snap, id) = with_session();
        assert_eq!(snap.version, 1);
        assert_eq!(snap.current.as_deref(), Some(id.as_str()));

        let again = reduce(&snap, &Action::SelectSession { session_id: id.clone() });
        assert!(again.is_none());
        let missing = reduce(&snap, &Action::ClearSession { session_id: "nope".into() });
        assert!(missing.is_none());
    }

    #[test]
    fn first_user_turn_names_the_session() {
        let (snap, id) = with_session();
        let snap = push(&snap, &id, ConversationTurn::user("what is the airspeed of a laden swallow?"));
        assert_eq!(snap.session(&id).unwrap().title, "what is the airspeed of a lade...");

        let snap = push(&snap, &id, ConversationTurn::user("second"));
        assert_eq!(snap.session(&id).unwrap().title, "what is the airspeed of a lade...");
    }

    #[test]
    fn fragments_accumulate_until_completion() {
        let (snap, id) = with_session();
        let pending = ConversationTurn::pending(TurnKind::Text);
        let turn_id = pending.id.clone();
        let mut snap = push(&snap, &id, pending);

        for fragment in ["Hel", "lo"] {
            snap = reduce(&snap, &Action::AppendFragment {
                session_id: id.clone(),
                turn_id: turn_id.clone(),
                fragment: fragment.into(),
            }).unwrap();
        }
        let done = Action::CompleteTurn { session_id: id.clone(), turn_id: turn_id.clone() };
        snap = reduce(&snap, &done).unwrap();

        let turn = snap.session(&id).unwrap().turn(&turn_id).unwrap();
        assert_eq!(turn.text, "Hello");
        assert!(!turn.streaming);

        assert!(reduce(&snap, &done).is_none());
        let late = Action::AppendFragment {
            session_id: id.clone(),
            turn_id: turn_id.clone(),
            fragment: "!".into(),
        };
        assert!(reduce(&snap, &late).is_none());
        let replace = Action::ReplaceTurn {
            session_id: id,
            turn_id,
            text: "x".into(),
            kind: TurnKind::Text,
        };
        assert!(reduce(&snap, &replace).is_none());
    }

    #[test]
    fn deleting_current_selects_the_next_newest() {
        let (snap, first) = with_session();
        let second = Session::new();
        let second_id = second.id.clone();
        let snap = reduce(&snap, &Action::CreateSession(second)).unwrap();
        assert_eq!(snap.current.as_deref(), Some(second_id.as_str()));

        let snap = reduce(&snap, &Action::DeleteSession { session_id: second_id }).unwrap();
        assert_eq!(snap.current.as_deref(), Some(first.as_str()));

        let snap = reduce(&snap, &Action::DeleteSession { session_id: first }).unwrap();
        assert!(snap.current.is_none());
        assert!(snap.sessions.is_empty());
    }

    #[test]
    fn earlier_snapshots_are_left_untouched() {
        let (snap, id) = with_session();
        let cleared = reduce(&snap, &Action::ClearSession { session_id: id.clone() }).unwrap();
        assert_eq!(snap.session(&id).unwrap().turns.len(), 1);
        assert!(cleared.session(&id).unwrap().turns.is_empty());
    }

    #[tokio::test]
    async fn store_publishes_only_effective_changes() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();
        let session = Session::new();
        let id = session.id.clone();

        assert!(store.apply(Action::CreateSession(session)));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().version, 1);

        assert!(!store.apply(Action::SelectSession { session_id: id }));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.snapshot().version, 1);
    }
}
