use log::{ error, info };
use std::sync::Arc;

use super::commands::{ help_text, unknown_command_text, Input };
use super::consumer::{ ConsumeOutcome, StreamConsumer, STREAM_ERROR_TEXT };
use super::image::{ ImageClient, IMAGE_ERROR_TEXT };
use super::store::{ Action, SessionStore, Snapshot };
use crate::models::chat::{ ChatMessage, ChatRequest };
use crate::models::session::{ ConversationTurn, Role, Session, TurnKind };
use crate::stream::ByteSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    /// A reply is still streaming in the current session.
    Busy,
    Reply(ConsumeOutcome),
    Image {
        ok: bool,
    },
    /// Applied to the store; the renderer shows the result.
    Updated,
    /// Text for the user that does not belong in the transcript.
    Notice(String),
}

/// Result of reading one input line.
pub enum Dispatch {
    Done(Outcome),
    /// A pending turn is in the store; `Job::run` fills it in.
    Started(Job),
}

/// A reply or image request whose pending turn already marks the session busy.
pub struct Job {
    store: SessionStore,
    session_id: String,
    turn_id: String,
    work: Work,
}

enum Work {
    Reply {
        relay: Arc<dyn ByteSource>,
        request: ChatRequest,
    },
    Image {
        images: ImageClient,
        prompt: String,
    },
}

impl Job {
    pub async fn run(self) -> Outcome {
        let Job { store, session_id, turn_id, work } = self;
        match work {
            Work::Reply { relay, request } => {
                let mut consumer = StreamConsumer::new(&store, &session_id, &turn_id);
                let outcome = match relay.open(&request).await {
                    Ok(stream) => consumer.consume(stream).await,
                    Err(e) => {
                        error!("Chat error: {}", e);
                        consumer.fail()
                    }
                };
                info!("Reply {} finished: {:?} ({} chars)", turn_id, outcome, consumer.received().len());
                Outcome::Reply(outcome)
            }
            Work::Image { images, prompt } => {
                let (text, kind, ok) = match images.generate(&prompt).await {
                    Ok(url) => (url, TurnKind::Image, true),
                    Err(e) => {
                        error!("Image generation failed: {}", e);
                        (IMAGE_ERROR_TEXT.to_string(), TurnKind::Notice, false)
                    }
                };
                store.apply(Action::ReplaceTurn { session_id, turn_id, text, kind });
                Outcome::Image { ok }
            }
        }
    }
}

/// Turns user input into store actions and stream requests.
pub struct Dispatcher {
    store: SessionStore,
    relay: Arc<dyn ByteSource>,
    images: ImageClient,
    model: Option<String>,
    temperature: Option<f64>,
}

impl Dispatcher {
    pub fn new(
        store: SessionStore,
        relay: Arc<dyn ByteSource>,
        images: ImageClient,
        model: Option<String>,
        temperature: Option<f64>
    ) -> Self {
        let dispatcher = Self {
            store,
            relay,
            images,
            model,
            temperature,
        };
        dispatcher.ensure_session();
        dispatcher
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Handles one input and waits for any reply it starts.
    pub async fn dispatch(&self, input: Input) -> Outcome {
        match self.start(input) {
            Dispatch::Done(outcome) => outcome,
            Dispatch::Started(job) => job.run().await,
        }
    }

    /// Applies the input without awaiting anything. Replies and images come
    /// back as a `Job` whose pending turn is already streaming, so a second
    /// send is refused until the job ends.
    pub fn start(&self, input: Input) -> Dispatch {
        let Some(session_id) = self.store.snapshot().current.clone() else {
            self.ensure_session();
            return Dispatch::Done(Outcome::Ignored);
        };

        let outcome = match input {
            Input::Empty => Outcome::Ignored,
            Input::Message(text) => {
                if self.is_busy(&session_id) {
                    return Dispatch::Done(Outcome::Busy);
                }
                self.store.apply(Action::PushTurn {
                    session_id: session_id.clone(),
                    turn: ConversationTurn::user(text),
                });
                return Dispatch::Started(self.reply(session_id));
            }
            Input::Retry => {
                if self.is_busy(&session_id) {
                    return Dispatch::Done(Outcome::Busy);
                }
                return match self.regenerate(session_id) {
                    Some(job) => Dispatch::Started(job),
                    None => Dispatch::Done(Outcome::Ignored),
                };
            }
            Input::Image(prompt) => {
                if self.is_busy(&session_id) {
                    return Dispatch::Done(Outcome::Busy);
                }
                return Dispatch::Started(self.image(session_id, prompt));
            }
            Input::MissingArgument(usage) => Outcome::Notice(format!("Usage: {}", usage)),
            Input::Help => {
                self.note(&session_id, help_text());
                Outcome::Updated
            }
            Input::Unknown(name) => {
                self.note(&session_id, unknown_command_text(&name));
                Outcome::Updated
            }
            Input::Clear => {
                self.store.apply(Action::ClearSession { session_id });
                Outcome::Updated
            }
            Input::New => {
                self.store.apply(Action::CreateSession(Session::new()));
                Outcome::Updated
            }
            Input::Sessions => Outcome::Notice(list_sessions(&self.store.snapshot())),
            Input::Switch(prefix) =>
                match self.find_session(&prefix) {
                    Ok(id) => {
                        self.store.apply(Action::SelectSession { session_id: id });
                        Outcome::Updated
                    }
                    Err(msg) => Outcome::Notice(msg),
                }
            Input::Delete(prefix) =>
                match self.find_session(&prefix) {
                    Ok(id) => {
                        self.store.apply(Action::DeleteSession { session_id: id });
                        self.ensure_session();
                        Outcome::Updated
                    }
                    Err(msg) => Outcome::Notice(msg),
                }
        };
        Dispatch::Done(outcome)
    }

    fn ensure_session(&self) {
        if self.store.snapshot().current.is_none() {
            self.store.apply(Action::CreateSession(Session::new()));
        }
    }

    fn is_busy(&self, session_id: &str) -> bool {
        self.store
            .snapshot()
            .session(session_id)
            .map(|s| s.is_busy())
            .unwrap_or(false)
    }

    fn note(&self, session_id: &str, text: String) {
        self.store.apply(Action::PushTurn {
            session_id: session_id.to_string(),
            turn: ConversationTurn::notice(text),
        });
    }

    /// Every completed text turn, in order. Images and notices stay local.
    fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.store
            .snapshot()
            .session(session_id)
            .map(|s| {
                s.turns
                    .iter()
                    .filter(|t| t.kind == TurnKind::Text && !t.streaming && !t.text.is_empty())
                    .map(|t| ChatMessage::new(t.role.as_str(), t.text.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        let mut request = ChatRequest::new(messages);
        request.model = self.model.clone();
        request.temperature = self.temperature;
        request
    }

    fn pending(&self, session_id: String, kind: TurnKind, work: Work) -> Job {
        let pending = ConversationTurn::pending(kind);
        let turn_id = pending.id.clone();
        self.store.apply(Action::PushTurn {
            session_id: session_id.clone(),
            turn: pending,
        });
        Job {
            store: self.store.clone(),
            session_id,
            turn_id,
            work,
        }
    }

    fn reply(&self, session_id: String) -> Job {
        let request = self.request(self.history(&session_id));
        let work = Work::Reply { relay: self.relay.clone(), request };
        self.pending(session_id, TurnKind::Text, work)
    }

    fn image(&self, session_id: String, prompt: String) -> Job {
        let work = Work::Image { images: self.images.clone(), prompt };
        self.pending(session_id, TurnKind::Image, work)
    }

    /// Drops the last answer (or failed-reply error) and asks again. Other
    /// notices such as help output are left alone.
    fn regenerate(&self, session_id: String) -> Option<Job> {
        let snapshot = self.store.snapshot();
        let session = snapshot.session(&session_id)?;
        session.last_turn_of(Role::User)?;
        let last_answer = session.turns
            .iter()
            .rev()
            .find(|t| {
                t.role == Role::Assistant &&
                    (t.kind == TurnKind::Text ||
                        (t.kind == TurnKind::Notice && t.text == STREAM_ERROR_TEXT))
            })?;

        self.store.apply(Action::RemoveTurn {
            session_id: session_id.clone(),
            turn_id: last_answer.id.clone(),
        });
        Some(self.reply(session_id))
    }

    fn find_session(&self, prefix: &str) -> Result<String, String> {
        let snapshot = self.store.snapshot();
        let matches: Vec<&Session> = snapshot.sessions
            .iter()
            .filter(|s| s.id.starts_with(prefix))
            .collect();
        match matches.as_slice() {
            [only] => Ok(only.id.clone()),
            [] => Err(format!("No session matches '{}'", prefix)),
            _ => Err(format!("'{}' matches {} sessions; use a longer prefix", prefix, matches.len())),
        }
    }
}

fn list_sessions(snapshot: &Snapshot) -> String {
    snapshot.sessions
        .iter()
        .map(|s| {
            let marker = if snapshot.current.as_ref() == Some(&s.id) { "*" } else { " " };
            format!(
                "{} {}  {}  ({} turns, {})",
                marker,
                &s.id[..8.min(s.id.len())],
                s.title,
                s.turns.len(),
                s.created_at.format("%Y-%m-%d %H:%M")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
