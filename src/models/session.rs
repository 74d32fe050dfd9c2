use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

pub const NEW_CHAT_TITLE: &str = "New Chat";
pub const WELCOME_TEXT: &str =
    "Hello! I'm your AI assistant. I can help you with conversations, answer questions, and generate images. Type /help to see available commands!";
const TITLE_CHARS: usize = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    Text,
    /// `text` holds the URL of a generated image.
    Image,
    /// Local text (welcome, help, errors) that is never sent upstream.
    Notice,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub role: Role,
    pub kind: TurnKind,
    pub text: String,
    pub streaming: bool,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::build(Role::User, TurnKind::Text, text.into(), false)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::build(Role::Assistant, TurnKind::Text, text.into(), false)
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self::build(Role::Assistant, TurnKind::Notice, text.into(), false)
    }

    /// Empty assistant turn waiting for streamed fragments.
    pub fn pending(kind: TurnKind) -> Self {
        Self::build(Role::Assistant, kind, String::new(), true)
    }

    fn build(role: Role, kind: TurnKind, text: String, streaming: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            kind,
            text,
            streaming,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub turns: Vec<ConversationTurn>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: NEW_CHAT_TITLE.to_string(),
            turns: vec![ConversationTurn::notice(WELCOME_TEXT)],
            created_at: Utc::now(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.turns.iter().any(|t| t.streaming)
    }

    pub fn turn(&self, turn_id: &str) -> Option<&ConversationTurn> {
        self.turns.iter().find(|t| t.id == turn_id)
    }

    pub fn turn_mut(&mut self, turn_id: &str) -> Option<&mut ConversationTurn> {
        self.turns.iter_mut().find(|t| t.id == turn_id)
    }

    pub fn last_turn_of(&self, role: Role) -> Option<&ConversationTurn> {
        self.turns.iter().rev().find(|t| t.role == role)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

pub fn title_from_message(text: &str) -> String {
    let head: String = text.chars().take(TITLE_CHARS).collect();
    format!("{}...", head)
}
