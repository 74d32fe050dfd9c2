use std::collections::HashMap;

use super::store::Snapshot;
use crate::models::session::{ ConversationTurn, Role, TurnKind };

#[derive(Debug, Clone, Default)]
struct Printed {
    text: String,
    done: bool,
}

/// Turns successive snapshots into terminal output, printing only what is new.
///
/// Snapshots may be skipped; each call diffs against what was printed last.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    session: Option<String>,
    printed: HashMap<String, Printed>,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, snapshot: &Snapshot) -> String {
        let mut out = String::new();
        let Some(session) = snapshot.current_session() else {
            return out;
        };

        if self.session.as_deref() != Some(session.id.as_str()) {
            self.session = Some(session.id.clone());
            self.printed.clear();
            out.push_str(&format!("\n== {} ({}) ==\n", session.title, &session.id[..8.min(session.id.len())]));
        } else if session.turns.is_empty() && !self.printed.is_empty() {
            self.printed.clear();
            out.push_str("\n(session cleared)\n");
        }

        for turn in &session.turns {
            let shown = display_text(turn);
            match self.printed.get_mut(&turn.id) {
                None => {
                    out.push_str(prefix(turn.role));
                    out.push_str(&shown);
                    if !turn.streaming {
                        out.push('\n');
                    }
                    self.printed.insert(turn.id.clone(), Printed { text: shown, done: !turn.streaming });
                }
                Some(printed) if printed.done => {}
                Some(printed) => {
                    if let Some(tail) = shown.strip_prefix(printed.text.as_str()) {
                        out.push_str(tail);
                    } else {
                        out.push('\n');
                        out.push_str(prefix(turn.role));
                        out.push_str(&shown);
                    }
                    if !turn.streaming {
                        out.push('\n');
                        printed.done = true;
                    }
                    printed.text = shown;
                }
            }
        }
        out
    }
}

fn prefix(role: Role) -> &'static str {
    match role {
        Role::User => "you> ",
        Role::Assistant => "ai> ",
    }
}

fn display_text(turn: &ConversationTurn) -> String {
    match turn.kind {
        TurnKind::Image if !turn.streaming => format!("[image] {}", turn.text),
        _ => turn.text.clone(),
    }
}
