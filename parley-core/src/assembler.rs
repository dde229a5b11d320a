//! Conversation assembly.
//!
//! Turns a request's raw text fields into the ordered message list a runtime
//! expects. The layout is fixed:
//!
//! 1. exactly one system message, synthesized from the caller's system text
//!    or the mode default
//! 2. prior turns (chat) or assistant priming statements (persona mode)
//! 3. the user's message, always last
//!
//! Runtimes weight the most recent role transitions, so persona priming must
//! sit between the system message and the final user turn.

use crate::error::ParleyError;
use crate::types::{Conversation, Message, Mode, Role, Turn};

/// Default system text for a mode
pub fn default_system_text(mode: Mode) -> String {
    match mode {
        Mode::Suggestion => "You are a helpful assistant that outputs in JSON. \
            you should always return a list of 3 valid movie names."
            .to_string(),
        Mode::Chat => "You are a helpful assistant.".to_string(),
        Mode::Story => "You are a Children's book author.".to_string(),
    }
}

/// Assistant-role directives that shape the story persona.
pub fn story_priming() -> Vec<String> {
    [
        "You are a Children's book author.",
        "you should always reply the user with a new unique story that you generate on the spot.",
        "avoid using gender specific terms, instead of boy or girl, use kid for example. use 'they' pronounce.",
        "the main character of the story is the name of the user given to you on the prompt.",
        "try to teach the kid about the topic given to you.",
        "the story should be positive and appropriate for kids.",
        "the story should be at least 2500 words long.",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Builds conversations for one interaction mode.
#[derive(Debug, Clone, Copy)]
pub struct MessageAssembler {
    mode: Mode,
}

impl MessageAssembler {
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Assemble a conversation from system text, prior turns and the user's message.
    ///
    /// Blank system text falls back to the mode default. Prior turns may only
    /// be user or assistant turns; blank ones are skipped.
    pub fn assemble(
        &self,
        system_text: Option<&str>,
        prior_turns: &[Turn],
        user_text: &str,
    ) -> Result<Conversation, ParleyError> {
        let user = Self::require_user_text(user_text)?;

        let mut messages = Vec::with_capacity(prior_turns.len() + 2);
        messages.push(self.system_message(system_text));

        for (index, turn) in prior_turns.iter().enumerate() {
            if turn.role == Role::System {
                return Err(ParleyError::invalid_input(format!(
                    "prior turn {} has the system role; pass system text separately",
                    index
                )));
            }
            if turn.text.trim().is_empty() {
                continue;
            }
            messages.push(Message {
                role: turn.role,
                content: turn.text.clone(),
            });
        }

        messages.push(Message::user(user));
        Ok(Conversation::from_messages(messages))
    }

    /// Assemble a persona conversation.
    ///
    /// Each priming statement becomes an assistant message, in the given
    /// order, between the system message and the prompt. Blank statements
    /// are kept as they are.
    pub fn assemble_persona(
        &self,
        system_text: Option<&str>,
        priming: &[String],
        prompt: &str,
    ) -> Result<Conversation, ParleyError> {
        let user = Self::require_user_text(prompt)?;

        let mut messages = Vec::with_capacity(priming.len() + 2);
        messages.push(self.system_message(system_text));
        messages.extend(
            priming
                .iter()
                .map(|statement| Message::assistant(statement.as_str())),
        );
        messages.push(Message::user(user));

        Ok(Conversation::from_messages(messages))
    }

    fn system_message(&self, system_text: Option<&str>) -> Message {
        match system_text.filter(|text| !text.trim().is_empty()) {
            Some(text) => Message::system(text),
            None => Message::system(default_system_text(self.mode)),
        }
    }

    fn require_user_text(user_text: &str) -> Result<&str, ParleyError> {
        if user_text.trim().is_empty() {
            return Err(ParleyError::invalid_input("user text must not be empty"));
        }
        Ok(user_text)
    }
}

/// Keep only the most recent `max_words` whitespace-separated words of history.
///
/// Whole turns are kept verbatim while they fit. The oldest turn that crosses
/// the budget keeps its trailing words; anything older is dropped.
pub fn truncate_history(turns: &[Turn], max_words: usize) -> Vec<Turn> {
    let mut remaining = max_words;
    let mut kept = Vec::new();

    for turn in turns.iter().rev() {
        if remaining == 0 {
            break;
        }

        let words: Vec<&str> = turn.text.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }

        if words.len() <= remaining {
            remaining -= words.len();
            kept.push(turn.clone());
        } else {
            kept.push(Turn {
                role: turn.role,
                text: words[words.len() - remaining..].join(" "),
            });
            remaining = 0;
        }
    }

    kept.reverse();
    kept
}
