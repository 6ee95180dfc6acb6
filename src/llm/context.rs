//! Bounded conversational history for prompt construction.
//!
//! [`ContextWindow`] keeps the system prompt apart from a sliding window of
//! [`ChatTurn`]s and renders both into a single ChatML prompt:
//!
//! ```text
//! <|im_start|>system
//! {system prompt}<|im_end|>
//! <|im_start|>user
//! {oldest kept user message}<|im_end|>
//! <|im_start|>assistant
//! {oldest kept reply}<|im_end|>
//! …
//! <|im_start|>user
//! {current input}<|im_end|>
//! <|im_start|>assistant
//! ```
//!
//! The window holds at most `2 × max_turns` messages.  Truncation always drops
//! a whole user/assistant pair from the oldest end.
//!
//! The type has no interior locking; it belongs to the inference worker's
//! thread and nothing else touches it.

use std::collections::VecDeque;
use std::fmt;

/// Opening tag of a ChatML block.
pub const BLOCK_START: &str = "<|im_start|>";
/// Closing tag of a ChatML block; also the generation stop sequence.
pub const BLOCK_END: &str = "<|im_end|>";

// ---------------------------------------------------------------------------
// Role / ChatTurn
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// ChatML role tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of a completed exchange.  Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ContextWindow
// ---------------------------------------------------------------------------

/// Sliding window of chat history plus a fixed system prompt.
///
/// # Example
/// ```rust
/// use desktop_pet::llm::{ContextWindow, Role};
///
/// let mut ctx = ContextWindow::new("Be brief.", 1);
/// ctx.add_message(Role::User, "hi");
/// ctx.add_message(Role::Assistant, "hello!");
/// ctx.add_message(Role::User, "how are you?");
/// ctx.add_message(Role::Assistant, "fine.");
///
/// // Only the newest turn survives.
/// assert_eq!(ctx.len(), 2);
/// let prompt = ctx.build_prompt("bye");
/// assert!(!prompt.contains("hello!"));
/// assert!(prompt.ends_with("<|im_start|>assistant\n"));
/// ```
#[derive(Debug, Clone)]
pub struct ContextWindow {
    system_prompt: String,
    history: VecDeque<ChatTurn>,
    max_turns: usize,
}

impl ContextWindow {
    /// Create an empty window.
    ///
    /// # Panics
    ///
    /// Panics if `max_turns == 0`.
    pub fn new(system_prompt: impl Into<String>, max_turns: usize) -> Self {
        assert!(max_turns > 0, "ContextWindow max_turns must be > 0");
        Self {
            system_prompt: system_prompt.into(),
            history: VecDeque::with_capacity(2 * max_turns + 1),
            max_turns,
        }
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Append a message, then drop the oldest whole turns until the window
    /// holds at most `2 × max_turns` messages.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.history.push_back(ChatTurn::new(role, content));
        self.truncate();
    }

    fn truncate(&mut self) {
        let limit = 2 * self.max_turns;
        let mut dropped = 0;
        while self.history.len() > limit {
            self.history.pop_front();
            self.history.pop_front();
            dropped += 2;
        }
        if dropped > 0 {
            log::debug!(
                "context: dropped {dropped} old message(s), {} kept",
                self.history.len()
            );
        }
    }

    /// Forget all history; the system prompt is kept.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Render the full prompt for `current_input`.
    ///
    /// `current_input` is not added to the history; the caller records it
    /// only after the exchange succeeds.
    pub fn build_prompt(&self, current_input: &str) -> String {
        let body: usize = self.history.iter().map(|t| t.content.len() + 32).sum();
        let mut prompt =
            String::with_capacity(self.system_prompt.len() + body + current_input.len() + 96);

        push_block(&mut prompt, "system", &self.system_prompt);
        for turn in &self.history {
            push_block(&mut prompt, turn.role.as_str(), &turn.content);
        }
        push_block(&mut prompt, Role::User.as_str(), current_input);

        prompt.push_str(BLOCK_START);
        prompt.push_str(Role::Assistant.as_str());
        prompt.push('\n');
        prompt
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Kept messages, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &ChatTurn> {
        self.history.iter()
    }

    /// Number of messages currently held.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

fn push_block(out: &mut String, role: &str, content: &str) {
    out.push_str(BLOCK_START);
    out.push_str(role);
    out.push('\n');
    out.push_str(content);
    out.push_str(BLOCK_END);
    out.push('\n');
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
