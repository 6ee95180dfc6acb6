//! Conversation and text generation.
//!
//! * [`ContextWindow`] — bounded chat history rendered as a ChatML prompt.
//! * [`CompletionEngine`] — async trait implemented by generation backends.
//! * [`ApiCompletionEngine`] — OpenAI-compatible HTTP backend.
//! * [`EngineError`] — load and generation failures.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use desktop_pet::config::PetConfig;
//! use desktop_pet::llm::{ApiCompletionEngine, CompletionEngine, ContextWindow, Role};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = PetConfig::default();
//!     let engine = ApiCompletionEngine::load(&config.llm).await.unwrap();
//!
//!     let mut ctx = ContextWindow::new(&config.assistant.system_prompt, 10);
//!     let reply = engine.generate(&ctx.build_prompt("hello")).await.unwrap();
//!
//!     ctx.add_message(Role::User, "hello");
//!     ctx.add_message(Role::Assistant, reply);
//! }
//! ```

pub mod context;
pub mod engine;

pub use context::{ChatTurn, ContextWindow, Role};
pub use engine::{clean_completion, ApiCompletionEngine, CompletionEngine, EngineError};

#[cfg(test)]
pub use engine::ScriptedEngine;
