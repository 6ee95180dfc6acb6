//! Lua scripting for pet behaviour.
//!
//! The inference worker never touches the pet directly; it emits an
//! `ExecuteScript` event whose payload is built by [`speech_script`].  The
//! foreground runs it in a [`ScriptHost`], whose host callbacks push events
//! back onto the bus through a [`HostApi`].

pub mod escape;
pub mod host;

pub use escape::{escape_lua_literal, speech_script};
pub use host::{HostApi, ScriptError, ScriptHost, MAX_INSTRUCTIONS};
