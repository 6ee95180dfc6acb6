//! Desktop pet: a render loop, an LLM worker and a speech worker glued
//! together by one event bus.
//!
//! | Module       | Role                                                   |
//! |--------------|--------------------------------------------------------|
//! | [`bus`]      | typed events and the shared blocking FIFO              |
//! | [`llm`]      | bounded chat history and completion engines            |
//! | [`audio`]    | capture session, cpal device, downmix/resample         |
//! | [`stt`]      | transcription engines (whisper)                        |
//! | [`script`]   | Lua sandbox the pet's replies run in                   |
//! | [`ui`]       | foreground dispatch, speech bubble, window / headless  |
//! | [`hotkey`]   | global key bindings                                    |
//! | [`pipeline`] | worker threads and the orchestrator                    |
//! | [`config`]   | `settings.toml` and platform paths                     |

pub mod audio;
pub mod bus;
pub mod config;
pub mod hotkey;
pub mod llm;
pub mod pipeline;
pub mod script;
pub mod stt;
pub mod ui;
