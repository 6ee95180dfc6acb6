//! Worker threads and the process lifecycle around them.
//!
//! ```text
//!            ┌──────────────── Orchestrator ────────────────┐
//!            │                                              │
//!   inference-worker          audio-worker           foreground (main thread)
//!   pop_where(requests)       tick: arm/deadline     try_pop_where(ui kinds)
//!   CompletionEngine          CaptureDevice + STT    ScriptHost + surface
//!            │                      │                       │
//!            └──────────────── EventBus ────────────────────┘
//! ```

pub mod audio_worker;
pub mod handle;
pub mod inference;
pub mod orchestrator;

pub use audio_worker::AudioWorker;
pub use handle::WorkerHandle;
pub use inference::{failure_message, InferenceWorker, REPLY_EXPRESSION};
pub use orchestrator::{build_runtime, InitError, Orchestrator};
