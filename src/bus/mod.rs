//! Event bus — the only channel between the foreground loop, the inference
//! worker and the audio worker.
//!
//! ```text
//!   audio worker ──AudioInput──┐
//!   foreground ───ThinkRequest─┤
//!                              ▼
//!                         EventBus (FIFO)
//!                              │
//!          ┌───────────────────┴───────────────────┐
//!          ▼ pop_where(inference kinds)            ▼ try_pop_where(foreground kinds)
//!   inference worker                         foreground loop
//!     └─ExecuteScript / UiUpdate / ShowMessage──▶ (back onto the bus)
//! ```

pub mod event;
pub mod queue;

pub use event::{Event, EventKind};
pub use queue::EventBus;
