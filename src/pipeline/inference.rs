//! Inference worker: think requests in, pet scripts out.
//!
//! ```text
//! AudioInput / ThinkRequest ──▶ ContextWindow::build_prompt
//!                                    │
//!                                    ▼
//!                          CompletionEngine::generate  (blocking)
//!                              │                 │
//!                           Ok(text)           Err(e)
//!                              │                 │
//!        ExecuteScript(pet.say) + UiUpdate     ShowMessage(error)
//!        history += (User, Assistant)          history unchanged
//! ```
//!
//! The worker owns its [`ContextWindow`]; nothing else touches it.  The
//! async engine is driven with `Handle::block_on`, so a slow call blocks
//! this thread only.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::bus::{Event, EventBus};
use crate::llm::{CompletionEngine, ContextWindow, EngineError, Role};
use crate::script::speech_script;

/// Expression pushed after every successful reply.
pub const REPLY_EXPRESSION: &str = "happy";

/// Text shown in the bubble when the engine fails.
pub fn failure_message(error: &EngineError) -> String {
    format!("Sorry, my brain glitched ({error})")
}

pub struct InferenceWorker {
    bus: Arc<EventBus>,
    engine: Arc<dyn CompletionEngine>,
    context: ContextWindow,
    runtime: Handle,
}

impl InferenceWorker {
    pub fn new(
        bus: Arc<EventBus>,
        engine: Arc<dyn CompletionEngine>,
        context: ContextWindow,
        runtime: Handle,
    ) -> Self {
        Self {
            bus,
            engine,
            context,
            runtime,
        }
    }

    /// Serve requests until the bus is closed and drained of requests, or
    /// `running` turns `false`.  Returns the final conversation.
    pub fn run(mut self, running: &AtomicBool) -> ContextWindow {
        log::info!("inference: worker loop started");
        while running.load(Ordering::SeqCst) {
            let Some(event) = self.bus.pop_where(|e| e.kind().is_inference_request()) else {
                log::info!("inference: bus closed");
                break;
            };
            if !running.load(Ordering::SeqCst) {
                log::debug!("inference: stop requested, dropping {}", event.kind());
                break;
            }
            self.handle_request(event.payload());
        }
        log::info!("inference: worker loop finished");
        self.context
    }

    /// One prompt → completion → events cycle.
    pub fn handle_request(&mut self, input: &str) {
        let prompt = self.context.build_prompt(input);
        log::debug!("inference: generating for {input:?} ({} history messages)", self.context.len());

        match self.runtime.block_on(self.engine.generate(&prompt)) {
            Ok(text) => {
                log::info!("inference: reply {text:?}");
                self.bus.push(Event::execute_script(speech_script(&text)));
                self.bus.push(Event::ui_update(REPLY_EXPRESSION));
                self.context.add_message(Role::User, input);
                self.context.add_message(Role::Assistant, text);
            }
            Err(e) => {
                log::warn!("inference: engine failed: {e}");
                self.bus.push(Event::show_message(failure_message(&e)));
            }
        }
    }

    pub fn context(&self) -> &ContextWindow {
        &self.context
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
