//! Join handle plus stop flag for one background worker thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub struct WorkerHandle {
    name: &'static str,
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn `body` on a named OS thread.  `body` receives the shared
    /// running flag and should return soon after it turns `false`.
    pub fn spawn<F>(name: &'static str, body: F) -> std::io::Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let join = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || body(flag))?;
        log::info!("orchestrator: {name} started");
        Ok(Self {
            name,
            running,
            join: Some(join),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Ask the worker to stop at its next check.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the thread.  A panicked worker is logged, not propagated.
    pub fn join(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        match join.join() {
            Ok(()) => log::info!("orchestrator: {} joined", self.name),
            Err(_) => log::error!("orchestrator: {} panicked", self.name),
        }
    }
}
