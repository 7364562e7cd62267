use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::concurrency::dataflow::DataflowController;

/// Cooperative run flag shared by every thread of one streaming system.
///
/// Threads observe it at the top of their loops. It only ever goes from running to stopped.
#[derive(Debug, Clone)]
pub struct RunSignal {
    running: Arc<AtomicBool>,
}

impl RunSignal {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Requests shutdown. Returns `true` if this call performed the transition.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }
}

impl Default for RunSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Stops a streaming system from any of its threads.
///
/// Clearing the run flag is not enough on its own: a handler blocked on its controller
/// only notices after being signalled, so every controller is checked synchronously.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    signal: RunSignal,
    controllers: Arc<[Arc<DataflowController>]>,
}

impl ShutdownTrigger {
    pub fn new(signal: RunSignal, controllers: Arc<[Arc<DataflowController>]>) -> Self {
        Self {
            signal,
            controllers,
        }
    }

    pub fn is_running(&self) -> bool {
        self.signal.is_running()
    }

    /// Clears the run flag and wakes every blocked handler. Returns `true` on the first call.
    pub fn trigger(&self) -> bool {
        let first = self.signal.stop();
        for controller in self.controllers.iter() {
            controller.check_consumer_sync();
        }

        first
    }

    pub fn controllers(&self) -> &[Arc<DataflowController>] {
        &self.controllers
    }

    /// Returns a guard that triggers shutdown if the current thread unwinds while holding it.
    pub fn guard_panics(&self) -> PanicShutdown {
        PanicShutdown {
            trigger: self.clone(),
        }
    }
}

/// Triggers shutdown when dropped during a panic. See [`ShutdownTrigger::guard_panics`].
#[derive(Debug)]
pub struct PanicShutdown {
    trigger: ShutdownTrigger,
}

impl Drop for PanicShutdown {
    fn drop(&mut self) {
        if thread::panicking() {
            self.trigger.trigger();
        }
    }
}
