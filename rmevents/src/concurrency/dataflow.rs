//! Blocking and wakeup handshake between the producers feeding one consumer and that
//! consumer.
//!
//! The consumer announces it is about to block by raising `consumer_to_block` while holding
//! the lock, then rechecks its queues. A producer that is about to go idle publishes its
//! data, then reads the flag. Both sides put a store-to-load fence between their write and
//! their read, so at least one of them observes the other: either the consumer sees the new
//! data and resumes, or the producer sees the flag and signals.
//!
//! ```text
//! consumer: lock; flag = true; store_load(); recheck queue; wait | resume
//! producer: enqueue;            store_load(); read flag;     lock; signal
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, TryLockError};

use crate::concurrency::barrier;

/// Result of a producer's wakeup check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    /// The consumer was not preparing to block.
    Running,
    /// The consumer was signalled.
    Delivered,
    /// The lock was busy. The caller should check again on its next iteration.
    Pending,
}

/// Handshake object shared by every producer of one consumer.
#[derive(Debug)]
pub struct DataflowController {
    lock: Mutex<()>,
    wakeup: Condvar,
    consumer_to_block: AtomicBool,
}

impl DataflowController {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            wakeup: Condvar::new(),
            consumer_to_block: AtomicBool::new(false),
        }
    }

    /// Consumer side: moves from running to about-to-block.
    ///
    /// The lock is held by the returned guard until [`AboutToBlock::resume_with_data`], so
    /// no producer can signal between the caller's final queue recheck and its wait.
    pub fn waiting_for_data(&self) -> AboutToBlock<'_> {
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.consumer_to_block.store(true, Ordering::Relaxed);
        barrier::store_load();

        AboutToBlock {
            controller: self,
            guard,
        }
    }

    /// Producer side, while the producer keeps running.
    ///
    /// A plain flag load when the consumer is running. Never blocks.
    pub fn check_consumer(&self) -> WakeOutcome {
        if !self.consumer_to_block.load(Ordering::Relaxed) {
            return WakeOutcome::Running;
        }

        match self.lock.try_lock() {
            Ok(_guard) => {
                self.wakeup.notify_one();
                WakeOutcome::Delivered
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                let _guard = poisoned.into_inner();
                self.wakeup.notify_one();
                WakeOutcome::Delivered
            }
            Err(TryLockError::WouldBlock) => WakeOutcome::Pending,
        }
    }

    /// Producer side, right before the producer blocks itself.
    ///
    /// The fence makes the producer's enqueued data visible before the flag is read. If the
    /// consumer is preparing to block, waits for it to reach the condition variable and
    /// signals it.
    pub fn check_consumer_sync(&self) -> WakeOutcome {
        barrier::store_load();
        if !self.consumer_to_block.load(Ordering::Relaxed) {
            return WakeOutcome::Running;
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.wakeup.notify_one();

        WakeOutcome::Delivered
    }

    /// Returns `true` while the consumer is between `waiting_for_data` and resuming.
    pub fn is_consumer_blocking(&self) -> bool {
        self.consumer_to_block.load(Ordering::Relaxed)
    }
}

impl Default for DataflowController {
    fn default() -> Self {
        Self::new()
    }
}

/// The consumer has announced it will block and holds the controller lock.
#[must_use = "the consumer must either wait for data or resume"]
pub struct AboutToBlock<'a> {
    controller: &'a DataflowController,
    guard: MutexGuard<'a, ()>,
}

impl<'a> AboutToBlock<'a> {
    /// Blocks until a producer signals. The lock is released while blocked.
    ///
    /// Returns with the lock held again. Wakeups may be spurious, so the caller rechecks its
    /// queues after resuming.
    pub fn wait_for_data(self) -> AboutToBlock<'a> {
        debug_assert!(self.controller.consumer_to_block.load(Ordering::Relaxed));

        let AboutToBlock { controller, guard } = self;
        let guard = controller
            .wakeup
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner);

        AboutToBlock { controller, guard }
    }

    /// Returns to running: clears the flag, then releases the lock.
    pub fn resume_with_data(self) {
        self.controller
            .consumer_to_block
            .store(false, Ordering::Relaxed);
        drop(self.guard);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn running_consumer_needs_no_wakeup() {
        let controller = DataflowController::new();

        assert_eq!(controller.check_consumer(), WakeOutcome::Running);
        assert_eq!(controller.check_consumer_sync(), WakeOutcome::Running);
    }

    #[test]
    fn producer_check_is_pending_while_consumer_rechecks() {
        let controller = DataflowController::new();

        let about_to_block = controller.waiting_for_data();
        assert!(controller.is_consumer_blocking());
        assert_eq!(controller.check_consumer(), WakeOutcome::Pending);

        about_to_block.resume_with_data();
        assert!(!controller.is_consumer_blocking());
        assert_eq!(controller.check_consumer(), WakeOutcome::Running);
    }

    #[test]
    fn sync_check_wakes_a_blocked_consumer() {
        let controller = Arc::new(DataflowController::new());
        let ready = Arc::new(AtomicUsize::new(0));

        let consumer_controller = Arc::clone(&controller);
        let consumer_ready = Arc::clone(&ready);
        let consumer = thread::spawn(move || {
            let mut about_to_block = consumer_controller.waiting_for_data();
            while consumer_ready.load(Ordering::SeqCst) == 0 {
                about_to_block = about_to_block.wait_for_data();
            }
            about_to_block.resume_with_data();
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        while !controller.is_consumer_blocking() {
            assert!(Instant::now() < deadline, "consumer never started blocking");
            thread::yield_now();
        }

        ready.store(1, Ordering::SeqCst);
        // The consumer may observe `ready` on its own before the flag is read.
        assert_ne!(controller.check_consumer_sync(), WakeOutcome::Pending);

        consumer.join().unwrap();
        assert!(!controller.is_consumer_blocking());
    }
}
