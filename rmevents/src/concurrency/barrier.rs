//! Memory ordering primitives the queue and the dataflow controller are built on.
//!
//! Each primitive maps onto a [`std::sync::atomic::fence`]. Code that publishes data and
//! then reads a flag owned by another thread must use [`store_load`] between the two.

use std::sync::atomic::{Ordering, fence};

/// Orders every store before this point ahead of every store after it.
///
/// Used before publishing a message so its payload is visible before the link to it.
#[inline]
pub fn store_store() {
    fence(Ordering::Release);
}

/// Orders every store before this point ahead of every load after it.
///
/// This is the only primitive strong enough to prevent store buffering, so it is a full
/// sequentially consistent fence.
#[inline]
pub fn store_load() {
    fence(Ordering::SeqCst);
}

/// Orders all loads and stores on both sides of this point.
#[inline]
pub fn full() {
    fence(Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;

    /// Store buffering: each side stores its flag, fences, then reads the other flag. With a
    /// store-to-load fence on both sides at least one of them sees the other's store.
    fn assert_no_store_buffering(barrier: fn()) {
        const ROUNDS: usize = 2_000;

        let left = Arc::new(AtomicBool::new(false));
        let right = Arc::new(AtomicBool::new(false));
        let right_saw_left = Arc::new(AtomicBool::new(false));
        let start = Arc::new(Barrier::new(2));
        let end = Arc::new(Barrier::new(2));

        let other = {
            let left = Arc::clone(&left);
            let right = Arc::clone(&right);
            let right_saw_left = Arc::clone(&right_saw_left);
            let start = Arc::clone(&start);
            let end = Arc::clone(&end);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    start.wait();
                    right.store(true, Ordering::Relaxed);
                    barrier();
                    right_saw_left.store(left.load(Ordering::Relaxed), Ordering::Relaxed);
                    end.wait();
                }
            })
        };

        for round in 0..ROUNDS {
            left.store(false, Ordering::Relaxed);
            right.store(false, Ordering::Relaxed);
            start.wait();

            left.store(true, Ordering::Relaxed);
            barrier();
            let left_saw_right = right.load(Ordering::Relaxed);
            end.wait();

            assert!(
                left_saw_right || right_saw_left.load(Ordering::Relaxed),
                "both sides missed the other's store in round {round}"
            );
        }

        other.join().unwrap();
    }

    #[test]
    fn store_load_prevents_store_buffering() {
        assert_no_store_buffering(store_load);
    }

    #[test]
    fn full_prevents_store_buffering() {
        assert_no_store_buffering(full);
    }
}
