// src/bitmap/clock.rs
//
// Cancellable one-shot expiry timer.

use crate::error::{BitmapError, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct ClockState {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// Cancellation flag shared between a clock and its callback.
///
/// A callback that takes a lock before acting must re-check
/// [`is_cancelled`](Self::is_cancelled) under that lock: the clock can be
/// cancelled after the deadline fired but before the callback got the lock.
#[derive(Clone, Debug)]
pub struct CancelToken(Arc<ClockState>);

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.0.cancelled.lock()
    }
}

/// Runs a callback once after a deadline unless cancelled first.
///
/// Dropping the clock cancels it. The timer thread is never joined, so a
/// clock may be cancelled or dropped from inside its own callback.
#[derive(Debug)]
pub struct ExpiryClock {
    state: Arc<ClockState>,
    deadline: Instant,
}

impl ExpiryClock {
    pub fn arm<F>(ttl: Duration, on_expire: F) -> Result<Self>
    where
        F: FnOnce(&CancelToken) + Send + 'static,
    {
        let deadline = Instant::now().checked_add(ttl).ok_or_else(|| {
            BitmapError::invalid_argument("ttl", format!("{ttl:?}"), "deadline overflows the clock")
        })?;
        let state = Arc::new(ClockState::default());
        let token = CancelToken(Arc::clone(&state));

        thread::Builder::new()
            .name("lazy-bitmap-expiry".to_string())
            .spawn(move || {
                {
                    let mut cancelled = token.0.cancelled.lock();
                    while !*cancelled {
                        if token.0.wake.wait_until(&mut cancelled, deadline).timed_out() {
                            break;
                        }
                    }
                    if *cancelled {
                        return;
                    }
                }
                on_expire(&token);
            })
            .map_err(|e| BitmapError::internal_panic(format!("failed to spawn expiry clock: {e}")))?;

        Ok(Self { state, deadline })
    }

    pub fn cancel(&self) {
        let mut cancelled = self.state.cancelled.lock();
        if !*cancelled {
            *cancelled = true;
            self.state.wake.notify_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.cancelled.lock()
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

impl Drop for ExpiryClock {
    fn drop(&mut self) {
        self.cancel();
    }
}
