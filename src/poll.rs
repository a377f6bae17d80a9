//! Poll-with-backoff primitive
//!
//! Deployment and procedure waits block with a fixed interval, never a busy
//! spin. The sleep is behind a trait so tests inject a fast clock instead of
//! sleeping in real time. Interruption is not modelled; a wait only ends on a
//! terminal status, a polling error, or the optional deadline.

use std::time::Duration;

/// Abstraction over blocking sleeps
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeper backed by `std::thread::sleep`
pub struct RealSleeper;

impl Sleeper for RealSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Poll `fetch` every `interval` until `is_terminal` holds, a fetch fails, or
/// `deadline` (total slept time) elapses. Returns the last observed status;
/// a fetch error abandons the wait with whatever was seen before it.
pub fn poll_status<S, E>(
    interval: Duration,
    deadline: Option<Duration>,
    sleeper: &dyn Sleeper,
    initial: S,
    mut fetch: impl FnMut() -> Result<S, E>,
    is_terminal: impl Fn(&S) -> bool,
) -> S {
    let mut observed = initial;
    let mut slept = Duration::ZERO;
    while !is_terminal(&observed) {
        if let Some(limit) = deadline {
            if slept >= limit {
                break;
            }
        }
        sleeper.sleep(interval);
        slept += interval;
        match fetch() {
            Ok(status) => observed = status,
            Err(_) => break,
        }
    }
    observed
}
