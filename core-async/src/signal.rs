//! Single-fire completion signal with multiple subscribers.
//!
//! [`OnceSignal`] carries exactly one value to every subscriber, including
//! subscribers that arrive after the value was published. It is the
//! primitive behind "many waiters, one outcome" patterns such as settling a
//! batch of queued requests from a single execution.
//!
//! ```rust
//! use core_async::signal::OnceSignal;
//!
//! # core_async::runtime::block_on(async {
//! let signal = OnceSignal::new();
//! let early = signal.subscribe();
//!
//! signal.fire("done");
//! assert!(!signal.fire("again"));
//!
//! let late = signal.subscribe();
//! assert_eq!(early.await, Ok("done"));
//! assert_eq!(late.await, Ok("done"));
//! # });
//! ```

use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Error returned to subscribers when every handle to the signal was dropped
/// before it fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalClosed;

impl fmt::Display for SignalClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("signal dropped before firing")
    }
}

impl std::error::Error for SignalClosed {}

struct SignalState<T> {
    value: Option<T>,
    waiters: Vec<oneshot::Sender<T>>,
}

/// A notify-once broadcast.
///
/// Cloning yields another handle to the same signal.
pub struct OnceSignal<T> {
    state: Arc<Mutex<SignalState<T>>>,
}

impl<T: Clone> OnceSignal<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SignalState {
                value: None,
                waiters: Vec::new(),
            })),
        }
    }

    /// Registers a new subscriber.
    ///
    /// If the signal already fired, the returned receiver resolves
    /// immediately with the published value.
    pub fn subscribe(&self) -> OnceReceiver<T> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();
        match &state.value {
            Some(value) => {
                let _ = tx.send(value.clone());
            }
            None => state.waiters.push(tx),
        }
        OnceReceiver { rx }
    }

    /// Publishes `value` to every subscriber, in subscription order.
    ///
    /// Returns `false` (and drops `value`) if the signal had already fired.
    pub fn fire(&self, value: T) -> bool {
        let waiters = {
            let mut state = self.state.lock();
            if state.value.is_some() {
                return false;
            }
            state.value = Some(value.clone());
            std::mem::take(&mut state.waiters)
        };

        for waiter in waiters {
            // A subscriber that stopped listening is not an error.
            let _ = waiter.send(value.clone());
        }
        true
    }

    pub fn is_fired(&self) -> bool {
        self.state.lock().value.is_some()
    }

    /// Number of subscribers still waiting for the value.
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }
}

impl<T: Clone> Default for OnceSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for OnceSignal<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for OnceSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("OnceSignal")
            .field("fired", &state.value.is_some())
            .field("waiting", &state.waiters.len())
            .finish()
    }
}

/// Future returned by [`OnceSignal::subscribe`].
#[derive(Debug)]
pub struct OnceReceiver<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for OnceReceiver<T> {
    type Output = Result<T, SignalClosed>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map_err(|_| SignalClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_subscribers_receive_value() {
        let signal = OnceSignal::new();
        let receivers: Vec<_> = (0..3).map(|_| signal.subscribe()).collect();
        assert_eq!(signal.waiting(), 3);

        assert!(signal.fire(String::from("foo")));

        for rx in receivers {
            assert_eq!(rx.await.unwrap(), "foo");
        }
        assert_eq!(signal.waiting(), 0);
    }

    #[tokio::test]
    async fn test_fires_only_once() {
        let signal = OnceSignal::new();
        let rx = signal.subscribe();

        assert!(signal.fire(1));
        assert!(!signal.fire(2));
        assert!(signal.is_fired());
        assert_eq!(rx.await, Ok(1));
        assert_eq!(signal.subscribe().await, Ok(1));
    }

    #[tokio::test]
    async fn test_dropped_signal_closes_receivers() {
        let signal: OnceSignal<u32> = OnceSignal::new();
        let rx = signal.subscribe();
        drop(signal);
        assert_eq!(rx.await, Err(SignalClosed));
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let signal = OnceSignal::new();
        let other = signal.clone();
        let rx = signal.subscribe();

        other.fire(5u8);
        assert!(signal.is_fired());
        assert_eq!(rx.await, Ok(5));
    }

    #[test]
    fn test_dropped_subscriber_does_not_block_fire() {
        let signal = OnceSignal::new();
        drop(signal.subscribe());
        let kept = signal.subscribe();
        assert!(signal.fire(9));
        assert_eq!(crate::runtime::block_on(kept), Ok(9));
    }
}
