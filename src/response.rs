//! Result delivery from worker loops back to the caller's own context.
//!
//! Every operation submitted to a [`SerialExecutor`](crate::executor::SerialExecutor)
//! is paired with a result slot. The worker side holds a [`Responder`], the
//! caller side an [`AsyncResult`] (or a callback of its choosing). The worker
//! fills the slot and signals completion in one step by calling
//! [`Responder::done`], so a caller never observes a partially populated
//! result.
//!
//! Failures travel in the same slot as a typed [`Error`]. A responder that is
//! dropped without calling `done`, because its task panicked or its loop shut
//! down, resolves the caller's result to [`ErrorKind::Cancelled`](crate::error::ErrorKind::Cancelled).
//!
//! # Example
//!
//! ```rust
//! use mcremote::response::AsyncResult;
//!
//! let (responder, result) = AsyncResult::pair();
//! responder.done(Ok(42));
//! assert_eq!(result.await?, 42);
//! ```

use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::error::{Error, Result};

/// A completion callback, invoked on the worker loop with the result.
///
/// Callers use it to post the result onto their own event channel.
pub type Callback<T> = Box<dyn FnOnce(Result<T>) + Send + 'static>;

enum Delivery<T> {
    Slot(oneshot::Sender<Result<T>>),
    Callback(Callback<T>),
}

/// Worker side of a result slot.
#[must_use = "dropping a responder cancels the caller's result"]
pub struct Responder<T> {
    delivery: Option<Delivery<T>>,
}

impl<T> Responder<T> {
    /// Creates a responder that completes by invoking `callback`.
    pub fn from_callback<F>(callback: F) -> Self
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        Self {
            delivery: Some(Delivery::Callback(Box::new(callback))),
        }
    }

    /// Populates the result and signals completion.
    pub fn done(mut self, result: Result<T>) {
        match self.delivery.take() {
            Some(Delivery::Slot(tx)) => {
                // The caller may have stopped waiting. That is not an error.
                if tx.send(result).is_err() {
                    trace!("result receiver dropped before completion");
                }
            }
            Some(Delivery::Callback(callback)) => callback(result),
            None => {}
        }
    }
}

impl<T> Drop for Responder<T> {
    fn drop(&mut self) {
        // A callback must always hear back, even if the task never finished.
        if let Some(Delivery::Callback(callback)) = self.delivery.take() {
            callback(Err(Error::cancelled("task dropped before completion")));
        }
    }
}

impl<T> fmt::Debug for Responder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.delivery {
            Some(Delivery::Slot(_)) => "slot",
            Some(Delivery::Callback(_)) => "callback",
            None => "done",
        };
        f.debug_struct("Responder").field("delivery", &kind).finish()
    }
}

/// Caller side of a result slot.
///
/// Await it from async code, or poll it without blocking with
/// [`try_take`](Self::try_take) from a frame-driven presentation loop.
#[derive(Debug)]
#[must_use = "results do nothing unless awaited or polled"]
pub struct AsyncResult<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> AsyncResult<T> {
    /// Creates an empty result slot and the responder that fills it.
    pub fn pair() -> (Responder<T>, Self) {
        let (tx, rx) = oneshot::channel();
        let responder = Responder {
            delivery: Some(Delivery::Slot(tx)),
        };
        (responder, Self { rx })
    }

    /// Creates a result that is already complete.
    pub fn ready(result: Result<T>) -> Self {
        let (responder, this) = Self::pair();
        responder.done(result);
        this
    }

    /// Takes the result if it has been delivered.
    ///
    /// Returns `None` while the task is still queued or running. Once a
    /// result has been taken, further calls return a `Cancelled` error.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                Some(Err(Error::cancelled("task dropped before completion")))
            }
        }
    }
}

impl<T> Future for AsyncResult<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|e| Err(e.into())))
    }
}
