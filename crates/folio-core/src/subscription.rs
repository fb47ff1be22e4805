//! Cancellable live subscriptions.
//!
//! A [`Subscription`] yields the full current value on every backend change
//! (a document snapshot or an entire query result set, never a diff). It
//! implements [`futures::Stream`]; [`Subscription::recv`] is a convenience
//! for callers that do not want to pull in `StreamExt`.
//!
//! Tearing down runs the backend's detach hook exactly once, whether via
//! [`Subscription::unsubscribe`] (any number of calls) or by dropping.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;

use crate::error::StoreResult;

type DetachFn = Box<dyn FnOnce() + Send>;

struct DetachGuard {
    hook: Mutex<Option<DetachFn>>,
    detached: AtomicBool,
}

impl DetachGuard {
    fn new(hook: DetachFn) -> Self {
        Self {
            hook: Mutex::new(Some(hook)),
            detached: AtomicBool::new(false),
        }
    }

    fn detach(&self) {
        let hook = match self.hook.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        self.detached.store(true, Ordering::SeqCst);
        if let Some(hook) = hook {
            hook();
        }
    }

    fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        self.detach();
    }
}

/// A live, cancellable stream of full snapshots.
pub struct Subscription<T> {
    stream: BoxStream<'static, StoreResult<T>>,
    guard: Arc<DetachGuard>,
}

/// Detaches a subscription from outside the task that consumes it.
///
/// Holding a handle keeps the hook alive: dropping the subscription alone
/// no longer detaches while a handle exists.
#[derive(Clone)]
pub struct DetachHandle(Arc<DetachGuard>);

impl DetachHandle {
    pub fn detach(&self) {
        self.0.detach();
    }

    pub fn is_detached(&self) -> bool {
        self.0.is_detached()
    }
}

/// Sending half used by store implementations to push snapshots.
pub type SnapshotSender<T> = mpsc::UnboundedSender<StoreResult<T>>;

impl<T: Send + 'static> Subscription<T> {
    /// Wrap an arbitrary stream with a detach hook.
    pub fn new<S, F>(stream: S, detach: F) -> Self
    where
        S: Stream<Item = StoreResult<T>> + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
            guard: Arc::new(DetachGuard::new(Box::new(detach))),
        }
    }

    /// Build a subscription fed by an unbounded channel.
    pub fn from_receiver<F>(mut rx: mpsc::UnboundedReceiver<StoreResult<T>>, detach: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::new(futures::stream::poll_fn(move |cx| rx.poll_recv(cx)), detach)
    }

    /// A subscription that emits one error and ends.
    pub fn failed(err: crate::error::StoreError) -> Self {
        Self::new(futures::stream::once(async move { Err(err) }), || {})
    }

    /// Transform every emitted value. The detach hook carries over.
    pub fn map<U, F>(self, f: F) -> Subscription<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> StoreResult<U> + Send + 'static,
    {
        let mut f = f;
        Subscription {
            stream: self
                .stream
                .map(move |item| item.and_then(&mut f))
                .boxed(),
            guard: self.guard,
        }
    }

    /// Next snapshot, or `None` once the subscription ended or was cancelled.
    pub async fn recv(&mut self) -> Option<StoreResult<T>> {
        self.next().await
    }
}

impl<T> Subscription<T> {
    /// Detach the backend listener. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        self.guard.detach();
    }

    pub fn is_active(&self) -> bool {
        !self.guard.is_detached()
    }

    pub fn detach_handle(&self) -> DetachHandle {
        DetachHandle(self.guard.clone())
    }
}

impl<T> Stream for Subscription<T> {
    type Item = StoreResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.guard.is_detached() {
            return Poll::Ready(None);
        }
        self.stream.as_mut().poll_next(cx)
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
