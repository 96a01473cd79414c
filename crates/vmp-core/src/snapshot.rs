//! Snapshot publishing
//!
//! State owners publish immutable snapshots; any number of consumers (UI,
//! logging, tests) subscribe and receive them as a [`futures::Stream`].
//!
//! Guarantees:
//! - A new subscription first yields the current snapshot, then every later one
//! - Every subscriber sees every snapshot, in publish order
//! - After [`Publisher::close`] returns, nothing else is delivered and all
//!   streams end

use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Shared publisher of state snapshots
#[derive(Debug)]
pub struct Publisher<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

#[derive(Debug)]
struct Inner<T> {
    current: T,
    subscribers: Vec<mpsc::UnboundedSender<T>>,
    closed: bool,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Publisher<T> {
    /// Create a publisher holding an initial snapshot
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                current: initial,
                subscribers: Vec::new(),
                closed: false,
            })),
        }
    }

    /// Latest snapshot
    #[must_use]
    pub fn current(&self) -> T {
        self.inner.lock().current.clone()
    }

    /// Replace the current snapshot and deliver it.
    ///
    /// Returns `false` (and changes nothing) once the publisher is closed.
    pub fn publish(&self, value: T) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        inner.current = value;
        inner.broadcast();
        true
    }

    /// Mutate the current snapshot in place and deliver the result.
    ///
    /// The closure runs under the publisher lock; it must not block.
    /// Returns the published snapshot, or `None` if the publisher is closed.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return None;
        }
        f(&mut inner.current);
        inner.broadcast();
        Some(inner.current.clone())
    }

    /// Like [`Publisher::update`], but the closure decides whether anything
    /// changed; nothing is delivered when it returns `false`.
    pub fn update_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed || !f(&mut inner.current) {
            return false;
        }
        inner.broadcast();
        true
    }

    /// Subscribe to snapshots, starting with the current one
    #[must_use]
    pub fn subscribe(&self) -> SnapshotStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        // Send cannot fail: we still hold the receiver.
        let _ = tx.send(inner.current.clone());
        if !inner.closed {
            inner.subscribers.push(tx);
        }
        SnapshotStream { rx }
    }

    /// Stop publishing; every open stream ends after what it already holds
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.subscribers.clear();
    }

    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

impl<T: Clone> Inner<T> {
    fn broadcast(&mut self) {
        let snapshot = &self.current;
        self.subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}

/// Stream of snapshots produced by a [`Publisher`]
#[derive(Debug)]
pub struct SnapshotStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> SnapshotStream<T> {
    /// Take a snapshot that is already buffered, without waiting
    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> Stream for SnapshotStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
