use futures::Stream;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// A shared value cell with change notification.
///
/// The cell holds the current value behind a mutex and fans every accepted
/// write out to all live watchers over unbounded channels. Writes equal to
/// the current value are suppressed: no swap, no notification. New watchers
/// receive the current value immediately and then every subsequent accepted
/// write, in write order; they never miss the current state but may miss
/// writes that happened before they attached.
///
/// The runtime uses one `StateCell` per program to hold the model; both the
/// `model$` stream and the subscription-switching loop are watchers of it.
pub struct StateCell<T> {
    inner: Mutex<CellInner<T>>,
}

struct CellInner<T> {
    current: Arc<T>,
    watchers: Vec<mpsc::UnboundedSender<Arc<T>>>,
    closed: bool,
}

impl<T: PartialEq> StateCell<T> {
    pub fn new(initial: T) -> Self {
        StateCell {
            inner: Mutex::new(CellInner {
                current: Arc::new(initial),
                watchers: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Read the current value.
    pub fn get(&self) -> Arc<T> {
        self.lock().current.clone()
    }

    /// Write `next` and notify watchers. Returns `false` when the write was
    /// suppressed (equal to the current value) or the cell is closed.
    pub fn publish(&self, next: &T) -> bool
    where
        T: Clone,
    {
        let mut inner = self.lock();
        if inner.closed || *inner.current == *next {
            return false;
        }
        inner.current = Arc::new(next.clone());
        let current = inner.current.clone();
        inner.watchers.retain(|tx| tx.send(current.clone()).is_ok());
        true
    }

    /// Attach a watcher: a stream yielding the current value immediately and
    /// then every accepted write. On a closed cell the stream yields the
    /// final value and ends.
    pub fn watch(&self) -> ModelStream<T> {
        let (current, rx) = self.watch_parts();
        ModelStream {
            first: Some(current),
            rx,
        }
    }

    /// Like [`watch`](StateCell::watch), but splitting out the current value
    /// for callers that need it eagerly.
    pub(crate) fn watch_parts(&self) -> (Arc<T>, mpsc::UnboundedReceiver<Arc<T>>) {
        let mut inner = self.lock();
        let (tx, rx) = mpsc::unbounded_channel();
        if !inner.closed {
            inner.watchers.push(tx);
        }
        (inner.current.clone(), rx)
    }

    /// Close the cell: all watcher streams end after draining and future
    /// writes are discarded. Idempotent.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.watchers.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CellInner<T>> {
        // Watchers and values never unwind while the lock is held.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    fn watcher_count(&self) -> usize {
        self.lock().watchers.len()
    }
}

/// Stream of successive values from a [`StateCell`]: the value current at
/// attach time, then every accepted write, in write order.
pub struct ModelStream<T> {
    first: Option<Arc<T>>,
    rx: mpsc::UnboundedReceiver<Arc<T>>,
}

impl<T> Stream for ModelStream<T> {
    type Item = Arc<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(first) = this.first.take() {
            return Poll::Ready(Some(first));
        }
        this.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn get_returns_initial() {
        let cell = StateCell::new(1);
        assert_eq!(*cell.get(), 1);
    }

    #[test]
    fn publish_swaps_current() {
        let cell = StateCell::new(1);
        assert!(cell.publish(&2));
        assert_eq!(*cell.get(), 2);
    }

    #[test]
    fn equal_publish_is_suppressed() {
        let cell = StateCell::new(1);
        assert!(!cell.publish(&1));
    }

    #[tokio::test]
    async fn watcher_sees_current_then_writes() {
        let cell = StateCell::new(0);
        let mut stream = cell.watch();
        assert_eq!(*stream.next().await.expect("current"), 0);

        cell.publish(&1);
        cell.publish(&2);
        assert_eq!(*stream.next().await.expect("first write"), 1);
        assert_eq!(*stream.next().await.expect("second write"), 2);
    }

    #[tokio::test]
    async fn suppressed_write_does_not_notify() {
        let cell = StateCell::new(0);
        let mut stream = cell.watch();
        assert_eq!(*stream.next().await.expect("current"), 0);

        cell.publish(&0);
        cell.publish(&1);
        // The suppressed write must not appear before the accepted one.
        assert_eq!(*stream.next().await.expect("write"), 1);
    }

    #[tokio::test]
    async fn every_watcher_sees_every_write_in_order() {
        let cell = StateCell::new(0);
        let a = cell.watch();
        let b = cell.watch();
        for n in 1..=3 {
            cell.publish(&n);
        }
        cell.close();

        let seen_a: Vec<_> = a.map(|m| *m).collect().await;
        let seen_b: Vec<_> = b.map(|m| *m).collect().await;
        assert_eq!(seen_a, vec![0, 1, 2, 3]);
        assert_eq!(seen_b, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn close_ends_streams_and_discards_writes() {
        let cell = StateCell::new(0);
        let mut stream = cell.watch();
        cell.publish(&1);
        cell.close();
        assert!(!cell.publish(&2));

        assert_eq!(*stream.next().await.expect("current"), 0);
        assert_eq!(*stream.next().await.expect("write"), 1);
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn watch_after_close_yields_final_value_then_ends() {
        let cell = StateCell::new(0);
        cell.publish(&7);
        cell.close();

        let mut stream = cell.watch();
        assert_eq!(*stream.next().await.expect("final value"), 7);
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn dropped_watchers_are_pruned_on_publish() {
        let cell = StateCell::new(0);
        let keep = cell.watch();
        drop(cell.watch());
        cell.publish(&1);
        assert_eq!(cell.watcher_count(), 1);
        drop(keep);
    }
}
