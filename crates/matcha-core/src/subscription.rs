use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{IntervalStream, UnboundedReceiverStream};

/// A long-lived event source derived from the current model.
///
/// Subscriptions are declared in
/// [`Model::subscriptions`](crate::Model::subscriptions) and managed by the
/// runtime: whenever the model changes, the previous subscription is
/// cancelled (running its disposers) before the one derived from the new
/// model is activated, so exactly one subscription is active at any time.
///
/// Structurally a subscription is the same thing as a
/// [`Command`](crate::Command) -- a lazy stream of messages -- but it is
/// expected to keep producing messages for the lifetime of an activation
/// rather than complete after one output. Construction is pure: no timer is
/// armed and no listener is registered until the runtime activates the
/// subscription.
pub struct Subscription<Msg: Send + 'static, E: Send + 'static> {
    pub(crate) inner: SubInner<Msg, E>,
}

pub(crate) enum SubInner<Msg: Send + 'static, E: Send + 'static> {
    None,
    Stream(BoxStream<'static, Result<Msg, E>>),
    Batch(Vec<Subscription<Msg, E>>),
}

/// The emit half handed to a [`from_callback`](Subscription::from_callback)
/// registration function.
pub type Emit<Msg> = Box<dyn Fn(Msg) + Send + Sync>;

/// Runs a `from_callback` disposer exactly once, when the activation that
/// owns it is cancelled or its stream is dropped.
struct Disposer {
    run: Option<Box<dyn FnOnce() + Send>>,
}

impl Drop for Disposer {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            run();
        }
    }
}

/// Defer stream construction until first poll, so that building a
/// subscription value stays side-effect free.
fn deferred<T, F>(make: F) -> BoxStream<'static, T>
where
    T: Send + 'static,
    F: FnOnce() -> BoxStream<'static, T> + Send + 'static,
{
    Box::pin(stream::once(async move { make() }).flatten())
}

impl<Msg: Send + 'static, E: Send + 'static> Subscription<Msg, E> {
    /// The empty subscription. Produces nothing; identity for
    /// [`batch`](Subscription::batch).
    pub fn none() -> Self {
        Subscription {
            inner: SubInner::None,
        }
    }

    /// Emit `msg` once when activated.
    pub fn of(msg: Msg) -> Self {
        Subscription {
            inner: SubInner::Stream(Box::pin(stream::iter([Ok(msg)]))),
        }
    }

    /// Emit every element of `xs`, in order.
    pub fn from_iter<I>(xs: I) -> Self
    where
        I: IntoIterator<Item = Msg>,
        I::IntoIter: Send + 'static,
    {
        Subscription {
            inner: SubInner::Stream(Box::pin(stream::iter(xs.into_iter()).map(Ok))),
        }
    }

    /// Build a subscription from a raw stream of message results.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<Msg, E>> + Send + 'static,
    {
        Subscription {
            inner: SubInner::Stream(Box::pin(stream)),
        }
    }

    /// A repeating timer that emits `msg` every `period`.
    ///
    /// The timer is armed on activation and the first tick fires one full
    /// period later, so a subscription switch restarts the countdown instead
    /// of producing an immediate tick.
    pub fn interval(period: Duration, msg: Msg) -> Self
    where
        Msg: Clone,
    {
        Subscription {
            inner: SubInner::Stream(deferred(move || {
                let start = tokio::time::Instant::now() + period;
                Box::pin(
                    IntervalStream::new(tokio::time::interval_at(start, period))
                        .map(move |_| Ok(msg.clone())),
                )
            })),
        }
    }

    /// A one-shot delay that emits `msg` once after `duration`.
    pub fn after(duration: Duration, msg: Msg) -> Self {
        Subscription {
            inner: SubInner::Stream(Box::pin(stream::once(async move {
                tokio::time::sleep(duration).await;
                Ok(msg)
            }))),
        }
    }

    /// Bridge a callback-based event source into a subscription.
    ///
    /// `register` runs when the subscription activates. It receives an `emit`
    /// function to forward events with and must return a disposer that
    /// releases whatever listener it installed. The disposer runs exactly
    /// once, when the activation is cancelled.
    ///
    /// ```rust,ignore
    /// Subscription::from_callback(|emit| {
    ///     let listener = events.add_listener(move |ev| emit(Msg::Event(ev)));
    ///     move || events.remove_listener(listener)
    /// })
    /// ```
    pub fn from_callback<R, D>(register: R) -> Self
    where
        R: FnOnce(Emit<Msg>) -> D + Send + 'static,
        D: FnOnce() + Send + 'static,
    {
        Subscription {
            inner: SubInner::Stream(deferred(move || {
                let (tx, rx) = mpsc::unbounded_channel();
                let emit: Emit<Msg> = Box::new(move |msg| {
                    let _ = tx.send(msg);
                });
                let disposer = Disposer {
                    run: Some(Box::new(register(emit))),
                };
                Box::pin(UnboundedReceiverStream::new(rx).map(move |msg| {
                    let _ = &disposer;
                    Ok(msg)
                }))
            })),
        }
    }

    /// Activate several subscriptions at once, merging their messages fairly.
    ///
    /// Messages are delivered as they become available from any child; no
    /// ordering holds between children. `batch([])` is
    /// [`none`](Subscription::none) and `batch([s])` is `s`.
    pub fn batch(subs: impl IntoIterator<Item = Subscription<Msg, E>>) -> Self {
        let mut subs: Vec<_> = subs
            .into_iter()
            .filter(|sub| !matches!(sub.inner, SubInner::None))
            .collect();
        if subs.is_empty() {
            return Subscription::none();
        }
        if subs.len() == 1 {
            return subs.pop().expect("len checked above");
        }
        Subscription {
            inner: SubInner::Batch(subs),
        }
    }

    /// Transform every emitted message by `f`, preserving cardinality and
    /// order.
    pub fn map<NewMsg: Send + 'static>(
        self,
        f: impl Fn(Msg) -> NewMsg + Send + Sync + 'static,
    ) -> Subscription<NewMsg, E> {
        self.map_with(Arc::new(f))
    }

    fn map_with<NewMsg: Send + 'static>(
        self,
        f: Arc<dyn Fn(Msg) -> NewMsg + Send + Sync>,
    ) -> Subscription<NewMsg, E> {
        match self.inner {
            SubInner::None => Subscription::none(),
            SubInner::Stream(stream) => Subscription {
                inner: SubInner::Stream(Box::pin(
                    stream.map(move |item| item.map(|msg| f(msg))),
                )),
            },
            SubInner::Batch(subs) => Subscription {
                inner: SubInner::Batch(
                    subs.into_iter().map(|sub| sub.map_with(f.clone())).collect(),
                ),
            },
        }
    }

    /// Keep only the messages for which `pred` returns `true`. Errors pass
    /// through untouched.
    pub fn filter(self, pred: impl Fn(&Msg) -> bool + Send + Sync + 'static) -> Self {
        match self.inner {
            SubInner::None => Subscription::none(),
            inner => {
                let stream = Subscription { inner }.into_stream();
                Subscription::from_stream(stream.filter(move |item| {
                    let keep = match item {
                        Ok(msg) => pred(msg),
                        Err(_) => true,
                    };
                    futures::future::ready(keep)
                }))
            }
        }
    }

    /// Consume the subscription into its activation stream.
    ///
    /// Batches are merged fairly. Activation consumes the value; to activate
    /// the "same" subscription again, construct it again (the runtime does
    /// this by re-invoking
    /// [`Model::subscriptions`](crate::Model::subscriptions) on every model
    /// change).
    pub fn into_stream(self) -> BoxStream<'static, Result<Msg, E>> {
        match self.inner {
            SubInner::None => Box::pin(stream::empty()),
            SubInner::Stream(stream) => stream,
            SubInner::Batch(subs) => Box::pin(stream::select_all(
                subs.into_iter().map(|sub| sub.into_stream()),
            )),
        }
    }

    /// Returns `true` if this is the empty subscription.
    pub fn is_none(&self) -> bool {
        matches!(self.inner, SubInner::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::time::Instant;

    type Sub<M> = Subscription<M, String>;

    async fn collect<Msg: Send + 'static>(sub: Sub<Msg>) -> Vec<Msg> {
        sub.into_stream()
            .filter_map(|item| async { item.ok() })
            .collect()
            .await
    }

    #[test]
    fn none_is_none() {
        let sub: Sub<()> = Subscription::none();
        assert!(sub.is_none());
    }

    #[test]
    fn batch_empty_returns_none() {
        let sub: Sub<()> = Subscription::batch(vec![]);
        assert!(sub.is_none());
    }

    #[test]
    fn batch_drops_none_children() {
        let sub: Sub<i32> = Subscription::batch(vec![Subscription::none(), Subscription::none()]);
        assert!(sub.is_none());
    }

    #[tokio::test]
    async fn of_emits_once() {
        let sub: Sub<i32> = Subscription::of(7);
        assert_eq!(collect(sub).await, vec![7]);
    }

    #[tokio::test]
    async fn from_iter_preserves_order() {
        let sub: Sub<i32> = Subscription::from_iter([1, 2, 3]);
        assert_eq!(collect(sub).await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn filter_drops_messages() {
        let sub: Sub<i32> = Subscription::from_iter([1, 2, 3, 4]).filter(|n| n % 2 == 0);
        assert_eq!(collect(sub).await, vec![2, 4]);
    }

    #[tokio::test]
    async fn map_composes() {
        let composed: Sub<String> = Subscription::from_iter([1, 2]).map(|n| (n + 1).to_string());
        let chained: Sub<String> = Subscription::from_iter([1, 2])
            .map(|n| n + 1)
            .map(|n: i32| n.to_string());
        assert_eq!(collect(composed).await, collect(chained).await);
    }

    #[tokio::test]
    async fn batch_delivers_all() {
        let sub: Sub<i32> = Subscription::batch(vec![
            Subscription::from_iter([1, 2]),
            Subscription::from_iter([3, 4]),
        ]);
        let mut msgs = collect(sub).await;
        msgs.sort_unstable();
        assert_eq!(msgs, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn interval_first_tick_waits_a_full_period() {
        let sub: Sub<&'static str> = Subscription::interval(Duration::from_millis(20), "tick");
        let start = Instant::now();
        let mut stream = sub.into_stream();
        let first = stream.next().await;
        assert_eq!(first, Some(Ok("tick")));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn after_emits_once_then_completes() {
        let sub: Sub<&'static str> = Subscription::after(Duration::from_millis(5), "done");
        assert_eq!(collect(sub).await, vec!["done"]);
    }

    #[tokio::test]
    async fn from_callback_registers_on_activation_only() {
        static STARTS: AtomicI32 = AtomicI32::new(0);

        let sub: Sub<i32> = Subscription::from_callback(|_emit| {
            STARTS.fetch_add(1, Ordering::SeqCst);
            || {}
        });
        // Construction alone must not run the registration function.
        assert_eq!(STARTS.load(Ordering::SeqCst), 0);
        drop(sub);
        assert_eq!(STARTS.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn from_callback_disposer_runs_once_on_drop() {
        let live = Arc::new(AtomicI32::new(0));
        let live_in = live.clone();

        let sub: Sub<i32> = Subscription::from_callback(move |emit| {
            live_in.fetch_add(1, Ordering::SeqCst);
            emit(1);
            emit(2);
            let live_out = live_in.clone();
            move || {
                live_out.fetch_sub(1, Ordering::SeqCst);
            }
        });

        let mut stream = sub.into_stream();
        assert_eq!(stream.next().await, Some(Ok(1)));
        assert_eq!(live.load(Ordering::SeqCst), 1);
        drop(stream);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
