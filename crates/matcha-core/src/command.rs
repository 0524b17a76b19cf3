use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;

/// A side effect returned from [`Model::update`](crate::Model::update) or
/// [`Model::init`](crate::Model::init).
///
/// A command describes a lazy sequence of messages produced by a side effect:
/// it may emit zero, one, or many messages, and may fail with an error `E`.
/// Nothing runs until the command is handed to the runtime; construction is
/// pure. Commands are consumed by value when executed, so a single command
/// value is executed at most once.
///
/// # Examples
///
/// ```rust,ignore
/// // Do nothing:
/// let cmd = Command::none();
///
/// // Emit a message immediately:
/// let cmd = Command::of(Msg::Refresh);
///
/// // Run an async task and map the result to a message:
/// let cmd = Command::perform(
///     async { fetch_data().await },
///     |data| Msg::DataLoaded(data),
/// );
/// ```
pub struct Command<Msg: Send + 'static, E: Send + 'static> {
    pub(crate) inner: CommandInner<Msg, E>,
}

pub(crate) enum CommandInner<Msg: Send + 'static, E: Send + 'static> {
    None,
    /// Emit a message synchronously, without spawning a task.
    Message(Msg),
    Future(BoxFuture<'static, Result<Msg, E>>),
    Stream(BoxStream<'static, Result<Msg, E>>),
    Batch(Vec<Command<Msg, E>>),
}

impl<Msg: Send + 'static, E: Send + 'static> Command<Msg, E> {
    /// No-op command. Emits nothing; identity for [`batch`](Command::batch).
    pub fn none() -> Self {
        Command {
            inner: CommandInner::None,
        }
    }

    /// Emit `msg` exactly once, synchronously when the command is executed.
    ///
    /// When returned from `update`, the message is enqueued immediately and
    /// processed after the current message completes.
    pub fn of(msg: Msg) -> Self {
        Command {
            inner: CommandInner::Message(msg),
        }
    }

    /// Run an infallible future and map its output to a message.
    pub fn perform<F, T>(future: F, map: impl FnOnce(T) -> Msg + Send + 'static) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        Command {
            inner: CommandInner::Future(Box::pin(async move { Ok(map(future.await)) })),
        }
    }

    /// Run an effect that may fail. On success its output is emitted as the
    /// single message; on failure the error surfaces on the program's error
    /// channel.
    ///
    /// Applications that want to recover from the failure should use
    /// [`Task::attempt`](crate::Task::attempt) or
    /// [`Task::attempt_with`](crate::Task::attempt_with) instead, which
    /// convert the outcome into a message before it reaches the runtime.
    pub fn from_effect<F>(effect: F) -> Self
    where
        F: Future<Output = Result<Msg, E>> + Send + 'static,
    {
        Command {
            inner: CommandInner::Future(Box::pin(effect)),
        }
    }

    /// Build a command from a raw stream of message results.
    ///
    /// Every `Ok` item is enqueued as a message; the first `Err` stops the
    /// stream and fails the program.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<Msg, E>> + Send + 'static,
    {
        Command {
            inner: CommandInner::Stream(Box::pin(stream)),
        }
    }

    /// One-shot timer: fires once after `duration`, mapping the instant to a
    /// message.
    pub fn tick(
        duration: std::time::Duration,
        map: impl FnOnce(std::time::Instant) -> Msg + Send + 'static,
    ) -> Self {
        Command {
            inner: CommandInner::Future(Box::pin(async move {
                tokio::time::sleep(duration).await;
                Ok(map(std::time::Instant::now()))
            })),
        }
    }

    /// Run multiple commands concurrently.
    ///
    /// Messages are delivered as they become available from any child; there
    /// is no ordering guarantee between messages originating from different
    /// children. `batch([])` is [`none`](Command::none) and `batch([c])` is
    /// `c`.
    pub fn batch(cmds: impl IntoIterator<Item = Command<Msg, E>>) -> Self {
        let mut cmds: Vec<_> = cmds.into_iter().filter(|cmd| !cmd.is_none()).collect();
        if cmds.is_empty() {
            return Command::none();
        }
        if cmds.len() == 1 {
            return cmds.pop().expect("len checked above");
        }
        Command {
            inner: CommandInner::Batch(cmds),
        }
    }

    /// Transform every emitted message by `f`, preserving cardinality and
    /// order.
    pub fn map<NewMsg: Send + 'static>(
        self,
        f: impl Fn(Msg) -> NewMsg + Send + Sync + 'static,
    ) -> Command<NewMsg, E> {
        self.map_with(Arc::new(f))
    }

    fn map_with<NewMsg: Send + 'static>(
        self,
        f: Arc<dyn Fn(Msg) -> NewMsg + Send + Sync>,
    ) -> Command<NewMsg, E> {
        match self.inner {
            CommandInner::None => Command::none(),
            CommandInner::Message(msg) => Command::of(f(msg)),
            CommandInner::Future(fut) => Command {
                inner: CommandInner::Future(Box::pin(async move { fut.await.map(|msg| f(msg)) })),
            },
            CommandInner::Stream(stream) => Command {
                inner: CommandInner::Stream(Box::pin(
                    stream.map(move |item| item.map(|msg| f(msg))),
                )),
            },
            CommandInner::Batch(cmds) => Command {
                inner: CommandInner::Batch(
                    cmds.into_iter().map(|cmd| cmd.map_with(f.clone())).collect(),
                ),
            },
        }
    }

    // --- Inspection methods (useful for testing) ---

    /// Returns `true` if this is a no-op command.
    pub fn is_none(&self) -> bool {
        matches!(self.inner, CommandInner::None)
    }

    /// If this command is a synchronous message, return it.
    pub fn into_message(self) -> Option<Msg> {
        match self.inner {
            CommandInner::Message(msg) => Some(msg),
            _ => None,
        }
    }

    /// If this command is a batch, return the inner commands.
    pub fn into_batch(self) -> Option<Vec<Command<Msg, E>>> {
        match self.inner {
            CommandInner::Batch(cmds) => Some(cmds),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Cmd<M> = Command<M, String>;

    /// Drain a command's payload into a vector of messages, ignoring errors.
    async fn collect<Msg: Send + 'static>(cmd: Cmd<Msg>) -> Vec<Msg> {
        match cmd.inner {
            CommandInner::None => vec![],
            CommandInner::Message(msg) => vec![msg],
            CommandInner::Future(fut) => fut.await.into_iter().collect(),
            CommandInner::Stream(stream) => {
                stream.filter_map(|item| async { item.ok() }).collect().await
            }
            CommandInner::Batch(cmds) => {
                let mut out = vec![];
                for cmd in cmds {
                    out.extend(Box::pin(collect(cmd)).await);
                }
                out
            }
        }
    }

    #[test]
    fn none_is_none() {
        let cmd: Cmd<()> = Command::none();
        assert!(cmd.is_none());
    }

    #[test]
    fn of_creates_message() {
        let cmd: Cmd<i32> = Command::of(42);
        assert_eq!(cmd.into_message(), Some(42));
    }

    #[test]
    fn batch_empty_returns_none() {
        let cmd: Cmd<()> = Command::batch(vec![]);
        assert!(cmd.is_none());
    }

    #[test]
    fn batch_single_unwraps() {
        let cmd: Cmd<i32> = Command::batch(vec![Command::of(1)]);
        assert_eq!(cmd.into_message(), Some(1));
    }

    #[test]
    fn batch_drops_none_children() {
        let cmd: Cmd<i32> = Command::batch(vec![Command::none(), Command::of(1), Command::none()]);
        assert_eq!(cmd.into_message(), Some(1));
    }

    #[test]
    fn batch_multiple() {
        let cmd: Cmd<i32> = Command::batch(vec![Command::of(1), Command::of(2)]);
        let cmds = cmd.into_batch().expect("expected batch");
        assert_eq!(cmds.len(), 2);
    }

    #[test]
    fn map_none() {
        let cmd: Cmd<i32> = Command::none();
        let mapped: Cmd<String> = cmd.map(|n| n.to_string());
        assert!(mapped.is_none());
    }

    #[test]
    fn map_message() {
        let cmd: Cmd<i32> = Command::of(42);
        let mapped: Cmd<String> = cmd.map(|n| n.to_string());
        assert_eq!(mapped.into_message(), Some("42".to_string()));
    }

    #[tokio::test]
    async fn map_future_transforms_output() {
        let cmd: Cmd<i32> = Command::perform(async { 20 }, |n| n + 1);
        let mapped = cmd.map(|n| n * 2);
        assert_eq!(collect(mapped).await, vec![42]);
    }

    #[tokio::test]
    async fn map_stream_preserves_order() {
        let cmd: Cmd<i32> = Command::from_stream(futures::stream::iter([Ok(1), Ok(2), Ok(3)]));
        let mapped = cmd.map(|n| n * 10);
        assert_eq!(collect(mapped).await, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn map_composes() {
        // map(f) . map(g) behaves as map(f . g)
        let composed: Cmd<String> = Command::from_stream(futures::stream::iter([Ok(1), Ok(2)]))
            .map(|n| (n + 1).to_string());
        let chained: Cmd<String> = Command::from_stream(futures::stream::iter([Ok(1), Ok(2)]))
            .map(|n| n + 1)
            .map(|n: i32| n.to_string());
        assert_eq!(collect(composed).await, collect(chained).await);
    }

    #[tokio::test]
    async fn batch_delivers_all_messages() {
        let cmd: Cmd<i32> = Command::batch(vec![
            Command::of(1),
            Command::perform(async { 2 }, |n| n),
            Command::from_stream(futures::stream::iter([Ok(3), Ok(4)])),
        ]);
        let mut msgs = collect(cmd).await;
        msgs.sort_unstable();
        assert_eq!(msgs, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn from_effect_failure_keeps_error() {
        let cmd: Cmd<i32> = Command::from_effect(async { Err("oops".to_string()) });
        match cmd.inner {
            CommandInner::Future(fut) => assert_eq!(fut.await, Err("oops".to_string())),
            _ => panic!("expected future command"),
        }
    }
}
