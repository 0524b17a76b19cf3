use crate::command::{Command, CommandInner};
use crate::model::Model;
use crate::reactive::{ModelStream, StateCell};
use crate::subscription::Subscription;
use futures::StreamExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Errors that can terminate a running [`Program`].
///
/// The expected pattern is to convert effect failures into messages with
/// [`Task::attempt`](crate::Task::attempt) or
/// [`Task::attempt_with`](crate::Task::attempt_with) before they reach the
/// runtime; an error of this type means the application declined to do so
/// and the program has shut down.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError<E> {
    /// A command failed on its error channel.
    #[error("command failed: {0}")]
    Command(E),
    /// The active subscription failed on its error channel.
    #[error("subscription failed: {0}")]
    Subscription(E),
    /// User code inside `update` panicked.
    #[error("update panicked: {0}")]
    UpdatePanic(String),
}

/// A cloneable handle for injecting messages into a running [`Program`].
///
/// `Dispatcher` can be sent across threads, stored in views, or handed to
/// external event sources. Dispatching is non-blocking: it returns once the
/// message is enqueued, without waiting for it to be processed. After the
/// program has shut down, dispatch calls are silently discarded.
///
/// All dispatchers for a program share one identity -- the queue -- so a view
/// re-rendered on every model change can keep using the handle it was given
/// the first time.
pub struct Dispatcher<Msg: Send + 'static> {
    tx: mpsc::UnboundedSender<Msg>,
    terminated: Arc<AtomicBool>,
}

impl<Msg: Send + 'static> Clone for Dispatcher<Msg> {
    fn clone(&self) -> Self {
        Dispatcher {
            tx: self.tx.clone(),
            terminated: self.terminated.clone(),
        }
    }
}

impl<Msg: Send + 'static> Dispatcher<Msg> {
    /// Enqueue a message for the update loop.
    pub fn dispatch(&self, msg: Msg) {
        if self.terminated.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(msg);
    }
}

/// Shared state of one running program, owned jointly by the [`Program`]
/// handle and the tasks it spawned.
struct Core<M: Model> {
    cell: StateCell<M>,
    msg_tx: mpsc::UnboundedSender<M::Message>,
    terminated: Arc<AtomicBool>,
    error: Mutex<Option<ProgramError<M::Error>>>,
    /// One short-lived fiber per executing async command.
    command_fibers: Mutex<Vec<JoinHandle<()>>>,
    update_fiber: Mutex<Option<JoinHandle<()>>>,
    sub_fiber: Mutex<Option<JoinHandle<()>>>,
}

/// The program runtime: the update loop, command execution, and
/// subscription switching around a single [`Model`].
///
/// A program owns two long-running background tasks -- the update loop
/// (single consumer of the message queue) and the subscription loop (reacts
/// to model changes) -- plus one short-lived task per executing command. All
/// of them are torn down by [`shutdown`](Program::shutdown) or by dropping
/// the program.
///
/// Lifecycle: construction starts the background tasks and executes the
/// init command; the program then runs until `shutdown` is called, the
/// handle is dropped, or an unconverted effect error fails it. Termination
/// is absorbing: further dispatches are discarded and
/// [`models`](Program::models) streams end.
///
/// # Example
///
/// ```rust,ignore
/// let program = Program::<Counter>::with_flags(0);
/// program.dispatch(Msg::Increment);
/// let mut models = program.models();
/// while let Some(model) = models.next().await {
///     println!("count: {}", model.count);
/// }
/// ```
pub struct Program<M: Model> {
    core: Arc<Core<M>>,
}

impl<M: Model<Flags = ()>> Program<M> {
    /// Start a program that takes no bootstrap parameters.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self::with_flags(())
    }
}

impl<M: Model<Flags = ()>> Default for Program<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Program<M> {
    /// Start a program from external bootstrap parameters.
    ///
    /// Runs [`Model::init`], allocates the model cell and message queue,
    /// executes the init command without blocking, and spawns the update
    /// and subscription loops. Must be called from within a tokio runtime.
    pub fn with_flags(flags: M::Flags) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (model, init_cmd) = M::init(flags);

        let core = Arc::new(Core {
            cell: StateCell::new(model.clone()),
            msg_tx,
            terminated: Arc::new(AtomicBool::new(false)),
            error: Mutex::new(None),
            command_fibers: Mutex::new(Vec::new()),
            update_fiber: Mutex::new(None),
            sub_fiber: Mutex::new(None),
        });
        tracing::debug!("program starting");

        core.execute(init_cmd);

        // Attach the subscription loop's watcher before the update loop can
        // publish, so the initial model's subscription activates first.
        let (initial, changes) = core.cell.watch_parts();
        let update = tokio::spawn(update_loop(core.clone(), model, msg_rx));
        let sub = tokio::spawn(subscription_loop(core.clone(), initial, changes));
        *lock(&core.update_fiber) = Some(update);
        *lock(&core.sub_fiber) = Some(sub);

        Program { core }
    }

    /// Enqueue a message for the update loop.
    ///
    /// Non-blocking and safe to call from any context. Discarded after
    /// shutdown.
    pub fn dispatch(&self, msg: M::Message) {
        if self.core.terminated.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.core.msg_tx.send(msg);
    }

    /// A cloneable dispatch-only handle for views and external sources.
    pub fn dispatcher(&self) -> Dispatcher<M::Message> {
        Dispatcher {
            tx: self.core.msg_tx.clone(),
            terminated: self.core.terminated.clone(),
        }
    }

    /// Read the current model.
    pub fn model(&self) -> Arc<M> {
        self.core.cell.get()
    }

    /// The stream of model states: the current model immediately, then every
    /// distinct update in write order.
    ///
    /// Multiple subscribers may attach; each sees every write made while it
    /// is attached. A subscriber attaching late never misses the current
    /// state but may have missed earlier transients. The stream ends when
    /// the program terminates.
    pub fn models(&self) -> ModelStream<M> {
        self.core.cell.watch()
    }

    /// Drain the model stream into a callback until the program terminates.
    ///
    /// Completes with `Err` if the program failed on its error channel, and
    /// `Ok(())` on orderly shutdown. Teardown has finished by the time this
    /// returns.
    pub async fn run_with(
        &self,
        mut on_model: impl FnMut(Arc<M>),
    ) -> Result<(), ProgramError<M::Error>> {
        let mut models = self.models();
        while let Some(model) = models.next().await {
            on_model(model);
        }
        self.finish().await
    }

    /// Wait for teardown and report how the program ended.
    pub(crate) async fn finish(&self) -> Result<(), ProgramError<M::Error>> {
        self.shutdown().await;
        match lock(&self.core.error).take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Shut the program down and wait for every fiber to finish.
    ///
    /// Idempotent. On return all command fibers are gone, the active
    /// subscription has been cancelled, and every `from_callback` disposer
    /// has run.
    pub async fn shutdown(&self) {
        self.core.terminate();

        let update = lock(&self.core.update_fiber).take();
        if let Some(update) = update {
            let _ = update.await;
        }
        let sub = lock(&self.core.sub_fiber).take();
        if let Some(sub) = sub {
            let _ = sub.await;
        }
        let fibers: Vec<_> = lock(&self.core.command_fibers).drain(..).collect();
        for fiber in fibers {
            let _ = fiber.await;
        }
    }
}

impl<M: Model> Drop for Program<M> {
    /// Dropping the handle tears the program down (best effort: fibers are
    /// aborted but not awaited; use [`Program::shutdown`] to wait for
    /// teardown).
    fn drop(&mut self) {
        self.core.terminate();
    }
}

impl<M: Model> Core<M> {
    /// Execute a command: synchronous messages enqueue directly, async
    /// payloads each drain on their own fiber, batches recurse so children
    /// run concurrently.
    fn execute(self: &Arc<Self>, cmd: Command<M::Message, M::Error>) {
        match cmd.inner {
            CommandInner::None => {}
            CommandInner::Message(msg) => {
                let _ = self.msg_tx.send(msg);
            }
            CommandInner::Future(fut) => {
                let core = self.clone();
                self.spawn_command(async move {
                    match fut.await {
                        Ok(msg) => {
                            let _ = core.msg_tx.send(msg);
                        }
                        Err(error) => core.fail(ProgramError::Command(error)),
                    }
                });
            }
            CommandInner::Stream(mut stream) => {
                let core = self.clone();
                self.spawn_command(async move {
                    while let Some(item) = stream.next().await {
                        match item {
                            Ok(msg) => {
                                if core.msg_tx.send(msg).is_err() {
                                    break;
                                }
                            }
                            Err(error) => {
                                core.fail(ProgramError::Command(error));
                                break;
                            }
                        }
                    }
                });
            }
            CommandInner::Batch(cmds) => {
                for cmd in cmds {
                    self.execute(cmd);
                }
            }
        }
    }

    fn spawn_command(&self, fut: impl Future<Output = ()> + Send + 'static) {
        let mut fibers = lock(&self.command_fibers);
        if self.terminated.load(Ordering::SeqCst) {
            return;
        }
        fibers.retain(|fiber| !fiber.is_finished());
        fibers.push(tokio::spawn(fut));
    }

    /// Record the first error and tear the program down.
    fn fail(&self, error: ProgramError<M::Error>) {
        {
            let mut slot = lock(&self.error);
            if slot.is_none() {
                tracing::error!("program failed: {}", error_kind(&error));
                *slot = Some(error);
            }
        }
        self.terminate();
    }

    /// Synchronous half of shutdown: flip the flag, close the cell, abort
    /// the update loop and all command fibers. The subscription loop unwinds
    /// on its own through the closed change stream so that the active
    /// subscription's disposers finish before it exits.
    fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("program shutting down");
        self.cell.close();
        if let Some(update) = &*lock(&self.update_fiber) {
            update.abort();
        }
        for fiber in lock(&self.command_fibers).iter() {
            fiber.abort();
        }
    }
}

/// The single consumer of the message queue.
///
/// Owns the model outright: each `update` sees the state left by the
/// immediately preceding one, and the cell is published after every call so
/// watchers observe each distinct state in order.
async fn update_loop<M: Model>(
    core: Arc<Core<M>>,
    mut model: M,
    mut msg_rx: mpsc::UnboundedReceiver<M::Message>,
) {
    while let Some(msg) = msg_rx.recv().await {
        if core.terminated.load(Ordering::SeqCst) {
            break;
        }
        let cmd = match std::panic::catch_unwind(AssertUnwindSafe(|| model.update(msg))) {
            Ok(cmd) => cmd,
            Err(payload) => {
                core.fail(ProgramError::UpdatePanic(panic_message(payload)));
                break;
            }
        };
        core.cell.publish(&model);
        core.execute(cmd);
    }
}

/// Reacts to model changes by switching the active subscription: the
/// previous activation is cancelled and awaited -- so its disposers have
/// finished -- before the next one starts. Exactly one subscription is
/// active at any time.
async fn subscription_loop<M: Model>(
    core: Arc<Core<M>>,
    mut model: Arc<M>,
    mut changes: mpsc::UnboundedReceiver<Arc<M>>,
) {
    loop {
        let active = activate(&core, model.subscriptions());
        let next = changes.recv().await;
        if let Some(active) = active {
            active.abort();
            let _ = active.await;
        }
        match next {
            Some(next) => {
                tracing::trace!("model changed, switching subscription");
                model = next;
            }
            None => break,
        }
    }
}

/// Spawn the drain task for one subscription activation.
fn activate<M: Model>(
    core: &Arc<Core<M>>,
    sub: Subscription<M::Message, M::Error>,
) -> Option<JoinHandle<()>> {
    if sub.is_none() || core.terminated.load(Ordering::SeqCst) {
        return None;
    }
    let core = core.clone();
    let mut stream = sub.into_stream();
    Some(tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            match item {
                Ok(msg) => {
                    if core.msg_tx.send(msg).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    core.fail(ProgramError::Subscription(error));
                    break;
                }
            }
        }
    }))
}

fn error_kind<E>(error: &ProgramError<E>) -> &'static str {
    match error {
        ProgramError::Command(_) => "command error",
        ProgramError::Subscription(_) => "subscription error",
        ProgramError::UpdatePanic(_) => "update panic",
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
