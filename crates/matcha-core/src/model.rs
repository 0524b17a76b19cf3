use crate::command::Command;
use crate::subscription::Subscription;

/// The top-level application trait, following the [Elm Architecture].
///
/// Every matcha application implements `Model`. The runtime drives a
/// continuous **init -> update -> subscriptions** cycle:
///
/// 1. [`init`](Model::init) creates the initial state and may return a
///    [`Command`] for early side effects (e.g. fetching data).
/// 2. Messages arrive through [`dispatch`](crate::Program::dispatch),
///    through commands, and through [`Subscription`]s.
/// 3. [`update`](Model::update) processes each message in turn, mutates
///    state, and optionally returns a [`Command`] for further work.
/// 4. After every state change the runtime re-reads
///    [`subscriptions`](Model::subscriptions), cancelling the previous
///    subscription and activating the new one.
///
/// The runtime publishes every distinct state to the program's model stream
/// ([`Program::models`](crate::Program::models)); renderers attach there.
///
/// # Example
///
/// ```rust,ignore
/// use matcha_core::{Command, Model};
/// use std::convert::Infallible;
///
/// #[derive(Clone, PartialEq)]
/// struct Counter {
///     count: i64,
/// }
///
/// #[derive(Debug)]
/// enum Msg {
///     Increment,
///     Decrement,
/// }
///
/// impl Model for Counter {
///     type Message = Msg;
///     type Error = Infallible;
///     type Flags = i64;
///
///     fn init(initial: i64) -> (Self, Command<Msg, Infallible>) {
///         (Counter { count: initial }, Command::none())
///     }
///
///     fn update(&mut self, msg: Msg) -> Command<Msg, Infallible> {
///         match msg {
///             Msg::Increment => self.count += 1,
///             Msg::Decrement => self.count -= 1,
///         }
///         Command::none()
///     }
/// }
/// ```
///
/// [Elm Architecture]: https://guide.elm-lang.org/architecture/
pub trait Model: Clone + PartialEq + Sized + Send + Sync + 'static {
    /// The application's message type.
    ///
    /// Every event that can affect the application state is a variant of
    /// this type. Messages arrive from [`Subscription`]s, from
    /// [`Command::of`], or from async work completed via
    /// [`Command::perform`] and the [`Task`](crate::Task) bridges.
    type Message: Send + 'static;

    /// The effect error type carried on the command and subscription error
    /// channels.
    ///
    /// An error of this type that reaches the runtime unconverted fails the
    /// program (see [`ProgramError`](crate::ProgramError)). Applications
    /// with no unhandled failure mode use [`Infallible`](std::convert::Infallible).
    type Error: Send + 'static;

    /// Initialization data passed to [`Model::init`].
    ///
    /// Use `()` when no startup data is needed; such programs can be started
    /// with [`Program::new`](crate::Program::new). Programs that take
    /// bootstrap parameters define a carrier type and start with
    /// [`Program::with_flags`](crate::Program::with_flags).
    type Flags: Send + 'static;

    /// Create the initial model state and an optional startup command.
    ///
    /// Called once when the program starts. The startup command is executed
    /// without blocking construction; its messages are processed once the
    /// update loop is running.
    fn init(flags: Self::Flags) -> (Self, Command<Self::Message, Self::Error>);

    /// Process a message, mutate state, and return a command for side
    /// effects.
    ///
    /// The runtime calls `update` from a single consumer task, one message
    /// at a time in dispatch order, so no concurrency control is needed
    /// inside. A message emitted synchronously by the returned command (via
    /// [`Command::of`]) is processed after the current message completes,
    /// never within the same invocation.
    fn update(&mut self, msg: Self::Message) -> Command<Self::Message, Self::Error>;

    /// Declare the active subscription for the current state.
    ///
    /// Re-read after every distinct state change. The previously active
    /// subscription is cancelled -- its disposers run -- before the one
    /// returned here is activated. Compose multiple sources with
    /// [`Subscription::batch`].
    ///
    /// The default implementation returns [`Subscription::none`].
    fn subscriptions(&self) -> Subscription<Self::Message, Self::Error> {
        Subscription::none()
    }
}
