//! Core runtime for the **matcha** framework.
//!
//! `matcha-core` is a Model–Update–Subscription runtime following the
//! [Elm Architecture]: your program is expressed as a pure
//! **init -> update -> subscriptions** cycle, with side effects pushed to
//! the edges through [`Command`]s and [`Subscription`]s. The runtime owns
//! the model, serializes message processing, executes commands
//! concurrently, switches the active subscription when the model changes,
//! and tears everything down on shutdown.
//!
//! Unlike a TUI or GUI framework, `matcha-core` renders nothing itself: a
//! program emits a stream of model states ([`Program::models`]) and any
//! renderer that maps models to output and forwards user interaction
//! through a [`Dispatcher`] can sit on top (see [`ViewProgram`]).
//!
//! # Key types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Model`] | Top-level application trait (init / update / subscriptions) |
//! | [`Command`] | A lazy sequence of messages produced by a side effect |
//! | [`Subscription`] | Ongoing message source derived from the current model |
//! | [`Task`] | Composable fallible effect, bridged into a [`Command`] |
//! | [`Program`] | The running update/command/subscription scheduler |
//! | [`Dispatcher`] | Cloneable non-blocking message injection handle |
//! | [`ViewProgram`] | A program projected through a view function |
//! | [`TestProgram`](testing::TestProgram) | Headless harness for unit-testing a [`Model`] |
//!
//! # Architecture
//!
//! 1. **init** -- [`Model::init`] creates the initial state and may return a
//!    [`Command`] to kick off early work.
//! 2. **dispatch** -- Messages are enqueued from commands, subscriptions, or
//!    anywhere a [`Dispatcher`] was handed.
//! 3. **update** -- A single consumer drains the queue in FIFO order;
//!    [`Model::update`] processes each message and returns the next command.
//! 4. **publish** -- Every distinct state is published to the model stream;
//!    renderers and the subscription loop react to it.
//! 5. **switch** -- On each distinct state the previous subscription is
//!    cancelled (disposers run) and [`Model::subscriptions`] is activated
//!    anew.
//!
//! # Quick example
//!
//! ```ignore
//! use matcha_core::{Command, Model, Program};
//! use std::convert::Infallible;
//!
//! #[derive(Clone, PartialEq)]
//! struct Counter { count: i64 }
//!
//! enum Msg { Increment, Decrement }
//!
//! impl Model for Counter {
//!     type Message = Msg;
//!     type Error = Infallible;
//!     type Flags = ();
//!
//!     fn init(_flags: ()) -> (Self, Command<Msg, Infallible>) {
//!         (Counter { count: 0 }, Command::none())
//!     }
//!
//!     fn update(&mut self, msg: Msg) -> Command<Msg, Infallible> {
//!         match msg {
//!             Msg::Increment => self.count += 1,
//!             Msg::Decrement => self.count -= 1,
//!         }
//!         Command::none()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let program = Program::<Counter>::new();
//!     program.dispatch(Msg::Increment);
//!     program.shutdown().await;
//! }
//! ```
//!
//! [Elm Architecture]: https://guide.elm-lang.org/architecture/

pub mod command;
pub mod model;
pub mod reactive;
pub mod runtime;
pub mod subscription;
pub mod task;
pub mod testing;
pub mod view;

pub use command::Command;
pub use model::Model;
pub use reactive::{ModelStream, StateCell};
pub use runtime::{Dispatcher, Program, ProgramError};
pub use subscription::{Emit, Subscription};
pub use task::Task;
pub use view::ViewProgram;
