use crate::command::{Command, CommandInner};
use crate::model::Model;

/// A headless test harness that drives a [`Model`] without the runtime.
///
/// `TestProgram` lets you exercise the init/update cycle in a plain
/// `#[test]` function -- no tokio runtime required. Synchronous commands
/// ([`Command::of`]) are collected and can be flushed with
/// [`drain_messages`](TestProgram::drain_messages); async commands are
/// silently ignored, as are subscriptions. Use a real
/// [`Program`](crate::Program) in an async test to cover those.
///
/// # Example
///
/// ```rust,ignore
/// use matcha_core::testing::TestProgram;
///
/// let mut prog = TestProgram::<Counter>::new(0); // calls Counter::init(0)
/// prog.send(CounterMsg::Increment);              // triggers update
/// prog.send(CounterMsg::Increment);
/// assert_eq!(prog.model().count, 2);             // inspect state
/// ```
pub struct TestProgram<M: Model> {
    model: M,
    pending_messages: Vec<M::Message>,
}

impl<M: Model> TestProgram<M> {
    /// Create a test program by calling [`Model::init`] with the given flags.
    ///
    /// Synchronous messages produced by the init command are collected into
    /// the pending queue; call
    /// [`drain_messages`](TestProgram::drain_messages) to process them.
    pub fn new(flags: M::Flags) -> Self {
        let (model, init_cmd) = M::init(flags);
        let mut program = Self {
            model,
            pending_messages: Vec::new(),
        };
        program.collect_sync_messages(init_cmd);
        program
    }

    /// Send a message, triggering a single update cycle.
    ///
    /// Synchronous commands returned by `update` are enqueued; call
    /// [`drain_messages`](TestProgram::drain_messages) to flush them.
    pub fn send(&mut self, msg: M::Message) {
        let cmd = self.model.update(msg);
        self.collect_sync_messages(cmd);
    }

    /// Process all pending synchronous messages produced by [`Command::of`].
    ///
    /// Repeatedly drains the pending queue, calling [`Model::update`] for
    /// each message, until no new synchronous messages are generated. Useful
    /// for command-chaining scenarios where one update produces a message
    /// that triggers another update.
    pub fn drain_messages(&mut self) {
        while !self.pending_messages.is_empty() {
            let messages: Vec<_> = self.pending_messages.drain(..).collect();
            for msg in messages {
                let cmd = self.model.update(msg);
                self.collect_sync_messages(cmd);
            }
        }
    }

    /// Get a shared reference to the model for assertions.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Get a mutable reference to the model for direct test setup.
    ///
    /// This bypasses the normal message-driven update cycle, which can be
    /// useful for arranging test state before sending messages.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    fn collect_sync_messages(&mut self, cmd: Command<M::Message, M::Error>) {
        match cmd.inner {
            CommandInner::None => {}
            CommandInner::Message(msg) => {
                self.pending_messages.push(msg);
            }
            CommandInner::Batch(cmds) => {
                for cmd in cmds {
                    self.collect_sync_messages(cmd);
                }
            }
            // Async commands can't be executed synchronously in tests
            CommandInner::Future(_) | CommandInner::Stream(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    // A minimal counter model for testing
    #[derive(Clone, PartialEq)]
    struct Counter {
        count: i64,
    }

    #[derive(Debug)]
    enum CounterMsg {
        Increment,
        Decrement,
        Reset,
    }

    impl Model for Counter {
        type Message = CounterMsg;
        type Error = Infallible;
        type Flags = i64;

        fn init(initial: i64) -> (Self, Command<CounterMsg, Infallible>) {
            (Counter { count: initial }, Command::none())
        }

        fn update(&mut self, msg: CounterMsg) -> Command<CounterMsg, Infallible> {
            match msg {
                CounterMsg::Increment => self.count += 1,
                CounterMsg::Decrement => self.count -= 1,
                CounterMsg::Reset => self.count = 0,
            }
            Command::none()
        }
    }

    #[test]
    fn init_applies_flags() {
        let prog = TestProgram::<Counter>::new(42);
        assert_eq!(prog.model().count, 42);
    }

    #[test]
    fn send_runs_one_update() {
        let mut prog = TestProgram::<Counter>::new(0);
        prog.send(CounterMsg::Increment);
        assert_eq!(prog.model().count, 1);
    }

    #[test]
    fn send_multiple_folds_in_order() {
        let mut prog = TestProgram::<Counter>::new(0);
        prog.send(CounterMsg::Increment);
        prog.send(CounterMsg::Increment);
        prog.send(CounterMsg::Increment);
        prog.send(CounterMsg::Decrement);
        assert_eq!(prog.model().count, 2);
    }

    #[test]
    fn reset_clears_count() {
        let mut prog = TestProgram::<Counter>::new(10);
        prog.send(CounterMsg::Increment);
        prog.send(CounterMsg::Reset);
        assert_eq!(prog.model().count, 0);
    }

    #[test]
    fn model_mut_allows_direct_setup() {
        let mut prog = TestProgram::<Counter>::new(0);
        prog.model_mut().count = 99;
        prog.send(CounterMsg::Increment);
        assert_eq!(prog.model().count, 100);
    }

    // A model that uses Command::of for chaining
    #[derive(Clone, PartialEq)]
    struct ChainModel {
        steps: Vec<String>,
    }

    #[derive(Debug)]
    enum ChainMsg {
        Start,
        Step(String),
    }

    impl Model for ChainModel {
        type Message = ChainMsg;
        type Error = Infallible;
        type Flags = ();

        fn init(_: ()) -> (Self, Command<ChainMsg, Infallible>) {
            (ChainModel { steps: vec![] }, Command::none())
        }

        fn update(&mut self, msg: ChainMsg) -> Command<ChainMsg, Infallible> {
            match msg {
                ChainMsg::Start => {
                    self.steps.push("started".into());
                    Command::of(ChainMsg::Step("auto".into()))
                }
                ChainMsg::Step(s) => {
                    self.steps.push(s);
                    Command::none()
                }
            }
        }
    }

    #[test]
    fn sync_message_chaining() {
        let mut prog = TestProgram::<ChainModel>::new(());
        prog.send(ChainMsg::Start);
        // Command::of should have queued ChainMsg::Step
        prog.drain_messages();
        assert_eq!(prog.model().steps, vec!["started", "auto"]);
    }

    #[test]
    fn init_command_messages_are_pending() {
        #[derive(Clone, PartialEq)]
        struct Eager {
            seen: Vec<i32>,
        }

        impl Model for Eager {
            type Message = i32;
            type Error = Infallible;
            type Flags = ();

            fn init(_: ()) -> (Self, Command<i32, Infallible>) {
                (Eager { seen: vec![] }, Command::batch(vec![Command::of(1), Command::of(2)]))
            }

            fn update(&mut self, msg: i32) -> Command<i32, Infallible> {
                self.seen.push(msg);
                Command::none()
            }
        }

        let mut prog = TestProgram::<Eager>::new(());
        assert!(prog.model().seen.is_empty());
        prog.drain_messages();
        assert_eq!(prog.model().seen, vec![1, 2]);
    }
}
