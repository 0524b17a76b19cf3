use crate::model::Model;
use crate::runtime::{Dispatcher, Program, ProgramError};
use futures::{Stream, StreamExt};
use std::sync::Arc;

/// A [`Program`] paired with a view function, producing a stream of rendered
/// output alongside the model stream.
///
/// The adapter is a thin projection: `doms` is
/// `models().map(|m| view(&m, &dispatcher))` and adds no scheduling
/// semantics of its own. The view receives the same [`Dispatcher`] on every
/// render, so event handlers wired into the output keep working across
/// model updates.
///
/// `V` is whatever the target renderer consumes -- a widget tree, a virtual
/// DOM node, a plain `String`. Renderer bindings subscribe to
/// [`doms`](ViewProgram::doms) (or use [`run_with`](ViewProgram::run_with))
/// and call [`Dispatcher::dispatch`] on user interaction.
pub struct ViewProgram<M: Model, V> {
    program: Program<M>,
    #[allow(clippy::type_complexity)]
    view: Arc<dyn Fn(&M, &Dispatcher<M::Message>) -> V + Send + Sync>,
}

impl<M: Model<Flags = ()>, V: Send + 'static> ViewProgram<M, V> {
    /// Start a view program that takes no bootstrap parameters.
    pub fn new(view: impl Fn(&M, &Dispatcher<M::Message>) -> V + Send + Sync + 'static) -> Self {
        Self::with_flags((), view)
    }
}

impl<M: Model, V: Send + 'static> ViewProgram<M, V> {
    /// Start a view program from external bootstrap parameters.
    pub fn with_flags(
        flags: M::Flags,
        view: impl Fn(&M, &Dispatcher<M::Message>) -> V + Send + Sync + 'static,
    ) -> Self {
        ViewProgram {
            program: Program::with_flags(flags),
            view: Arc::new(view),
        }
    }

    /// The underlying program.
    pub fn program(&self) -> &Program<M> {
        &self.program
    }

    /// Enqueue a message for the update loop.
    pub fn dispatch(&self, msg: M::Message) {
        self.program.dispatch(msg);
    }

    /// The stream of rendered output: one item per model state, starting
    /// with the current one. Ends when the program terminates.
    pub fn doms(&self) -> impl Stream<Item = V> + Send + 'static {
        let view = self.view.clone();
        let dispatcher = self.program.dispatcher();
        self.program
            .models()
            .map(move |model| view(&model, &dispatcher))
    }

    /// Drain the rendered stream into `render` until the program terminates,
    /// with the same completion semantics as
    /// [`Program::run_with`](crate::Program::run_with).
    pub async fn run_with(
        &self,
        mut render: impl FnMut(V),
    ) -> Result<(), ProgramError<M::Error>> {
        let mut doms = self.doms();
        while let Some(dom) = doms.next().await {
            render(dom);
        }
        self.program.finish().await
    }

    /// Shut the underlying program down and wait for teardown.
    pub async fn shutdown(&self) {
        self.program.shutdown().await;
    }
}
