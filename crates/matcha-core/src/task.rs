use crate::command::Command;
use futures::future::{self, BoxFuture};
use std::convert::Infallible;
use std::future::Future;

/// An effectful computation that produces an `A` or fails with an `E`.
///
/// `Task` is the composition layer in front of [`Command`]: build and combine
/// effects here, then bridge the result into a single-message command with
/// [`perform`](Task::perform), [`attempt`](Task::attempt), or
/// [`attempt_with`](Task::attempt_with).
///
/// The expected pattern is to convert failures into messages at this
/// boundary, so that `update` can handle them like any other event and the
/// program's error channel stays reserved for failures the application
/// declined to handle.
pub struct Task<A: Send + 'static, E: Send + 'static> {
    fut: BoxFuture<'static, Result<A, E>>,
}

impl<A: Send + 'static, E: Send + 'static> Task<A, E> {
    /// Wrap a fallible future.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<A, E>> + Send + 'static,
    {
        Task {
            fut: Box::pin(future),
        }
    }

    /// A task that immediately succeeds with `value`.
    pub fn ok(value: A) -> Self {
        Task {
            fut: Box::pin(future::ready(Ok(value))),
        }
    }

    /// A task that immediately fails with `error`.
    pub fn err(error: E) -> Self {
        Task {
            fut: Box::pin(future::ready(Err(error))),
        }
    }

    /// Transform the success value.
    pub fn map<B: Send + 'static>(self, f: impl FnOnce(A) -> B + Send + 'static) -> Task<B, E> {
        Task {
            fut: Box::pin(async move { self.fut.await.map(f) }),
        }
    }

    /// Transform the error value.
    pub fn map_err<E2: Send + 'static>(
        self,
        f: impl FnOnce(E) -> E2 + Send + 'static,
    ) -> Task<A, E2> {
        Task {
            fut: Box::pin(async move { self.fut.await.map_err(f) }),
        }
    }

    /// Chain a second task on the success of this one.
    pub fn and_then<B: Send + 'static>(
        self,
        f: impl FnOnce(A) -> Task<B, E> + Send + 'static,
    ) -> Task<B, E> {
        Task {
            fut: Box::pin(async move {
                let value = self.fut.await?;
                f(value).fut.await
            }),
        }
    }

    /// Run two tasks concurrently; succeed with both values or fail with the
    /// first error.
    pub fn both<B: Send + 'static>(self, other: Task<B, E>) -> Task<(A, B), E> {
        Task {
            fut: Box::pin(future::try_join(self.fut, other.fut)),
        }
    }

    /// Run every task concurrently; succeed with all values in input order or
    /// fail with the first error.
    pub fn all(tasks: impl IntoIterator<Item = Task<A, E>>) -> Task<Vec<A>, E> {
        Task {
            fut: Box::pin(future::try_join_all(tasks.into_iter().map(|task| task.fut))),
        }
    }

    /// Bridge into a command that emits `to_msg(result)` for either outcome.
    ///
    /// The resulting command never fails: both success and failure become
    /// messages for `update` to handle.
    pub fn attempt<Msg, E2>(
        self,
        to_msg: impl FnOnce(Result<A, E>) -> Msg + Send + 'static,
    ) -> Command<Msg, E2>
    where
        Msg: Send + 'static,
        E2: Send + 'static,
    {
        Command::from_effect(async move { Ok(to_msg(self.fut.await)) })
    }

    /// Bridge into a command with separate success and failure handlers.
    pub fn attempt_with<Msg, E2>(
        self,
        on_success: impl FnOnce(A) -> Msg + Send + 'static,
        on_failure: impl FnOnce(E) -> Msg + Send + 'static,
    ) -> Command<Msg, E2>
    where
        Msg: Send + 'static,
        E2: Send + 'static,
    {
        Command::from_effect(async move {
            Ok(match self.fut.await {
                Ok(value) => on_success(value),
                Err(error) => on_failure(error),
            })
        })
    }

    /// Bridge into a command that fails the program on error.
    ///
    /// On success the value is emitted as the single message; on failure the
    /// error reaches the program's error channel untouched.
    pub fn into_command(self) -> Command<A, E> {
        Command::from_effect(self.fut)
    }
}

impl<A: Send + 'static> Task<A, Infallible> {
    /// Bridge an infallible task into a command emitting `to_msg(value)`.
    pub fn perform<Msg, E2>(
        self,
        to_msg: impl FnOnce(A) -> Msg + Send + 'static,
    ) -> Command<Msg, E2>
    where
        Msg: Send + 'static,
        E2: Send + 'static,
    {
        Command::from_effect(async move {
            match self.fut.await {
                Ok(value) => Ok(to_msg(value)),
                Err(never) => match never {},
            }
        })
    }
}
