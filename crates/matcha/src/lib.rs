//! **matcha** -- a Model–Update–Subscription runtime for Rust, following the
//! Elm Architecture.
//!
//! This is the umbrella crate that re-exports everything you need from a
//! single dependency:
//!
//! ```toml
//! [dependencies]
//! matcha = "0.1"
//! ```
//!
//! # Re-exports
//!
//! * All public items from [`matcha_core`] are available at the crate root
//!   ([`Model`], [`Command`], [`Subscription`], [`Task`], [`Program`],
//!   [`ViewProgram`], etc.).
//! * [`tokio`] and [`futures`] are re-exported so downstream crates do not
//!   need to depend on them directly.
//!
//! # Quick start
//!
//! ```ignore
//! use matcha::{Command, Model, Program};
//! use std::convert::Infallible;
//!
//! #[derive(Clone, PartialEq)]
//! struct App { greeting: String }
//!
//! enum Msg { Greet(String) }
//!
//! impl Model for App {
//!     type Message = Msg;
//!     type Error = Infallible;
//!     type Flags = String;
//!
//!     fn init(greeting: String) -> (Self, Command<Msg, Infallible>) {
//!         (App { greeting }, Command::none())
//!     }
//!
//!     fn update(&mut self, msg: Msg) -> Command<Msg, Infallible> {
//!         match msg {
//!             Msg::Greet(name) => self.greeting = format!("hello, {name}"),
//!         }
//!         Command::none()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let program = Program::<App>::with_flags("hello".into());
//!     program.dispatch(Msg::Greet("world".into()));
//!     program.shutdown().await;
//! }
//! ```

pub use matcha_core::*;

// Re-export dependencies for use in downstream crates
pub use futures;
pub use tokio;
