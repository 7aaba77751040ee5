//! tally-core: client library for the tally collaborative task tracker.
//!
//! The backend owns all data. This crate fetches it, keeps a per-workspace
//! task view in step with the push-event stream, and gates mutations by the
//! viewer's role before they reach the server.
//!
//! # Layout
//!
//! - [`model`]: records and payloads as they appear on the wire.
//! - [`remote`]: the request/response API traits and the HTTP client.
//! - [`event`]: push events, their line codec, and subscriptions.
//! - [`view`]: the task view (reducer, derivation, synchronizer).
//! - [`session`], [`dashboard`], [`roster`]: the surrounding screens.
//!
//! # Conventions
//!
//! - **Errors**: [`error::TallyError`] for library operations, `anyhow` for
//!   file-backed configuration and session storage.
//! - **Logging**: `tracing` macros; nothing here installs a subscriber.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod event;
pub mod model;
pub mod remote;
pub mod roster;
pub mod session;
pub mod view;

pub use error::{ErrorCode, TallyError};
pub use session::Session;
pub use view::TaskViewSync;
