pub mod auth;
pub mod collab;
pub mod completions;
pub mod task;
pub mod watch;
pub mod workspace;
