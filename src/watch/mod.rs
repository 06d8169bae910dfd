//! Live change notification for note roots.
//!
//! Bridges a recursive filesystem watch to clients through per-session
//! change streams.

mod event;
mod session;
mod watcher;

pub use session::{ChangeStream, SessionManager};
