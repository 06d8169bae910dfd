//! Configuration module for Marknotes
//!
//! This module handles the server configuration and the user preferences
//! record, including serialization/deserialization and persistent storage
//! in platform-specific directories.

mod persistence;
mod server;
mod settings;
mod store;

pub use persistence::*;
pub use server::*;
pub use settings::*;
pub use store::PreferenceStore;
