//! Core types shared by every nodeup module: the error taxonomy and its
//! user-facing rendering.

pub mod error;

pub use error::{ErrorContext, UpdaterError, find_updater_error, user_friendly_error};
