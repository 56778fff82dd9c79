//! Core types shared across the updater: the error taxonomy and the
//! CLI-facing error display helper.

pub mod error;

pub use error::{UpdaterError, display_error};
