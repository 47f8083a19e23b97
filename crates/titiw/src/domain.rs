//! Pure session data types: catalog, usage, tracked files, and messages.

pub mod catalog;
pub mod file;
pub mod message;
pub mod usage;
