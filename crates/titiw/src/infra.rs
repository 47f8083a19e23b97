//! Infrastructure adapters for git, filesystem, and completion backends.

/// Gitignore-aware project listing and fuzzy path matching.
pub mod file_index;
pub mod file_reader;
pub mod git;
/// Completion provider boundary and the `OpenAI` HTTP client.
pub mod provider;
