//! rpo Git Integration
//!
//! Reads history, file listings and blame traces from git repositories.

pub mod command;
pub mod repository;
pub mod source;

#[cfg(test)]
pub mod testutils;

pub use repository::{GitError, GitRepository};
