//! CLI module for CourseBuddy
//!
//! Handles command-line argument parsing.

pub mod args;

pub use args::{Args, Commands, RetrievalArgs, Verbosity};
