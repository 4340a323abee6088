//! merge-pr-to-branch - deployment branch reconciler
//!
//! Rebuilds a *target* branch as a *base* branch plus every open pull request
//! that carries a deploy-request label and is currently mergeable. Each run
//! starts from base's tip, so the result is the same no matter how many
//! times it runs. Merge outcomes are written back onto the pull requests as
//! labels and comments.
//!
//! # Architecture
//!
//! - [`lock`] - branch-ref mutex serializing runs per base branch
//! - [`deploy`] - select, sync and report phases plus the orchestrator
//! - [`platform`] - repository host abstraction and the GitHub implementation
//! - [`git`] - git subprocess abstraction for the local workspace
//!
//! All I/O is async and state is passed explicitly (no globals).

pub mod auth;
pub mod config;
pub mod deploy;
pub mod error;
pub mod git;
pub mod lock;
pub mod platform;
pub mod retry;
pub mod telemetry;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
