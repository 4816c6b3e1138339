//! tally-core - Core library for tally
//!
//! This crate contains the shared models, mirror store, remote client,
//! and the reconciliation engine used by the CLI.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Group, GroupId, Membership, Task, TaskId, TimeRecord};
pub use sync::{ItemFailure, PassSummary};
