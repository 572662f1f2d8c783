//! Application layer - Use cases that coordinate domain services.
//!
//! This layer contains the application-specific business rules and orchestrates
//! the flow of data between the CLI layer and domain services.

mod init;
mod sync;

pub use init::{InitOutcome, init_project};
pub use sync::{SyncError, SyncOutcome, SyncReport, Synchronizer};
