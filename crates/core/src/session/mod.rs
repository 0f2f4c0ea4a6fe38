//! # Sessions
//!
//! Per-run working directories. The session directory is the only
//! persistent store of the pipeline; every in-memory entity is derived from
//! and re-serialized to files inside it.

pub mod io;
pub mod layout;
pub mod manager;

pub use layout::StageId;
pub use manager::{Checkpoint, Session, SessionManager, SessionMetadata, SessionStatus};
