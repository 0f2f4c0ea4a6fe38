//! # Pipeline
//!
//! Stage sequencing, the bounded revision loop, parallel fan-out and
//! progress events.

pub mod events;
pub mod fanout;
pub mod orchestrator;
pub mod revision;

pub use events::{EventSink, PipelineEvent, PipelineEventKind};
pub use fanout::{JoinOutcome, JoinPolicy, TaskGroup};
pub use orchestrator::{open_session, Ghostwriter, PipelineResult, RunScope};
pub use revision::RevisionLoop;
