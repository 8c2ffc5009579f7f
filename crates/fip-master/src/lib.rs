//! Master-side dialogue engine (C5): spawns interop modules, handshakes
//! with them, and drives the symbol/compile/tag request rounds described
//! in `spec.md` §4.5.
//!
//! Grounded on the pack's conformance test harness (`spawn_harness`,
//! `ChildIo` in `conformance/tests-runner/src/main.rs`) for the
//! spawn-with-piped-stdio pattern, and on the teacher's hand-rolled error
//! enum style (`hub_session.rs`'s `HubSessionError`) for [`MasterError`].

mod child;
mod engine;
mod error;

pub use child::ManagedChild;
pub use engine::{CompileResult, MasterState, TagOutcome};
pub use error::MasterError;
