//! examrun-core — the exam session runtime.
//!
//! Turns a loaded exam definition into a timed, scored attempt and gates
//! the saving of its result behind an authentication collaborator.

pub mod answers;
pub mod duration;
pub mod error;
pub mod gate;
pub mod machine;
pub mod mock;
pub mod model;
pub mod parser;
pub mod result;
pub mod review;
pub mod scoring;
pub mod session;
pub mod timer;
pub mod traits;
