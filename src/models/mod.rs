//! Domain models for tns-reporter.
//!
//! - [`Target`]: an astronomical object with a mutable canonical name.
//! - [`TargetName`]: an alias preserving a name the target used to carry.
//! - [`Message`]: a one-shot notice left on a target by a TNS submission.
//! - [`FormKind`]: which TNS sub-form a page opens on or a submission uses.

mod message;
mod report;
mod target;

pub use message::*;
pub use report::*;
pub use target::*;
