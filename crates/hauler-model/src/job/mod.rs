mod kind;
pub use kind::JobKind;

mod description;
pub use description::JobDescription;

/// Coordinator-assigned job identifier.
pub type JobId = u64;
