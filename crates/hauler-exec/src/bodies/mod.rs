//! Job bodies shipped with the runner.
//!
//! Only `command` is built in. Analysis kinds are registered by the embedding application.
mod command;
pub use command::{CommandBody, CommandPayload, SCRATCH_DIR_ENV};

use hauler_core::body::{BodyError, BodyRegistry, JobBody};
use hauler_model::{JobDescription, JobKind};

/// Registry with every built-in body.
pub fn builtin_registry() -> BodyRegistry {
    BodyRegistry::new().with(
        JobKind::Command,
        |_: &JobDescription| -> Result<Box<dyn JobBody>, BodyError> {
            Ok(Box::new(CommandBody::new()))
        },
    )
}
