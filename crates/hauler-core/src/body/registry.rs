//! Enum-tagged registry resolving a [`JobKind`] to the body that runs it.
//!
//! The worker process is parameterized only by the job it receives; which code runs
//! is decided here, before the body starts.
use std::sync::Arc;

use tracing::{debug, trace};

use hauler_model::{JobDescription, JobKind};

use crate::body::{BodyError, JobBody};

/// Builds a fresh body instance for one job.
pub trait BodyFactory: Send + Sync {
    fn build(&self, job: &JobDescription) -> Result<Box<dyn JobBody>, BodyError>;
}

impl<F> BodyFactory for F
where
    F: Fn(&JobDescription) -> Result<Box<dyn JobBody>, BodyError> + Send + Sync,
{
    fn build(&self, job: &JobDescription) -> Result<Box<dyn JobBody>, BodyError> {
        self(job)
    }
}

struct BodyEntry {
    kind: JobKind,
    factory: Arc<dyn BodyFactory>,
}

/// Registry of job bodies keyed by kind.
#[derive(Default)]
pub struct BodyRegistry {
    entries: Vec<BodyEntry>,
}

impl BodyRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `kind`, replacing any previous one.
    pub fn register<F>(&mut self, kind: JobKind, factory: F)
    where
        F: BodyFactory + 'static,
    {
        let factory: Arc<dyn BodyFactory> = Arc::new(factory);
        match self.entries.iter_mut().find(|e| e.kind == kind) {
            Some(entry) => {
                debug!(%kind, "replacing registered job body");
                entry.factory = factory;
            }
            None => self.entries.push(BodyEntry { kind, factory }),
        }
    }

    /// Builder-style [`BodyRegistry::register`].
    pub fn with<F>(mut self, kind: JobKind, factory: F) -> Self
    where
        F: BodyFactory + 'static,
    {
        self.register(kind, factory);
        self
    }

    pub fn supports(&self, kind: JobKind) -> bool {
        self.entries.iter().any(|e| e.kind == kind)
    }

    /// Registered kinds, in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = JobKind> + '_ {
        self.entries.iter().map(|e| e.kind)
    }

    /// Build the body for `job`.
    pub fn build(&self, job: &JobDescription) -> Result<Box<dyn JobBody>, BodyError> {
        trace!(job = job.job_id, kind = %job.job_kind, "resolving job body");
        let entry = self
            .entries
            .iter()
            .find(|e| e.kind == job.job_kind)
            .ok_or(BodyError::Unsupported(job.job_kind))?;
        entry.factory.build(job)
    }
}
