//! Worker process supervision and the worker-side entry loop.
//!
//! The supervisor side is [`Executor`]: it spawns a worker through a [`WorkerSpawner`], drives the
//! handshake, timeout and termination, and relays progress to a coordinator. The worker side is
//! [`run_worker`], which runs one job body and reports back over the same line protocol.
mod error;
pub use error::ExecError;

pub mod codec;

mod channel;
pub use channel::{WorkerChannel, WorkerLease, WorkerSignal, WorkerSpawner};

mod process;
pub use process::{ProcessSpawner, StderrLogConfig, WORKER_ARG};

mod executor;
pub use executor::{
    EventStream, ExecutionSummary, Executor, ExecutorEvent, ExecutorHandle, ExecutorState,
};

mod worker;
pub use worker::run_worker;

pub mod bodies;
pub use bodies::builtin_registry;

mod metrics;
