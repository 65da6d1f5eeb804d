//! Status updates queued for delivery to the coordinator.
mod pending;
pub use pending::PendingUpdate;

mod batch;
pub use batch::UpdateBatch;
