//! Task queue: registry, admission control, and the worker pool.

pub mod admission;
pub mod registry;
pub mod worker;

pub use admission::{AdmissionController, SlotGuard};
pub use registry::{Task, TaskRegistry, TaskState};
pub use worker::WorkerPool;
