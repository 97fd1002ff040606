//! Background work: the job model, the Redis broker and result store, the worker
//! that executes jobs, the beat scheduler, and the session-side polling contract.

pub mod cleanup;
pub mod handlers;
pub mod jobs;
pub mod model;
pub mod poll;
pub mod progress;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod stats;
pub mod worker;
