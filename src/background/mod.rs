//! Background Module
//!
//! Where upper layers send maintenance work (compactions, flushes).
//!
//! ## Architecture
//! - `TaskQueue`: one mutex, one condition variable, a FIFO queue and a
//!   single worker thread started on the first `schedule`
//! - `start_thread`: detached threads outside the queue

mod queue;

pub use queue::{start_thread, Task, TaskQueue};
