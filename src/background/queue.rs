//! Background task queue
//!
//! FIFO queue drained by one lazily started worker thread.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::error::{EnvError, Result};

/// A unit of background work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

struct QueueState {
    tasks: VecDeque<Task>,
    started: bool,
    shutting_down: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    /// Signalled when the queue goes from empty to non-empty, and on shutdown
    signal: Condvar,
}

/// Single-worker FIFO task queue
///
/// ## Ordering
/// Tasks run one at a time, strictly in the order they were scheduled.
/// There is no priority and no cancellation: once scheduled, a task runs,
/// even if `shutdown` is called before the worker reaches it.
pub struct TaskQueue {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    thread_name: String,
}

impl TaskQueue {
    pub fn new(thread_name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    tasks: VecDeque::new(),
                    started: false,
                    shutting_down: false,
                }),
                signal: Condvar::new(),
            }),
            worker: Mutex::new(None),
            thread_name: thread_name.into(),
        }
    }

    /// Queue `task` for the worker, starting the worker on first use
    pub fn schedule<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock();

        if state.shutting_down {
            return Err(EnvError::ShutDown);
        }

        if !state.started {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(self.thread_name.clone())
                .spawn(move || worker_loop(shared))
                .map_err(EnvError::ThreadSpawn)?;
            *self.worker.lock() = Some(handle);
            state.started = true;
            tracing::debug!(thread = %self.thread_name, "started background worker");
        }

        // If the queue is empty the worker may be waiting
        if state.tasks.is_empty() {
            self.shared.signal.notify_one();
        }

        state.tasks.push_back(Box::new(task));
        Ok(())
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        self.shared.state.lock().tasks.len()
    }

    /// Whether the worker thread has been started
    pub fn is_started(&self) -> bool {
        self.shared.state.lock().started
    }

    /// Refuse new tasks, let the worker drain the queue, and join it
    ///
    /// Calling it again, or from a task running on the worker, returns
    /// without waiting.
    pub fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            state.shutting_down = true;
            self.shared.signal.notify_all();
        }

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return Ok(());
            }
            if handle.join().is_err() {
                tracing::warn!(thread = %self.thread_name, "background worker panicked");
            }
            tracing::debug!(thread = %self.thread_name, "background worker stopped");
        }
        Ok(())
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "failed to stop background worker");
        }
    }
}

/// Body of the background worker
fn worker_loop(shared: Arc<Shared>) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            while state.tasks.is_empty() {
                if state.shutting_down {
                    return;
                }
                shared.signal.wait(&mut state);
            }
            state.tasks.pop_front()
        };

        if let Some(task) = task {
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                tracing::warn!("background task panicked");
            }
        }
    }
}

/// Run `task` on a new detached thread, independent of any queue
pub fn start_thread<F>(name: &str, task: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(task)
        .map_err(EnvError::ThreadSpawn)?;
    Ok(())
}
