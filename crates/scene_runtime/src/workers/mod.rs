//! Background worker pool
//!
//! CPU-heavy tasks (particle simulation, pathfinding, terrain
//! generation) run on isolated worker threads. A request carries a
//! generated task id, a task name and a JSON payload; the matching
//! response is correlated back by id. Results are merged on the main
//! thread when polled, so no engine state needs locking.

mod tasks;

pub use tasks::run_task;

use std::collections::HashMap;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by background tasks
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkerError {
    /// No task function registered under this name
    #[error("unknown worker task: {0}")]
    UnknownTask(String),

    /// The task function itself failed
    #[error("worker task failed: {0}")]
    TaskFailed(String),

    /// The pool was terminated before the task completed
    #[error("worker pool terminated")]
    Terminated,
}

/// Correlation handle for a submitted task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub u64);

struct TaskRequest {
    task_id: u64,
    task: String,
    data: Value,
}

struct TaskResponse {
    task_id: u64,
    result: Result<Value, WorkerError>,
}

/// Pool of worker threads consuming task requests off a shared channel
pub struct WorkerPool {
    sender: Option<Sender<TaskRequest>>,
    results_rx: Receiver<TaskResponse>,
    handles: Vec<thread::JoinHandle<()>>,
    next_task_id: u64,
    /// Settled tasks awaiting pickup, keyed by task id
    settled: HashMap<u64, Result<Value, WorkerError>>,
    /// Ids submitted but not yet taken
    in_flight: std::collections::HashSet<u64>,
}

impl WorkerPool {
    /// Spawn a pool with `size` worker threads
    pub fn new(size: usize) -> Self {
        let (req_tx, req_rx) = unbounded::<TaskRequest>();
        let (res_tx, res_rx) = unbounded::<TaskResponse>();

        let mut handles = Vec::with_capacity(size.max(1));
        for index in 0..size.max(1) {
            let rx: Receiver<TaskRequest> = req_rx.clone();
            let tx: Sender<TaskResponse> = res_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("scene-worker-{index}"))
                .spawn(move || {
                    // Loop ends when the request channel closes.
                    while let Ok(request) = rx.recv() {
                        let result = tasks::run_task(&request.task, &request.data);
                        if tx
                            .send(TaskResponse {
                                task_id: request.task_id,
                                result,
                            })
                            .is_err()
                        {
                            break;
                        }
                    }
                })
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        Self {
            sender: Some(req_tx),
            results_rx: res_rx,
            handles,
            next_task_id: 1,
            settled: HashMap::new(),
            in_flight: std::collections::HashSet::new(),
        }
    }

    /// Submit a task; the returned handle is used to collect the result
    pub fn submit(&mut self, task: &str, data: Value) -> TaskHandle {
        let task_id = self.next_task_id;
        self.next_task_id += 1;
        self.in_flight.insert(task_id);

        if let Some(sender) = &self.sender {
            let request = TaskRequest {
                task_id,
                task: task.to_string(),
                data,
            };
            if sender.send(request).is_err() {
                self.settled.insert(task_id, Err(WorkerError::Terminated));
            }
        } else {
            self.settled.insert(task_id, Err(WorkerError::Terminated));
        }
        TaskHandle(task_id)
    }

    /// Drain finished responses into the settled map
    pub fn poll(&mut self) {
        while let Ok(response) = self.results_rx.try_recv() {
            self.settled.insert(response.task_id, response.result);
        }
    }

    /// Take the result for `handle` if it has settled
    pub fn take(&mut self, handle: TaskHandle) -> Option<Result<Value, WorkerError>> {
        self.poll();
        let result = self.settled.remove(&handle.0);
        if result.is_some() {
            self.in_flight.remove(&handle.0);
        }
        result
    }

    /// Block until the result for `handle` arrives (test/demo helper)
    pub fn wait(&mut self, handle: TaskHandle) -> Result<Value, WorkerError> {
        if let Some(result) = self.settled.remove(&handle.0) {
            self.in_flight.remove(&handle.0);
            return result;
        }
        if !self.in_flight.contains(&handle.0) {
            return Err(WorkerError::Terminated);
        }
        while let Ok(response) = self.results_rx.recv() {
            let done = response.task_id == handle.0;
            self.settled.insert(response.task_id, response.result);
            if done {
                self.in_flight.remove(&handle.0);
                return self
                    .settled
                    .remove(&handle.0)
                    .expect("result just inserted");
            }
        }
        Err(WorkerError::Terminated)
    }

    /// Number of submitted tasks whose results were not yet taken
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Close the request channel and join every worker thread
    pub fn terminate(&mut self) {
        self.sender = None;
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::error!("worker thread panicked during shutdown");
            }
        }
        // Outstanding tasks will never settle now.
        for id in self.in_flight.drain() {
            self.settled.entry(id).or_insert(Err(WorkerError::Terminated));
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}
