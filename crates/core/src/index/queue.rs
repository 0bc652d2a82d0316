//! Job queue for running index jobs off the caller's thread.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use parking_lot::Mutex;
use thiserror::Error;

use super::runner::RunnerError;
use super::state::RunState;

pub type Job = Box<dyn FnOnce() -> Result<RunState, RunnerError> + Send>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to start worker for {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The worker for a job name is gone.
    #[error("queue for {0} is closed")]
    Closed(String),

    /// A job finished without reporting a result.
    #[error("job on {0} was abandoned")]
    Abandoned(String),
}

pub trait Queue: Send + Sync {
    /// Enqueue `job` under `name`. Jobs sharing a name run one at a time, in
    /// publication order.
    fn publish(&self, name: &str, job: Job) -> Result<JobHandle, QueueError>;
}

/// Waits for the result of a published job.
pub struct JobHandle {
    name: String,
    done: Receiver<Result<RunState, RunnerError>>,
}

impl JobHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the job completes.
    pub fn done(self) -> Result<RunState, RunnerError> {
        match self.done.recv() {
            Ok(result) => result,
            Err(_) => Err(RunnerError::Queue(QueueError::Abandoned(self.name))),
        }
    }
}

struct Envelope {
    job: Job,
    reply: Sender<Result<RunState, RunnerError>>,
}

/// One worker thread per job name.
#[derive(Default)]
pub struct ThreadQueue {
    lanes: Mutex<HashMap<String, Sender<Envelope>>>,
}

impl ThreadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane(&self, name: &str) -> Result<Sender<Envelope>, QueueError> {
        let mut lanes = self.lanes.lock();
        if let Some(sender) = lanes.get(name) {
            return Ok(sender.clone());
        }

        let (sender, receiver) = unbounded::<Envelope>();
        thread::Builder::new()
            .name(format!("index-{name}"))
            .spawn(move || work(receiver))
            .map_err(|source| QueueError::Spawn { name: name.to_string(), source })?;
        lanes.insert(name.to_string(), sender.clone());
        tracing::debug!(lane = %name, "started index worker");
        Ok(sender)
    }
}

fn work(receiver: Receiver<Envelope>) {
    for Envelope { job, reply } in receiver {
        let result = match catch_unwind(AssertUnwindSafe(job)) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::warn!(error = %message, "index job panicked");
                Err(RunnerError::Panicked(message))
            }
        };
        // The publisher may have stopped waiting.
        let _ = reply.send(result);
    }
}

impl Queue for ThreadQueue {
    fn publish(&self, name: &str, job: Job) -> Result<JobHandle, QueueError> {
        let (reply, done) = bounded(1);
        self.lane(name)?
            .send(Envelope { job, reply })
            .map_err(|_| QueueError::Closed(name.to_string()))?;
        Ok(JobHandle { name: name.to_string(), done })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    fn state(path: &str) -> RunState {
        RunState::empty(Url::parse(&format!("http://test/{path}/")).unwrap())
    }

    #[test]
    fn test_jobs_with_same_name_run_in_order() {
        let queue = ThreadQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<JobHandle> = (0..5)
            .map(|i| {
                let log = log.clone();
                let job: Job = Box::new(move || {
                    thread::sleep(Duration::from_millis(5 - i));
                    log.lock().push(i);
                    Ok(state("a"))
                });
                queue.publish("index:a", job).unwrap()
            })
            .collect();
        for handle in handles {
            handle.done().unwrap();
        }
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_result_is_returned() {
        let queue = ThreadQueue::new();
        let job: Job = Box::new(|| Ok(state("b")));
        let handle = queue.publish("index:b", job).unwrap();
        assert_eq!(handle.name(), "index:b");
        assert_eq!(handle.done().unwrap().realm_url.as_str(), "http://test/b/");
    }

    #[test]
    fn test_panic_becomes_error() {
        let queue = ThreadQueue::new();
        let job: Job = Box::new(|| -> Result<RunState, RunnerError> { panic!("boom") });
        let handle = queue.publish("index:c", job).unwrap();
        assert!(matches!(handle.done(), Err(RunnerError::Panicked(m)) if m == "boom"));

        // the lane survives a panicking job
        let job: Job = Box::new(|| Ok(state("c")));
        let handle = queue.publish("index:c", job).unwrap();
        assert!(handle.done().is_ok());
    }
}
