//! Resize worker on a dedicated thread
//!
//! Requests travel over an mpsc channel with a reply channel per job, so the
//! caller can stop waiting after the configured timeout while the thread
//! finishes (and drops) the late reply.

use batchdoc_core::worker::InlineExecutor;
use batchdoc_core::{
    ImageCrateCodec, InlineWorker, Worker, WorkerError, WorkerKind, WorkerRequest, WorkerResponse,
};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

static CODEC: ImageCrateCodec = ImageCrateCodec;

type Job = (WorkerRequest, mpsc::Sender<WorkerResponse>);

pub struct ThreadWorker {
    kind: WorkerKind,
    jobs: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl ThreadWorker {
    /// Start a resize worker backed by the built-in codec
    pub fn resize() -> std::io::Result<Self> {
        let (jobs, inbox) = mpsc::channel::<Job>();
        let thread = thread::Builder::new()
            .name("batchdoc-resize".to_string())
            .spawn(move || {
                let inline = InlineWorker {
                    codec: &CODEC,
                    renderer: None,
                };
                for (request, reply) in inbox {
                    let response = match inline.execute(&request) {
                        Ok(output) => WorkerResponse::ok(output),
                        Err(e) => WorkerResponse::failed(e.to_string()),
                    };
                    if reply.send(response).is_err() {
                        debug!("Resize reply dropped; caller stopped waiting");
                    }
                }
            })?;

        Ok(Self {
            kind: WorkerKind::Resize,
            jobs: Some(jobs),
            thread: Some(thread),
        })
    }
}

impl Worker for ThreadWorker {
    fn kind(&self) -> WorkerKind {
        self.kind
    }

    fn submit(
        &self,
        request: &WorkerRequest,
        timeout: Duration,
    ) -> Result<WorkerResponse, WorkerError> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or(WorkerError::Disconnected(self.kind))?;
        let (reply, response) = mpsc::channel();
        jobs.send((request.clone(), reply))
            .map_err(|_| WorkerError::Disconnected(self.kind))?;

        response.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => WorkerError::Timeout(self.kind, timeout),
            RecvTimeoutError::Disconnected => WorkerError::Disconnected(self.kind),
        })
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        // Closing the job channel ends the thread's loop
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("{} panicked", self.kind);
            }
        }
    }
}
