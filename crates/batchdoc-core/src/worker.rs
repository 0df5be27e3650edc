//! Background worker protocol and the worker-or-inline offload strategy
//!
//! Two workers exist: resize and page render. A request goes to the worker
//! when one is attached and the payload is large enough to be worth the
//! copy. When the worker is missing, fails or times out, the same request
//! runs inline once.

use crate::codec::{quality_percent, resize_to_jpeg};
use crate::config::WorkerConfig;
use crate::error::CollaboratorError;
use crate::services::{ImageCodec, PageRenderer, ServiceResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Message posted to a worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerRequest {
    /// Scale an image to fit the bounds and re-encode it as JPEG
    Resize {
        payload: Vec<u8>,
        width: Option<u32>,
        height: Option<u32>,
        /// 0.0..=1.0
        quality: f32,
    },
    /// Rasterize one page (1-indexed) of a PDF
    #[serde(rename_all = "camelCase")]
    RenderPage {
        data: Vec<u8>,
        scale: f32,
        page_number: u32,
    },
}

impl WorkerRequest {
    pub fn kind(&self) -> WorkerKind {
        match self {
            WorkerRequest::Resize { .. } => WorkerKind::Resize,
            WorkerRequest::RenderPage { .. } => WorkerKind::Render,
        }
    }

    pub fn payload_len(&self) -> usize {
        match self {
            WorkerRequest::Resize { payload, .. } => payload.len(),
            WorkerRequest::RenderPage { data, .. } => data.len(),
        }
    }
}

/// Reply from a worker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerResponse {
    pub fn ok(output: WorkerOutput) -> Self {
        Self {
            success: true,
            blob: Some(output.bytes),
            width: Some(output.width),
            height: Some(output.height),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn into_output(self) -> Result<WorkerOutput, WorkerError> {
        match (self.success, self.blob) {
            (true, Some(bytes)) => Ok(WorkerOutput {
                bytes,
                width: self.width.unwrap_or(0),
                height: self.height.unwrap_or(0),
            }),
            (true, None) => Err(WorkerError::Failed("response carried no blob".into())),
            (false, _) => Err(WorkerError::Failed(
                self.error.unwrap_or_else(|| "unknown worker error".into()),
            )),
        }
    }
}

/// Successful result, whichever path produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutput {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    Resize,
    Render,
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerKind::Resize => f.write_str("resize worker"),
            WorkerKind::Render => f.write_str("render worker"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkerError {
    #[error("{0} timed out after {1:?}")]
    Timeout(WorkerKind, Duration),

    #[error("{0} is gone")]
    Disconnected(WorkerKind),

    #[error("Worker failed: {0}")]
    Failed(String),
}

/// A background worker reachable by message passing
pub trait Worker {
    fn kind(&self) -> WorkerKind;

    /// Post `request` and wait up to `timeout` for the reply
    fn submit(&self, request: &WorkerRequest, timeout: Duration)
        -> Result<WorkerResponse, WorkerError>;
}

/// Runs a worker request on the calling thread
pub trait InlineExecutor {
    fn execute(&self, request: &WorkerRequest) -> ServiceResult<WorkerOutput>;
}

/// Inline executor over the codec and an optional page renderer
#[derive(Clone, Copy)]
pub struct InlineWorker<'a> {
    pub codec: &'a dyn ImageCodec,
    pub renderer: Option<&'a dyn PageRenderer>,
}

impl InlineExecutor for InlineWorker<'_> {
    fn execute(&self, request: &WorkerRequest) -> ServiceResult<WorkerOutput> {
        match request {
            WorkerRequest::Resize {
                payload,
                width,
                height,
                quality,
            } => {
                let page = resize_to_jpeg(
                    self.codec,
                    payload,
                    *width,
                    *height,
                    quality_percent(*quality),
                )?;
                Ok(WorkerOutput {
                    bytes: page.jpeg,
                    width: page.width,
                    height: page.height,
                })
            }
            WorkerRequest::RenderPage {
                data,
                scale,
                page_number,
            } => {
                let renderer = self
                    .renderer
                    .ok_or(CollaboratorError::Unavailable("Page renderer"))?;
                let page = renderer.render(data, *page_number, *scale)?;
                Ok(WorkerOutput {
                    bytes: page.image_bytes,
                    width: page.width,
                    height: page.height,
                })
            }
        }
    }
}

/// Worker-or-inline dispatch
pub struct Offload<'a> {
    resize: Option<&'a dyn Worker>,
    render: Option<&'a dyn Worker>,
    inline: &'a dyn InlineExecutor,
    timeout: Duration,
    min_bytes: u64,
}

impl<'a> Offload<'a> {
    pub fn new(inline: &'a dyn InlineExecutor, config: &WorkerConfig) -> Self {
        Self {
            resize: None,
            render: None,
            inline,
            timeout: config.timeout(),
            min_bytes: config.offload_min_bytes,
        }
    }

    /// Attach a worker under its own kind
    pub fn with_worker(mut self, worker: &'a dyn Worker) -> Self {
        match worker.kind() {
            WorkerKind::Resize => self.resize = Some(worker),
            WorkerKind::Render => self.render = Some(worker),
        }
        self
    }

    fn worker_for(&self, request: &WorkerRequest) -> Option<&'a dyn Worker> {
        let worker = match request.kind() {
            WorkerKind::Resize => self.resize,
            WorkerKind::Render => self.render,
        }?;
        (request.payload_len() as u64 > self.min_bytes).then_some(worker)
    }

    /// Run on a worker if one applies, otherwise (or after it fails) inline
    pub fn run(&self, request: &WorkerRequest) -> ServiceResult<WorkerOutput> {
        if let Some(worker) = self.worker_for(request) {
            match worker
                .submit(request, self.timeout)
                .and_then(WorkerResponse::into_output)
            {
                Ok(output) => {
                    debug!(kind = %worker.kind(), bytes = output.bytes.len(), "Worker finished");
                    return Ok(output);
                }
                Err(e) => warn!("{} failed, using main thread: {}", worker.kind(), e),
            }
        }
        self.inline.execute(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ImageCrateCodec;
    use crate::services::{Bitmap, ImageFormat};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    struct ScriptedWorker {
        reply: Result<WorkerResponse, WorkerError>,
        calls: Cell<usize>,
    }

    impl Worker for ScriptedWorker {
        fn kind(&self) -> WorkerKind {
            WorkerKind::Resize
        }

        fn submit(
            &self,
            _request: &WorkerRequest,
            _timeout: Duration,
        ) -> Result<WorkerResponse, WorkerError> {
            self.calls.set(self.calls.get() + 1);
            self.reply.clone()
        }
    }

    struct CountingInline {
        calls: Cell<usize>,
    }

    impl InlineExecutor for CountingInline {
        fn execute(&self, _request: &WorkerRequest) -> ServiceResult<WorkerOutput> {
            self.calls.set(self.calls.get() + 1);
            Ok(WorkerOutput {
                bytes: b"inline".to_vec(),
                width: 1,
                height: 1,
            })
        }
    }

    fn config(min_bytes: u64) -> WorkerConfig {
        WorkerConfig {
            timeout_ms: 10,
            offload_min_bytes: min_bytes,
        }
    }

    fn resize_request(len: usize) -> WorkerRequest {
        WorkerRequest::Resize {
            payload: vec![0; len],
            width: Some(10),
            height: None,
            quality: 0.8,
        }
    }

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_value(WorkerRequest::RenderPage {
            data: vec![1],
            scale: 1.5,
            page_number: 2,
        })
        .unwrap();
        assert_eq!(json["type"], "renderPage");
        assert_eq!(json["pageNumber"], 2);

        let parsed: WorkerRequest = serde_json::from_str(
            r#"{"type":"resize","payload":[1,2],"width":100,"height":null,"quality":0.5}"#,
        )
        .unwrap();
        assert_eq!(parsed.kind(), WorkerKind::Resize);
        assert_eq!(parsed.payload_len(), 2);
    }

    #[test]
    fn test_failed_response_parses() {
        let response: WorkerResponse =
            serde_json::from_str(r#"{"success":false,"error":"boom"}"#).unwrap();
        assert_eq!(
            response.into_output(),
            Err(WorkerError::Failed("boom".into()))
        );
    }

    #[test]
    fn test_large_payload_uses_worker() {
        let worker = ScriptedWorker {
            reply: Ok(WorkerResponse::ok(WorkerOutput {
                bytes: b"worker".to_vec(),
                width: 2,
                height: 2,
            })),
            calls: Cell::new(0),
        };
        let inline = CountingInline { calls: Cell::new(0) };
        let offload = Offload::new(&inline, &config(4)).with_worker(&worker);

        let out = offload.run(&resize_request(8)).unwrap();
        assert_eq!(out.bytes, b"worker".to_vec());
        assert_eq!(inline.calls.get(), 0);
    }

    #[test]
    fn test_small_payload_stays_inline() {
        let worker = ScriptedWorker {
            reply: Err(WorkerError::Disconnected(WorkerKind::Resize)),
            calls: Cell::new(0),
        };
        let inline = CountingInline { calls: Cell::new(0) };
        let offload = Offload::new(&inline, &config(1024)).with_worker(&worker);

        offload.run(&resize_request(8)).unwrap();
        assert_eq!(worker.calls.get(), 0);
        assert_eq!(inline.calls.get(), 1);
    }

    #[test]
    fn test_worker_timeout_falls_back_once() {
        let worker = ScriptedWorker {
            reply: Err(WorkerError::Timeout(
                WorkerKind::Resize,
                Duration::from_millis(10),
            )),
            calls: Cell::new(0),
        };
        let inline = CountingInline { calls: Cell::new(0) };
        let offload = Offload::new(&inline, &config(0)).with_worker(&worker);

        let out = offload.run(&resize_request(8)).unwrap();
        assert_eq!(out.bytes, b"inline".to_vec());
        assert_eq!(worker.calls.get(), 1);
        assert_eq!(inline.calls.get(), 1);
    }

    #[test]
    fn test_inline_resize_and_missing_renderer() {
        let codec = ImageCrateCodec;
        let png = codec
            .encode(&Bitmap::solid(20, 10, [5, 5, 5, 255]), ImageFormat::Png, 100)
            .unwrap();
        let inline = InlineWorker {
            codec: &codec,
            renderer: None,
        };

        let out = inline
            .execute(&WorkerRequest::Resize {
                payload: png,
                width: Some(4),
                height: None,
                quality: 0.7,
            })
            .unwrap();
        assert_eq!((out.width, out.height), (4, 2));

        let err = inline
            .execute(&WorkerRequest::RenderPage {
                data: vec![],
                scale: 1.0,
                page_number: 1,
            })
            .unwrap_err();
        assert_eq!(err, CollaboratorError::Unavailable("Page renderer"));
    }
}
