//! Browser-side collaborators
//!
//! Object URLs back file handles, `Date.now()` drives time, and page
//! rendering, OCR and HEIC decoding are delegated to JavaScript callbacks
//! registered on the session.

use batchdoc_core::error::CollaboratorError;
use batchdoc_core::services::ServiceResult;
use batchdoc_core::tracker::ReleaseError;
use batchdoc_core::{
    Clock, HandleAllocator, HandleId, HeicDecoder, OcrService, PageRenderer, ProgressSink,
    ProgressUpdate, RenderedPage,
};
use js_sys::{Array, Function, Reflect, Uint8Array};
use std::collections::HashSet;
use tracing::debug;
use wasm_bindgen::prelude::*;
use web_sys::{Blob, BlobPropertyBag, Url};

/// Milliseconds from `Date.now()`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsClock;

impl Clock for JsClock {
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}

/// Hands out `blob:` URLs and revokes them on release
#[derive(Debug, Default)]
pub struct ObjectUrlAllocator {
    live: HashSet<HandleId>,
}

impl ObjectUrlAllocator {
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl HandleAllocator for ObjectUrlAllocator {
    fn allocate(&mut self, payload: &[u8], mime: &str) -> Result<HandleId, CollaboratorError> {
        let parts = Array::of1(&Uint8Array::from(payload));
        let options = BlobPropertyBag::new();
        options.set_type(mime);

        let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)
            .map_err(|e| CollaboratorError::Handle(js_message(&e)))?;
        let url = Url::create_object_url_with_blob(&blob)
            .map_err(|e| CollaboratorError::Handle(js_message(&e)))?;

        debug!(url = %url, bytes = payload.len(), "Created object URL");
        let handle = HandleId(url);
        self.live.insert(handle.clone());
        Ok(handle)
    }

    fn release(&mut self, handle: &HandleId) -> Result<(), ReleaseError> {
        if !self.live.remove(handle) {
            return Err(ReleaseError::Unknown(handle.clone()));
        }
        Url::revoke_object_url(handle.as_str()).map_err(|e| ReleaseError::Host {
            handle: handle.clone(),
            message: js_message(&e),
        })
    }
}

/// Forwards progress to `(processed, total, label) => boolean | void`.
///
/// Returning `false` from the callback cancels the run at the next yield.
#[derive(Default)]
pub struct JsProgress<'a> {
    callback: Option<&'a Function>,
    cancelled: bool,
}

impl<'a> JsProgress<'a> {
    pub fn new(callback: Option<&'a Function>) -> Self {
        Self {
            callback,
            cancelled: false,
        }
    }
}

impl ProgressSink for JsProgress<'_> {
    fn report(&mut self, update: &ProgressUpdate) {
        let Some(callback) = self.callback else {
            return;
        };
        let result = callback.call3(
            &JsValue::null(),
            &JsValue::from(update.processed as u32),
            &JsValue::from(update.total as u32),
            &JsValue::from_str(&update.label),
        );
        if let Ok(value) = result {
            if value.as_bool() == Some(false) {
                self.cancelled = true;
            }
        }
    }

    fn cancel_requested(&self) -> bool {
        self.cancelled
    }
}

/// `(bytes, language) => string`
pub struct JsOcr(pub Function);

impl OcrService for JsOcr {
    fn recognize(&self, image_bytes: &[u8], language: &str) -> ServiceResult<String> {
        self.0
            .call2(
                &JsValue::null(),
                &Uint8Array::from(image_bytes),
                &JsValue::from_str(language),
            )
            .map_err(|e| CollaboratorError::Ocr(js_message(&e)))?
            .as_string()
            .ok_or_else(|| CollaboratorError::Ocr("callback did not return text".to_string()))
    }
}

/// `(bytes, quality) => Uint8Array[]`, one JPEG per contained image
pub struct JsHeic(pub Function);

impl HeicDecoder for JsHeic {
    fn to_jpeg(&self, bytes: &[u8], quality: f32) -> ServiceResult<Vec<Vec<u8>>> {
        let value = self
            .0
            .call2(
                &JsValue::null(),
                &Uint8Array::from(bytes),
                &JsValue::from_f64(quality as f64),
            )
            .map_err(|e| CollaboratorError::Codec(js_message(&e)))?;
        if !Array::is_array(&value) {
            return Err(CollaboratorError::Codec(
                "HEIC callback did not return an array".to_string(),
            ));
        }
        Ok(Array::from(&value)
            .iter()
            .map(|item| Uint8Array::new(&item).to_vec())
            .collect())
    }
}

/// `(bytes, pageNumber, scale) => { bytes, width, height }`
pub struct JsRenderer(pub Function);

impl PageRenderer for JsRenderer {
    fn render(&self, pdf_bytes: &[u8], page_number: u32, scale: f32) -> ServiceResult<RenderedPage> {
        let value = self
            .0
            .call3(
                &JsValue::null(),
                &Uint8Array::from(pdf_bytes),
                &JsValue::from(page_number),
                &JsValue::from_f64(scale as f64),
            )
            .map_err(|e| CollaboratorError::ParseFailure(js_message(&e)))?;

        let field = |name: &str| {
            Reflect::get(&value, &JsValue::from_str(name))
                .map_err(|e| CollaboratorError::ParseFailure(js_message(&e)))
        };
        let image_bytes = Uint8Array::new(&field("bytes")?).to_vec();
        let width = field("width")?.as_f64().unwrap_or(0.0) as u32;
        let height = field("height")?.as_f64().unwrap_or(0.0) as u32;

        Ok(RenderedPage {
            image_bytes,
            width,
            height,
        })
    }
}

/// Best-effort message from a thrown JS value
pub fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            Reflect::get(value, &JsValue::from_str("message"))
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", value))
}
