//! WASM bindings for the batch document tool
//!
//! Session-based API: uploads, selection, previews and runs are all held in
//! Rust. JavaScript handles DOM events, file reading and downloads, and
//! supplies the collaborators the browser has and Rust does not (PDF page
//! rasterizing, OCR, HEIC decoding) as callbacks.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { BatchSession } from './pkg/batchdoc_wasm.js';
//!
//! await init();
//!
//! const session = new BatchSession("compress");
//! session.setProgressCallback((done, total, label) => updateUI(done, total, label));
//! const report = session.addFiles([{ name: file.name, type: file.type, bytes }]);
//! session.setRunConfig({ compress_quality: 0.6 });
//! const result = session.run();
//! download(result.downloadUrl, result.fileName);
//! ```

pub mod host;
pub mod session;

use batchdoc_core::validation::{check_size, classify, Verdict};
use batchdoc_core::{IncomingFile, Mode, SessionConfig};
use serde::Serialize;
use wasm_bindgen::prelude::*;

pub use host::{JsClock, ObjectUrlAllocator};
pub use session::BatchSession;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Mode names in menu order
#[wasm_bindgen]
pub fn modes() -> Vec<String> {
    Mode::ALL.iter().map(|m| m.to_string()).collect()
}

/// Outcome of checking a single file before upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCheck {
    pub accepted: bool,
    pub reason: Option<String>,
}

/// Run the upload gate for one file without a session
pub fn check_upload(name: &str, mime: &str, bytes: &[u8], mode: Mode) -> FileCheck {
    let file = IncomingFile::new(name, mime, bytes.to_vec());
    let max_file_bytes = SessionConfig::default().limits.max_file_bytes;
    let rejection = match classify(&file, mode) {
        Verdict::Reject(rejection) => Some(rejection),
        Verdict::Accept(_) => check_size(&file, max_file_bytes),
    };
    FileCheck {
        accepted: rejection.is_none(),
        reason: rejection.map(|r| r.reason),
    }
}

/// Quick validation of one file for `mode`
#[wasm_bindgen(js_name = checkFile)]
pub fn check_file(name: &str, mime: &str, bytes: &[u8], mode: &str) -> Result<JsValue, JsValue> {
    let mode: Mode = mode.parse().map_err(|e: String| JsValue::from_str(&e))?;
    serde_wasm_bindgen::to_value(&check_upload(name, mime, bytes, mode))
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Format bytes as human-readable string
#[wasm_bindgen]
pub fn format_bytes(bytes: f64) -> String {
    batchdoc_core::media::format_bytes(bytes.max(0.0) as u64)
}
