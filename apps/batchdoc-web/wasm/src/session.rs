//! Stateful batch session exposed to JavaScript
//!
//! All file state lives in Rust; JavaScript only forwards DOM events, file
//! bytes and timer ticks, and shows what the session returns.

use crate::host::{js_message, JsClock, JsHeic, JsOcr, JsProgress, JsRenderer, ObjectUrlAllocator};
use batchdoc_core::{
    HandleAllocator, ImageCrateCodec, IncomingFile, InlineWorker, Mode, PageRenderer, RunConfig,
    RunReport, Services, Session, SessionConfig,
};
use batchdoc_core::{Clock, HeicDecoder};
use js_sys::{Array, Function, Reflect, Uint8Array};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Stateful session holding every uploaded file in Rust memory
#[wasm_bindgen]
pub struct BatchSession {
    inner: Session<ObjectUrlAllocator, JsClock>,
    run_config: RunConfig,
    progress_callback: Option<Function>,
    ocr: Option<JsOcr>,
    heic: Option<JsHeic>,
    renderer: Option<JsRenderer>,
}

#[wasm_bindgen]
impl BatchSession {
    /// Create a session in `mode` with default limits
    #[wasm_bindgen(constructor)]
    pub fn new(mode: &str) -> Result<BatchSession, JsValue> {
        Self::build(mode, SessionConfig::default())
    }

    /// Create a session from a configuration object (same shape as the TOML file)
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(mode: &str, config: JsValue) -> Result<BatchSession, JsValue> {
        let config: SessionConfig = serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsValue::from_str(&format!("Invalid configuration: {}", e)))?;
        config
            .validate()
            .map_err(|e| JsValue::from_str(&format!("{:#}", e)))?;
        Self::build(mode, config)
    }

    fn build(mode: &str, config: SessionConfig) -> Result<BatchSession, JsValue> {
        let mode = parse_mode(mode)?;
        let mut inner = Session::with_clock(config, ObjectUrlAllocator::default(), JsClock);
        inner.set_mode(mode);
        Ok(Self {
            inner,
            run_config: RunConfig::default(),
            progress_callback: None,
            ocr: None,
            heic: None,
            renderer: None,
        })
    }

    #[wasm_bindgen(getter)]
    pub fn mode(&self) -> String {
        self.inner.mode().to_string()
    }

    #[wasm_bindgen(js_name = setMode)]
    pub fn set_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        self.inner.set_mode(parse_mode(mode)?);
        Ok(())
    }

    /// `accept` attribute for the file input
    #[wasm_bindgen(js_name = acceptHint)]
    pub fn accept_hint(&self) -> String {
        self.inner.mode().accept_hint().to_string()
    }

    #[wasm_bindgen(js_name = uploadPrompt)]
    pub fn upload_prompt(&self) -> String {
        self.inner.mode().upload_prompt().to_string()
    }

    /// Set a progress callback function
    /// Callback signature: (processed: number, total: number, label: string) => boolean | void
    #[wasm_bindgen(js_name = setProgressCallback)]
    pub fn set_progress_callback(&mut self, callback: Function) {
        self.progress_callback = Some(callback);
    }

    #[wasm_bindgen(js_name = setOcrCallback)]
    pub fn set_ocr_callback(&mut self, callback: Function) {
        self.ocr = Some(JsOcr(callback));
    }

    #[wasm_bindgen(js_name = setHeicCallback)]
    pub fn set_heic_callback(&mut self, callback: Function) {
        self.heic = Some(JsHeic(callback));
    }

    #[wasm_bindgen(js_name = setRendererCallback)]
    pub fn set_renderer_callback(&mut self, callback: Function) {
        self.renderer = Some(JsRenderer(callback));
    }

    /// Options for the next run, as a plain object
    #[wasm_bindgen(js_name = setRunConfig)]
    pub fn set_run_config(&mut self, config: JsValue) -> Result<(), JsValue> {
        self.run_config = serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsValue::from_str(&format!("Invalid run options: {}", e)))?;
        Ok(())
    }

    /// Options for the next run, as JSON text
    #[wasm_bindgen(js_name = setRunConfigJson)]
    pub fn set_run_config_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.run_config = serde_json::from_str(json)
            .map_err(|e| JsValue::from_str(&format!("Invalid run options: {}", e)))?;
        Ok(())
    }

    /// Validate and append files: `[{ name, type, bytes: Uint8Array }]`.
    /// Returns the ingest report.
    #[wasm_bindgen(js_name = addFiles)]
    pub fn add_files(&mut self, files: Array) -> Result<JsValue, JsValue> {
        let incoming = files
            .iter()
            .map(|file| read_upload(&file))
            .collect::<Result<Vec<_>, _>>()?;

        let heic = self.heic.as_ref().map(|h| h as &dyn HeicDecoder);
        let report = self
            .inner
            .ingest(incoming, heic)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        to_js(&report)
    }

    #[wasm_bindgen(js_name = removeFile)]
    pub fn remove_file(&mut self, index: usize) -> Result<(), JsValue> {
        self.inner
            .remove_at(index)
            .map(|_| ())
            .ok_or_else(|| JsValue::from_str("File index out of bounds"))
    }

    #[wasm_bindgen(js_name = removeSelected)]
    pub fn remove_selected(&mut self) -> usize {
        self.inner.remove_selected()
    }

    /// `order` lists current indices in their new positions
    #[wasm_bindgen(js_name = reorderFiles)]
    pub fn reorder_files(&mut self, order: &[usize]) -> Result<(), JsValue> {
        self.inner
            .reorder(order)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    #[wasm_bindgen(js_name = toggleSelection)]
    pub fn toggle_selection(&mut self, index: usize) {
        self.inner.toggle(index);
    }

    #[wasm_bindgen(js_name = selectAll)]
    pub fn select_all(&mut self) {
        self.inner.select_all();
    }

    #[wasm_bindgen(js_name = deselectAll)]
    pub fn deselect_all(&mut self) {
        self.inner.deselect_all();
    }

    #[wasm_bindgen(js_name = invertSelection)]
    pub fn invert_selection(&mut self) {
        self.inner.invert_selection();
    }

    #[wasm_bindgen(js_name = canRestoreSelection)]
    pub fn can_restore_selection(&self) -> bool {
        self.inner.snapshots().can_restore()
    }

    #[wasm_bindgen(js_name = restoreSelection)]
    pub fn restore_selection(&mut self) -> usize {
        self.inner.restore_selection()
    }

    #[wasm_bindgen(js_name = getFileCount)]
    pub fn get_file_count(&self) -> usize {
        self.inner.len()
    }

    #[wasm_bindgen(js_name = getFileInfos)]
    pub fn get_file_infos(&self) -> Result<JsValue, JsValue> {
        to_js(&file_infos(&self.inner))
    }

    #[wasm_bindgen(js_name = getMemoryUsage)]
    pub fn get_memory_usage(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.memory_usage())
    }

    /// Object URL for a tile, created on first request
    #[wasm_bindgen(js_name = previewUrl)]
    pub fn preview_url(&mut self, index: usize) -> Result<Option<String>, JsValue> {
        self.inner
            .preview_handle(index)
            .map(|handle| handle.map(|h| h.0))
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Encoded first-page thumbnail of a PDF slot
    #[wasm_bindgen(js_name = pdfPreview)]
    pub fn pdf_preview(&mut self, index: usize) -> Result<Option<Uint8Array>, JsValue> {
        let inline = InlineWorker {
            codec: &ImageCrateCodec,
            renderer: self.renderer.as_ref().map(|r| r as &dyn PageRenderer),
        };
        let offload = self.inner.offload(&inline);
        let page = self
            .inner
            .pdf_preview(index, &offload)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(page.map(|p| Uint8Array::from(p.image_bytes.as_slice())))
    }

    /// Range of tiles to render, or `undefined` when unchanged
    #[wasm_bindgen(js_name = onScroll)]
    pub fn on_scroll(&mut self, scroll_offset: f64) -> Result<JsValue, JsValue> {
        to_js(&self.inner.on_scroll(scroll_offset))
    }

    #[wasm_bindgen(js_name = onResize)]
    pub fn on_resize(&mut self, width: f64, height: f64) -> Result<JsValue, JsValue> {
        to_js(&self.inner.on_resize(width, height))
    }

    #[wasm_bindgen(js_name = viewportHeight)]
    pub fn viewport_height(&self) -> f64 {
        self.inner.viewport().total_height()
    }

    /// Notice to display now, if any; call from a timer
    pub fn notice(&mut self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.notice())
    }

    #[wasm_bindgen(js_name = dismissNotice)]
    pub fn dismiss_notice(&mut self) {
        self.inner.dismiss_notice();
    }

    #[wasm_bindgen(js_name = dismissAllNotices)]
    pub fn dismiss_all_notices(&mut self) {
        self.inner.dismiss_all_notices();
    }

    /// Run the active mode over the selection (or all files)
    pub fn run(&mut self) -> Result<JsValue, JsValue> {
        let mut services = Services::builtin();
        if let Some(ocr) = &self.ocr {
            services = services.with_ocr(ocr);
        }
        if let Some(heic) = &self.heic {
            services = services.with_heic(heic);
        }
        if let Some(renderer) = &self.renderer {
            services = services.with_renderer(renderer);
        }

        let mut progress = JsProgress::new(self.progress_callback.as_ref());
        let report = self
            .inner
            .run(&self.run_config, services, &mut progress)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        to_js(&RunSummary::from(&report))
    }
}

fn parse_mode(mode: &str) -> Result<Mode, JsValue> {
    mode.parse::<Mode>().map_err(|e| JsValue::from_str(&e))
}

fn read_upload(file: &JsValue) -> Result<IncomingFile, JsValue> {
    let field = |name: &str| Reflect::get(file, &JsValue::from_str(name));
    let name = field("name")?
        .as_string()
        .ok_or_else(|| JsValue::from_str("Upload is missing a name"))?;
    let mime = field("type")?.as_string().unwrap_or_default();
    let bytes = field("bytes")?;
    if !bytes.is_instance_of::<Uint8Array>() {
        return Err(JsValue::from_str(&format!(
            "Upload {} has no byte payload: {}",
            name,
            js_message(&bytes)
        )));
    }
    Ok(IncomingFile::new(name, mime, Uint8Array::new(&bytes).to_vec()))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// File info for JS serialization
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfoJs {
    pub name: String,
    pub mime: String,
    pub size_bytes: u64,
    pub size_label: String,
    pub selected: bool,
    pub is_pdf: bool,
}

pub fn file_infos<A: HandleAllocator, C: Clock>(session: &Session<A, C>) -> Vec<FileInfoJs> {
    let registry = session.registry();
    registry
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| FileInfoJs {
            name: entry.name().to_string(),
            mime: entry.declared_mime().to_string(),
            size_bytes: entry.size_bytes(),
            size_label: batchdoc_core::media::format_bytes(entry.size_bytes()),
            selected: registry.is_selected(i),
            is_pdf: entry.is_pdf(),
        })
        .collect()
}

/// What a run hands back to the page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub message: String,
    pub file_name: Option<String>,
    pub mime: Option<String>,
    /// Object URL of the artifact
    pub download_url: Option<String>,
    pub processed: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
    pub saved_bytes: Option<i64>,
    pub saved_percent: Option<f64>,
    pub restored: usize,
}

impl From<&RunReport> for RunSummary {
    fn from(report: &RunReport) -> Self {
        let outcome = &report.outcome;
        Self {
            message: outcome.message.clone(),
            file_name: outcome.artifact.as_ref().map(|a| a.file_name.clone()),
            mime: outcome.artifact.as_ref().map(|a| a.mime.clone()),
            download_url: report.download.as_ref().map(|h| h.0.clone()),
            processed: outcome.processed,
            skipped: outcome.skipped,
            warnings: outcome.warnings.clone(),
            saved_bytes: outcome.stats.map(|s| s.saved_bytes()),
            saved_percent: outcome.stats.map(|s| s.saved_percent()),
            restored: report.restored,
        }
    }
}
