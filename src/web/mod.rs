//! Browser bindings: the `QrScanner` class exported to JavaScript.
//!
//! ```js
//! const scanner = new QrScanner('{}');   // binds #video, #startButton, ...
//! scanner.bindControls();                // click → start / stop
//! await scanner.start();                 // or drive it from your own UI
//! scanner.stop();
//! ```

mod camera;
mod scheduler;
mod surface;

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Event, HtmlButtonElement, HtmlElement, HtmlVideoElement};

pub use camera::{BrowserCamera, BrowserStream};
pub use scheduler::FrameScheduler;
pub use surface::DomSurface;

use crate::config::ScannerConfig;
use crate::decode::RqrrDecoder;
use crate::session::{ScanSession, start_session};

pub type BrowserSession = ScanSession<BrowserStream, RqrrDecoder, FrameScheduler, DomSurface>;

/// Install the panic hook and route `tracing` output to the devtools console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
}

#[wasm_bindgen]
pub struct QrScanner {
    session: Rc<RefCell<BrowserSession>>,
    camera: Rc<BrowserCamera>,
    start_button: HtmlButtonElement,
    stop_button: HtmlButtonElement,
}

#[wasm_bindgen]
impl QrScanner {
    /// Look up the configured elements and build an idle scanner.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<QrScanner, JsValue> {
        let config =
            ScannerConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?;

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;

        let ids = &config.elements;
        let video: HtmlVideoElement = element_by_id(&document, &ids.video)?;
        let start_button: HtmlButtonElement = element_by_id(&document, &ids.start_button)?;
        let stop_button: HtmlButtonElement = element_by_id(&document, &ids.stop_button)?;
        let result: HtmlElement = element_by_id(&document, &ids.result)?;

        let surface = DomSurface::new(start_button.clone(), stop_button.clone(), result);
        let decoder = RqrrDecoder::new(config.strategies.clone());
        let session = Rc::new_cyclic(|weak| {
            let scheduler = FrameScheduler::new(window.clone(), weak.clone());
            RefCell::new(ScanSession::new(&config, decoder, scheduler, surface))
        });

        tracing::info!(facing = ?config.facing_mode, cooldown_ms = config.cooldown_ms, "scanner ready");
        Ok(QrScanner {
            session,
            camera: Rc::new(BrowserCamera::new(video)),
            start_button,
            stop_button,
        })
    }

    /// Request the camera and begin scanning. Resolves to the resulting
    /// state name ("active" on success, "idle" after a camera error).
    pub fn start(&self) -> js_sys::Promise {
        let session = Rc::clone(&self.session);
        let camera = Rc::clone(&self.camera);
        wasm_bindgen_futures::future_to_promise(async move {
            start_session(&*session, camera.as_ref()).await;
            let state = session.borrow().state();
            Ok(JsValue::from_str(state.as_str()))
        })
    }

    pub fn stop(&self) {
        self.session.borrow_mut().stop();
    }

    pub fn state(&self) -> String {
        self.session.borrow().state().as_str().to_string()
    }

    /// Scan counters as JSON.
    pub fn stats(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.session.borrow().stats())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Attach click listeners to the start and stop buttons. The listeners
    /// live for the rest of the page.
    #[wasm_bindgen(js_name = bindControls)]
    pub fn bind_controls(&self) -> Result<(), JsValue> {
        let session = Rc::clone(&self.session);
        let camera = Rc::clone(&self.camera);
        let on_start = Closure::wrap(Box::new(move |_event: Event| {
            let session = Rc::clone(&session);
            let camera = Rc::clone(&camera);
            wasm_bindgen_futures::spawn_local(async move {
                start_session(&*session, camera.as_ref()).await;
            });
        }) as Box<dyn FnMut(_)>);
        self.start_button
            .add_event_listener_with_callback("click", on_start.as_ref().unchecked_ref())?;
        on_start.forget();

        let session = Rc::clone(&self.session);
        let on_stop = Closure::wrap(Box::new(move |_event: Event| {
            session.borrow_mut().stop();
        }) as Box<dyn FnMut(_)>);
        self.stop_button
            .add_event_listener_with_callback("click", on_stop.as_ref().unchecked_ref())?;
        on_stop.forget();

        Ok(())
    }
}

/// Build a scanner and bind its buttons in one call.
#[wasm_bindgen]
pub fn mount(config_json: &str) -> Result<QrScanner, JsValue> {
    let scanner = QrScanner::new(config_json)?;
    scanner.bind_controls()?;
    Ok(scanner)
}

fn element_by_id<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("element #{} not found", id)))?
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("element #{} has the wrong type", id)))
}
