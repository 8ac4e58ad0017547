use web_sys::{HtmlButtonElement, HtmlElement};

use crate::surface::{Controls, Surface};

/// Start/stop buttons and the result text element.
pub struct DomSurface {
    start: HtmlButtonElement,
    stop: HtmlButtonElement,
    result: HtmlElement,
}

impl DomSurface {
    pub fn new(start: HtmlButtonElement, stop: HtmlButtonElement, result: HtmlElement) -> Self {
        Self { start, stop, result }
    }
}

impl Surface for DomSurface {
    fn set_controls(&mut self, controls: Controls) {
        self.start.set_disabled(!controls.start_enabled);
        self.stop.set_disabled(!controls.stop_enabled);
    }

    fn show(&mut self, message: &str) {
        self.result.set_text_content(Some(message));
    }
}
