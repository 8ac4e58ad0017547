//! `getUserMedia` camera and canvas frame capture.

use js_sys::{Object, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    CanvasRenderingContext2d, DomException, HtmlCanvasElement, HtmlVideoElement, MediaStream,
    MediaStreamConstraints, MediaStreamTrack,
};

use crate::camera::{Camera, CameraStream, FacingMode, Frame, StreamRequest};
use crate::error::CameraError;

/// Opens camera streams for a shared `<video>` element.
pub struct BrowserCamera {
    video: HtmlVideoElement,
}

impl BrowserCamera {
    pub fn new(video: HtmlVideoElement) -> Self {
        Self { video }
    }

    /// `{ video: { facingMode }, audio: false }`
    fn constraints(facing: FacingMode) -> Result<MediaStreamConstraints, JsValue> {
        let video = Object::new();
        Reflect::set(&video, &"facingMode".into(), &facing.as_constraint().into())?;
        let constraints = Object::new();
        Reflect::set(&constraints, &"video".into(), &video)?;
        Reflect::set(&constraints, &"audio".into(), &JsValue::FALSE)?;
        Ok(constraints.unchecked_into())
    }

    async fn acquire(&self, facing: FacingMode) -> Result<MediaStream, CameraError> {
        let window = web_sys::window().ok_or(CameraError::Unsupported)?;
        // Undefined outside secure contexts.
        let devices = window
            .navigator()
            .media_devices()
            .map_err(|_| CameraError::Unsupported)?;
        let constraints =
            Self::constraints(facing).map_err(|e| CameraError::Other(describe(&e)))?;
        let promise = devices
            .get_user_media_with_constraints(&constraints)
            .map_err(camera_error)?;
        let stream = JsFuture::from(promise).await.map_err(camera_error)?;
        stream
            .dyn_into::<MediaStream>()
            .map_err(|_| CameraError::Other("getUserMedia did not return a MediaStream".into()))
    }
}

impl Camera for BrowserCamera {
    type Stream = BrowserStream;

    async fn open(&self, request: &StreamRequest) -> Result<BrowserStream, CameraError> {
        let stream = self.acquire(request.facing).await?;
        match BrowserStream::new(stream.clone(), self.video.clone()) {
            Ok(handle) => {
                tracing::debug!(tracks = stream.get_tracks().length(), "camera stream acquired");
                Ok(handle)
            }
            Err(err) => {
                stop_tracks(&stream);
                Err(err)
            }
        }
    }
}

/// An acquired stream plus the offscreen canvas frames are read from.
///
/// Every stream targets the same `<video>`, so a stream only touches
/// `srcObject` while it is the one being shown.
pub struct BrowserStream {
    stream: MediaStream,
    video: HtmlVideoElement,
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    released: bool,
}

impl BrowserStream {
    fn new(stream: MediaStream, video: HtmlVideoElement) -> Result<Self, CameraError> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or(CameraError::Unsupported)?;
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(|e| CameraError::Other(describe(&e)))?
            .unchecked_into();
        let context = canvas
            .get_context("2d")
            .map_err(|e| CameraError::Other(describe(&e)))?
            .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
            .ok_or_else(|| CameraError::Other("2d canvas context unavailable".into()))?;
        Ok(Self { stream, video, canvas, context, released: false })
    }
}

impl BrowserStream {
    fn is_displayed(&self) -> bool {
        self.video
            .src_object()
            .is_some_and(|current| Object::is(&current, &self.stream))
    }
}

impl CameraStream for BrowserStream {
    async fn attach(&mut self) -> Result<(), CameraError> {
        self.video.set_src_object(Some(&self.stream));
        let promise = self
            .video
            .play()
            .map_err(|e| CameraError::Playback(describe(&e)))?;
        JsFuture::from(promise)
            .await
            .map_err(|e| CameraError::Playback(describe(&e)))?;
        tracing::debug!("camera stream playing");
        Ok(())
    }

    fn capture(&mut self) -> Option<Frame> {
        let (w, h) = (self.video.video_width(), self.video.video_height());
        if w == 0 || h == 0 || !self.is_displayed() {
            return None;
        }
        if self.canvas.width() != w || self.canvas.height() != h {
            self.canvas.set_width(w);
            self.canvas.set_height(h);
        }

        let (fw, fh) = (f64::from(w), f64::from(h));
        if let Err(err) = self
            .context
            .draw_image_with_html_video_element_and_dw_and_dh(&self.video, 0.0, 0.0, fw, fh)
        {
            tracing::trace!(error = %describe(&err), "drawImage failed");
            return None;
        }
        let image = self.context.get_image_data(0.0, 0.0, fw, fh).ok()?;
        Frame::new(image.data().0, w as usize, h as usize)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        stop_tracks(&self.stream);
        if self.is_displayed() {
            self.video.set_src_object(None);
        }
        self.released = true;
    }
}

impl Drop for BrowserStream {
    fn drop(&mut self) {
        self.release();
    }
}

fn stop_tracks(stream: &MediaStream) {
    for track in stream.get_tracks().iter() {
        if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
            track.stop();
        }
    }
}

fn camera_error(err: JsValue) -> CameraError {
    if let Some(dom) = err.dyn_ref::<DomException>() {
        return CameraError::from_dom_name(&dom.name(), &dom.message());
    }
    if let Some(js) = err.dyn_ref::<js_sys::Error>() {
        return CameraError::from_dom_name(&String::from(js.name()), &String::from(js.message()));
    }
    CameraError::Other(describe(&err))
}

fn describe(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}
