//! In-browser camera QR scanner.
//!
//! Wires a camera stream to an `rqrr` decoder and writes results into the
//! page. The lifecycle and scan loop live in [`session`] and only talk to
//! the outside world through traits ([`camera::Camera`], [`decode::Decoder`],
//! [`schedule::Scheduler`], [`surface::Surface`]), so they run and test
//! natively. The `web` module (wasm32 only) implements those traits with
//! `getUserMedia`, a canvas, `requestAnimationFrame`/`setTimeout` and the
//! DOM, and exports the `QrScanner` class to JavaScript.
//!
//! ```js
//! import init, { mount } from './qr_scanner.js';
//! await init();
//! const scanner = mount('{"cooldown_ms": 1500}');
//! ```

pub mod camera;
pub mod config;
pub mod decode;
pub mod error;
pub mod schedule;
pub mod session;
pub mod surface;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use camera::{Camera, CameraStream, FacingMode, Frame, StreamRequest};
pub use config::ScannerConfig;
pub use decode::{Decoder, RqrrDecoder, Strategy, decode_qr_frame};
pub use error::{CameraError, ConfigError, ScheduleError};
pub use schedule::{Delay, Scheduler, Ticket};
pub use session::{ScanSession, SessionState, SessionStats, start_session};
pub use surface::{Controls, Surface};
