//! Camera collaborator traits and the frame buffer handed to the decoder.

use serde::{Deserialize, Serialize};

use crate::error::CameraError;
use crate::schedule::Ticket;

/// Which physical camera to prefer when several are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera on phones and tablets.
    #[default]
    Environment,
    User,
}

impl FacingMode {
    /// Value for the `facingMode` media constraint.
    pub fn as_constraint(self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::User => "user",
        }
    }
}

/// A pending camera request issued by [`crate::session::ScanSession::begin_start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub facing: FacingMode,
    pub ticket: Ticket,
}

/// Acquires live camera streams.
///
/// `open` only acquires the device. The stream is not shown until
/// [`CameraStream::attach`] runs, which the session does only while the
/// request is still current.
pub trait Camera {
    type Stream: CameraStream;

    fn open(
        &self,
        request: &StreamRequest,
    ) -> impl Future<Output = Result<Self::Stream, CameraError>>;
}

/// An open camera stream. The session is its only owner.
pub trait CameraStream {
    /// Bind the stream to the display surface and start playback.
    /// On error the caller releases the stream.
    fn attach(&mut self) -> impl Future<Output = Result<(), CameraError>>;

    /// Grab the current video frame at native resolution.
    /// `None` while the video has no dimensions yet.
    fn capture(&mut self) -> Option<Frame>;

    /// Stop every track. Detaches the display only if it still shows this
    /// stream.
    fn release(&mut self);
}

/// One RGBA frame. Recreated for every scan attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    rgba: Vec<u8>,
    width: usize,
    height: usize,
}

impl Frame {
    /// Wrap an RGBA buffer. Returns `None` for zero dimensions or a buffer
    /// shorter than `width * height * 4`.
    pub fn new(rgba: Vec<u8>, width: usize, height: usize) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let needed = width.checked_mul(height)?.checked_mul(4)?;
        if rgba.len() < needed {
            return None;
        }
        Some(Self { rgba, width, height })
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}
