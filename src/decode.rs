//! QR decoding over `rqrr` with a small preprocessing cascade.
//!
//! The session treats the decoder as a black box: one RGBA frame in, an
//! optional payload out. [`RqrrDecoder`] converts the frame to greyscale once
//! and then tries each configured [`Strategy`] in order, returning on the
//! first grid that decodes. Raw greyscale handles well-lit codes; adaptive
//! threshold copes with uneven lighting and glare; a light blur removes
//! sensor noise and print texture.

use rqrr::PreparedImage;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::camera::Frame;

/// Decodes one frame. `None` means no code was found.
pub trait Decoder {
    fn decode(&mut self, frame: &Frame) -> Option<String>;
}

/// One preprocessing step in the decode cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Greyscale as captured.
    Raw,
    /// Local-mean threshold (block=15, bias=8).
    Adaptive,
    /// 5-tap Gaussian blur, one pass (σ≈1.5).
    Blur,
    /// White border padding for codes touching the frame edge.
    QuietZone,
    /// Global Otsu binarization.
    Otsu,
}

impl Strategy {
    pub fn default_cascade() -> Vec<Strategy> {
        vec![Strategy::Raw, Strategy::Adaptive, Strategy::Blur]
    }
}

/// Decoder backed by `rqrr`.
#[derive(Debug, Clone)]
pub struct RqrrDecoder {
    strategies: Vec<Strategy>,
}

impl Default for RqrrDecoder {
    fn default() -> Self {
        Self::new(Strategy::default_cascade())
    }
}

impl RqrrDecoder {
    pub fn new(strategies: Vec<Strategy>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    fn run(&self, grey: &GreyImage, strategy: Strategy) -> Option<String> {
        match strategy {
            Strategy::Raw => grey.detect(),
            Strategy::Adaptive => grey.adaptive_threshold(15, 8).detect(),
            Strategy::Blur => grey.blurred(1).detect(),
            Strategy::QuietZone => {
                let pad = (grey.width.min(grey.height) / 10).max(4);
                grey.with_quiet_zone(pad).detect()
            }
            Strategy::Otsu => grey.detect_binarized(grey.otsu_threshold()),
        }
    }
}

impl Decoder for RqrrDecoder {
    fn decode(&mut self, frame: &Frame) -> Option<String> {
        let grey = GreyImage::from_rgba(frame.rgba(), frame.width(), frame.height());
        self.strategies.iter().find_map(|&strategy| {
            let found = self.run(&grey, strategy);
            if found.is_some() {
                tracing::trace!(?strategy, "decode strategy matched");
            }
            found
        })
    }
}

/// Decode a QR code from raw RGBA pixel data with the default cascade.
///
/// Standalone export for callers that run their own capture loop (e.g. a
/// Web Worker). Returns the payload, or an empty string when nothing was
/// found or the buffer is shorter than `width * height * 4`.
#[wasm_bindgen]
pub fn decode_qr_frame(rgba: &[u8], width: usize, height: usize) -> String {
    Frame::new(rgba.to_vec(), width, height)
        .and_then(|frame| RqrrDecoder::default().decode(&frame))
        .unwrap_or_default()
}

// ── Greyscale buffer and preprocessing ────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct GreyImage {
    pixels: Vec<u8>,
    width: usize,
    height: usize,
}

impl GreyImage {
    /// BT.601 luminance in integer math: (77R + 150G + 29B) >> 8.
    fn from_rgba(rgba: &[u8], width: usize, height: usize) -> Self {
        let pixels = rgba
            .chunks_exact(4)
            .take(width * height)
            .map(|px| {
                let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
                ((77 * r + 150 * g + 29 * b) >> 8) as u8
            })
            .collect();
        Self { pixels, width, height }
    }

    fn at(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }

    fn detect(&self) -> Option<String> {
        let mut img = PreparedImage::prepare_from_greyscale(self.width, self.height, |x, y| {
            self.at(x, y)
        });
        img.detect_grids()
            .first()
            .and_then(|grid| grid.decode().ok())
            .map(|(_, content)| content)
    }

    /// Pixels at the threshold belong to the dark class.
    fn is_dark(&self, x: usize, y: usize, threshold: u8) -> bool {
        self.at(x, y) <= threshold
    }

    fn detect_binarized(&self, threshold: u8) -> Option<String> {
        let mut img = PreparedImage::prepare_from_bitmap(self.width, self.height, |x, y| {
            self.is_dark(x, y, threshold)
        });
        img.detect_grids()
            .first()
            .and_then(|grid| grid.decode().ok())
            .map(|(_, content)| content)
    }

    /// Separable [1, 4, 6, 4, 1] / 16 kernel, edges clamped.
    fn blurred(&self, passes: usize) -> Self {
        let (w, h) = (self.width, self.height);
        let mut current = self.pixels.clone();
        let mut temp = vec![0u8; w * h];

        let tap = |buf: &[u8], idx: usize, pos: usize, len: usize, stride: usize| -> u32 {
            let get = |offset: isize| {
                let p = pos as isize + offset;
                if p < 0 || p >= len as isize {
                    buf[idx] as u32
                } else {
                    buf[(idx as isize + offset * stride as isize) as usize] as u32
                }
            };
            (6 * get(0) + 4 * (get(-1) + get(1)) + get(-2) + get(2)) >> 4
        };

        for _ in 0..passes {
            for y in 0..h {
                for x in 0..w {
                    let idx = y * w + x;
                    temp[idx] = tap(&current[..], idx, x, w, 1) as u8;
                }
            }
            for y in 0..h {
                for x in 0..w {
                    let idx = y * w + x;
                    current[idx] = tap(&temp[..], idx, y, h, w) as u8;
                }
            }
        }

        Self { pixels: current, width: w, height: h }
    }

    /// Per-pixel threshold against the local mean over a
    /// `(2 * block + 1)²` window, computed from an integral image.
    fn adaptive_threshold(&self, block: usize, bias: i64) -> Self {
        let (w, h) = (self.width, self.height);
        let iw = w + 1;
        let mut integral = vec![0i64; iw * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0i64;
            for x in 0..w {
                row_sum += self.at(x, y) as i64;
                integral[(y + 1) * iw + (x + 1)] = row_sum + integral[y * iw + (x + 1)];
            }
        }

        let mut pixels = vec![0u8; w * h];
        for y in 0..h {
            let (y0, y1) = (y.saturating_sub(block), (y + block + 1).min(h));
            for x in 0..w {
                let (x0, x1) = (x.saturating_sub(block), (x + block + 1).min(w));
                let area = ((y1 - y0) * (x1 - x0)) as i64;
                let sum = integral[y1 * iw + x1] - integral[y0 * iw + x1]
                    - integral[y1 * iw + x0]
                    + integral[y0 * iw + x0];
                let dark = (self.at(x, y) as i64) < sum / area - bias;
                pixels[y * w + x] = if dark { 0 } else { 255 };
            }
        }
        Self { pixels, width: w, height: h }
    }

    fn with_quiet_zone(&self, pad: usize) -> Self {
        let nw = self.width + 2 * pad;
        let nh = self.height + 2 * pad;
        let mut pixels = vec![255u8; nw * nh];
        for (y, row) in self.pixels.chunks_exact(self.width).enumerate() {
            let start = (y + pad) * nw + pad;
            pixels[start..start + self.width].copy_from_slice(row);
        }
        Self { pixels, width: nw, height: nh }
    }

    /// Global threshold maximizing between-class variance.
    fn otsu_threshold(&self) -> u8 {
        let mut hist = [0u32; 256];
        for &p in &self.pixels {
            hist[p as usize] += 1;
        }

        let total = self.pixels.len() as f64;
        let sum_all: f64 = hist.iter().enumerate().map(|(i, &n)| i as f64 * n as f64).sum();

        let mut best = (0u8, 0.0f64);
        let mut weight_bg = 0.0f64;
        let mut sum_bg = 0.0f64;
        for (t, &count) in hist.iter().enumerate() {
            weight_bg += count as f64;
            if weight_bg == 0.0 {
                continue;
            }
            let weight_fg = total - weight_bg;
            if weight_fg == 0.0 {
                break;
            }
            sum_bg += t as f64 * count as f64;
            let mean_bg = sum_bg / weight_bg;
            let mean_fg = (sum_all - sum_bg) / weight_fg;
            let variance = weight_bg * weight_fg * (mean_bg - mean_fg).powi(2);
            if variance > best.1 {
                best = (t as u8, variance);
            }
        }
        best.0
    }
}
