// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR rendering: proof payload bytes to a module matrix and grey pixels.

use certitrust_core::error::{CertiTrustError, Result};
use image::{GrayImage, Luma};
use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode};
use tracing::debug;

/// Light modules around the symbol, as required by ISO/IEC 18004.
pub const QUIET_ZONE: usize = 4;

const DARK: u8 = 0;
const LIGHT: u8 = 255;

/// A rendered QR symbol at error-correction level M.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    dark: Vec<bool>,
}

impl QrMatrix {
    /// Encode `payload` as a QR symbol.
    ///
    /// Fails with `ProofTooLarge` when the payload does not fit in any QR
    /// version at level M.
    pub fn encode(payload: &[u8]) -> Result<Self> {
        let code = QrCode::with_error_correction_level(payload, EcLevel::M).map_err(|err| match err {
            QrError::DataTooLong => CertiTrustError::ProofTooLarge(format!(
                "{} bytes do not fit in a QR code at level M",
                payload.len()
            )),
            other => CertiTrustError::ProofTooLarge(format!("QR encoding failed: {other}")),
        })?;

        let width = code.width();
        let dark = code.to_colors().into_iter().map(|c| c == Color::Dark).collect();
        debug!(payload_len = payload.len(), modules = width, "QR symbol rendered");
        Ok(Self { width, dark })
    }

    /// Modules per side, excluding the quiet zone.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.dark[y * self.width + x]
    }

    /// Pixels per side of [`QrMatrix::to_gray_pixels`].
    pub fn side_with_quiet_zone(&self) -> usize {
        self.width + 2 * QUIET_ZONE
    }

    /// Row-major 8-bit grey samples, one per module, quiet zone included.
    /// This is the exact sample data of the stamped image XObject.
    pub fn to_gray_pixels(&self) -> Vec<u8> {
        let side = self.side_with_quiet_zone();
        let mut pixels = vec![LIGHT; side * side];
        for y in 0..self.width {
            for x in 0..self.width {
                if self.is_dark(x, y) {
                    pixels[(y + QUIET_ZONE) * side + x + QUIET_ZONE] = DARK;
                }
            }
        }
        pixels
    }

    /// Raster image with `scale` pixels per module, quiet zone included.
    pub fn to_image(&self, scale: u32) -> GrayImage {
        let scale = scale.max(1);
        let side = self.side_with_quiet_zone() as u32;
        let pixels = self.to_gray_pixels();
        GrayImage::from_fn(side * scale, side * scale, |x, y| {
            let (mx, my) = ((x / scale) as usize, (y / scale) as usize);
            Luma([pixels[my * side as usize + mx]])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payload_uses_small_symbol() {
        let qr = QrMatrix::encode(b"hello").unwrap();
        assert_eq!(qr.width(), 21);
        assert_eq!(qr.side_with_quiet_zone(), 29);
        assert_eq!(qr.to_gray_pixels().len(), 29 * 29);
    }

    #[test]
    fn finder_pattern_corner_is_dark() {
        let qr = QrMatrix::encode(&[0xA5; 120]).unwrap();
        assert!(qr.is_dark(0, 0));
        assert!(qr.is_dark(qr.width() - 1, 0));
        assert!(!qr.is_dark(qr.width(), 0));

        let pixels = qr.to_gray_pixels();
        let side = qr.side_with_quiet_zone();
        assert_eq!(pixels[0], LIGHT);
        assert_eq!(pixels[QUIET_ZONE * side + QUIET_ZONE], DARK);
    }

    #[test]
    fn rendering_is_deterministic() {
        let payload = vec![7u8; 300];
        assert_eq!(QrMatrix::encode(&payload).unwrap(), QrMatrix::encode(&payload).unwrap());
    }

    #[test]
    fn oversized_payload_is_too_large() {
        let err = QrMatrix::encode(&vec![0x42; 4000]).unwrap_err();
        assert!(matches!(err, CertiTrustError::ProofTooLarge(_)));
    }

    #[test]
    fn image_scales_modules() {
        let qr = QrMatrix::encode(b"scale").unwrap();
        let img = qr.to_image(3);
        assert_eq!(img.width(), 29 * 3);
        let q = (QUIET_ZONE * 3) as u32;
        assert_eq!(img.get_pixel(q, q).0[0], DARK);
        assert_eq!(img.get_pixel(0, 0).0[0], LIGHT);
    }
}
