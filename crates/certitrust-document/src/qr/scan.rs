// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan cleanup ahead of QR detection: denoising and binarization for
// photographed or scanned pages, where uneven lighting defeats a single
// global threshold.

use image::{GrayImage, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::{box_filter, gaussian_blur_f32};
use imageproc::map::map_colors2;
use tracing::{debug, instrument};

/// Local-mean threshold window radius, in pixels.
pub const DEFAULT_BLOCK_RADIUS: u32 = 15;
/// Offset subtracted from the local mean.
pub const DEFAULT_OFFSET: i32 = 10;

/// Light Gaussian denoise (sigma 1.0); enough to remove sensor grain
/// without merging adjacent QR modules.
pub fn denoise(gray: &GrayImage) -> GrayImage {
    gaussian_blur_f32(gray, 1.0)
}

/// Adaptive thresholding: each pixel is compared with the box-filtered mean
/// of its `block_radius` neighbourhood minus `c`. Darker pixels become black.
#[instrument(skip(gray), fields(width = gray.width(), height = gray.height()))]
pub fn binarize_adaptive(gray: &GrayImage, block_radius: u32, c: i32) -> GrayImage {
    let local_mean = box_filter(gray, block_radius, block_radius);
    let output = map_colors2(gray, &local_mean, |pixel, mean| {
        let cut = i32::from(mean[0]) - c;
        Luma([if i32::from(pixel[0]) < cut { 0 } else { 255 }])
    });

    debug!("adaptive binarization complete");
    output
}

/// Global binarization at the Otsu level.
pub fn binarize_otsu(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    debug!(level, "Otsu level computed");
    threshold(gray, level, ThresholdType::Binary)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dark square on a background that brightens left to right, as a
    /// badly lit photograph would.
    fn gradient_with_square() -> GrayImage {
        GrayImage::from_fn(80, 80, |x, y| {
            let background = 120 + (x as u8);
            if (30..50).contains(&x) && (30..50).contains(&y) {
                Luma([background.saturating_sub(90)])
            } else {
                Luma([background])
            }
        })
    }

    #[test]
    fn adaptive_separates_square_from_gradient() {
        let out = binarize_adaptive(&gradient_with_square(), DEFAULT_BLOCK_RADIUS, DEFAULT_OFFSET);
        assert_eq!(out.get_pixel(40, 40).0[0], 0);
        assert_eq!(out.get_pixel(5, 5).0[0], 255);
        assert_eq!(out.get_pixel(75, 75).0[0], 255);
    }

    #[test]
    fn otsu_splits_bimodal_image() {
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 20 } else { 230 }]));
        let out = binarize_otsu(&img);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(9, 0).0[0], 255);
    }

    #[test]
    fn empty_image_does_not_panic() {
        let empty = GrayImage::new(0, 0);
        assert_eq!(binarize_adaptive(&empty, 15, 10).dimensions(), (0, 0));
        assert_eq!(binarize_otsu(&empty).dimensions(), (0, 0));
    }

    #[test]
    fn flat_page_stays_white() {
        let page = GrayImage::from_pixel(40, 40, Luma([200]));
        let out = binarize_adaptive(&page, DEFAULT_BLOCK_RADIUS, DEFAULT_OFFSET);
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn otsu_keeps_image_dimensions() {
        let img = GrayImage::from_fn(7, 3, |x, y| Luma([((x * 30 + y * 10) % 256) as u8]));
        assert_eq!(binarize_otsu(&img).dimensions(), (7, 3));
    }
}
