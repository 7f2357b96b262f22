use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use std::io::Cursor;
use tracing::warn;
use veridoc_core::DocumentKind;

use crate::config::EngineConfig;

/// Normalize raw document bytes (JPEG / PNG / WEBP / …) into OCR-ready PNG
/// bytes. Decode or encode failure degrades to returning the input
/// unchanged — preprocessing must never fail the pipeline.
pub fn prepare_for_ocr(data: &[u8], kind: DocumentKind, cfg: &EngineConfig) -> Vec<u8> {
    match try_prepare(data, kind, cfg) {
        Ok(png) => png,
        Err(e) => {
            warn!(error = %e, "preprocess fell back to raw input");
            data.to_vec()
        }
    }
}

fn try_prepare(
    data: &[u8],
    kind: DocumentKind,
    cfg: &EngineConfig,
) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(data)?;
    let gray = grayscale_bt601(&img);
    let stretched = contrast_stretch(&gray, cfg.contrast_k);
    let out = if kind == DocumentKind::Passport {
        // Passports are text-dense; hard thresholding sharpens the MRZ.
        // Other document kinds keep background features OCR relies on.
        binarize(&stretched, cfg.binarize_threshold)
    } else {
        stretched
    };
    encode_as_png(DynamicImage::ImageLuma8(out))
}

/// BT.601 luminance (0.299R + 0.587G + 0.114B). `to_luma8` uses Rec.709
/// weights, which shift text/background contrast on scanned documents.
fn grayscale_bt601(img: &DynamicImage) -> GrayImage {
    let rgb = img.to_rgb8();
    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        let lum = 0.299 * f32::from(p[0]) + 0.587 * f32::from(p[1]) + 0.114 * f32::from(p[2]);
        Luma([lum.round().clamp(0.0, 255.0) as u8])
    })
}

/// Linear stretch around the 128 midpoint: `p' = p·k + 128·(1−k)`.
fn contrast_stretch(gray: &GrayImage, k: f32) -> GrayImage {
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = f32::from(gray.get_pixel(x, y)[0]);
        let v = p * k + 128.0 * (1.0 - k);
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        Luma([if p > threshold { 255 } else { 0 }])
    })
}

fn encode_as_png(img: DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}
