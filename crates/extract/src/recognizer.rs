use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR service unavailable")]
    ServiceUnavailable,
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
}

/// Per-pass recognition settings. Pass A pins a single script; pass B turns
/// on orientation/script detection and widens the character whitelist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrOptions {
    pub language: String,
    pub detect_orientation: bool,
    pub char_whitelist: Option<String>,
}

impl OcrOptions {
    pub fn pass_a() -> Self {
        Self {
            language: "eng".to_string(),
            detect_orientation: false,
            char_whitelist: None,
        }
    }

    pub fn pass_b() -> Self {
        Self {
            language: "eng".to_string(),
            detect_orientation: true,
            char_whitelist: Some(
                "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789<>/.,:-() "
                    .to_string(),
            ),
        }
    }
}

/// Abstraction over an OCR backend. Implementations accept PNG/JPEG bytes
/// and report raw progress 0–100 through the callback.
pub trait OcrBackend: Send + Sync {
    fn recognize(
        &self,
        image_bytes: &[u8],
        opts: &OcrOptions,
        progress: &mut dyn FnMut(u8),
    ) -> Result<String, OcrError>;
}

/// Map backend progress 0–100 into the [lo, hi] sub-range of the overall
/// scale, so two passes render as one indicator.
pub(crate) fn remap(p: u8, lo: u8, hi: u8) -> u8 {
    let p = u32::from(p.min(100));
    lo + (p * u32::from(hi - lo) / 100) as u8
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns pre-set strings per pass — lets the pipeline be exercised
/// without a Tesseract install.
pub struct MockRecognizer {
    pass_a: String,
    pass_b: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self { pass_a: text.clone(), pass_b: text }
    }

    pub fn two_pass(pass_a: impl Into<String>, pass_b: impl Into<String>) -> Self {
        Self { pass_a: pass_a.into(), pass_b: pass_b.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(
        &self,
        _image_bytes: &[u8],
        opts: &OcrOptions,
        progress: &mut dyn FnMut(u8),
    ) -> Result<String, OcrError> {
        progress(0);
        progress(100);
        Ok(if opts.detect_orientation {
            self.pass_b.clone()
        } else {
            self.pass_a.clone()
        })
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError, OcrOptions};
    use leptess::LepTess;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>) -> Self {
            Self { data_path }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(
            &self,
            image_bytes: &[u8],
            opts: &OcrOptions,
            progress: &mut dyn FnMut(u8),
        ) -> Result<String, OcrError> {
            progress(0);
            // `lang+osd` pulls in the orientation/script-detection data.
            let lang = if opts.detect_orientation {
                format!("{}+osd", opts.language)
            } else {
                opts.language.clone()
            };
            let mut lt = LepTess::new(self.data_path.as_deref(), &lang)
                .map_err(|_| OcrError::ServiceUnavailable)?;
            if let Some(wl) = &opts.char_whitelist {
                lt.set_variable(leptess::Variable::TesseditCharWhitelist, wl)
                    .map_err(|e| OcrError::Engine(e.to_string()))?;
            }
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            progress(50);
            let text = lt
                .get_utf8_text()
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            progress(100);
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_per_pass_text() {
        let r = MockRecognizer::two_pass("short", "much longer text");
        let mut sink = |_p: u8| {};
        assert_eq!(
            r.recognize(b"img", &OcrOptions::pass_a(), &mut sink).unwrap(),
            "short"
        );
        assert_eq!(
            r.recognize(b"img", &OcrOptions::pass_b(), &mut sink).unwrap(),
            "much longer text"
        );
    }

    #[test]
    fn single_text_mock_ignores_pass() {
        let r = MockRecognizer::new("hello");
        let mut sink = |_p: u8| {};
        assert_eq!(r.recognize(b"a", &OcrOptions::pass_a(), &mut sink).unwrap(), "hello");
        assert_eq!(r.recognize(b"b", &OcrOptions::pass_b(), &mut sink).unwrap(), "hello");
    }

    #[test]
    fn pass_b_widens_settings() {
        let a = OcrOptions::pass_a();
        let b = OcrOptions::pass_b();
        assert!(!a.detect_orientation && a.char_whitelist.is_none());
        assert!(b.detect_orientation && b.char_whitelist.is_some());
    }

    #[test]
    fn remap_bounds() {
        assert_eq!(remap(0, 10, 50), 10);
        assert_eq!(remap(100, 10, 50), 50);
        assert_eq!(remap(50, 50, 90), 70);
        // Out-of-range backend progress is clamped.
        assert_eq!(remap(200, 10, 50), 50);
    }
}
