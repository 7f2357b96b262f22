use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use veridoc_core::{DocumentKind, IdentityExtraction, PropertyExtraction};

use crate::config::EngineConfig;
use crate::fingerprint::{self, FingerprintError, FingerprintHasher};
use crate::identity;
use crate::mrz;
use crate::preprocess;
use crate::property;
use crate::recognizer::{remap, OcrBackend, OcrError, OcrOptions};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("Fingerprinting failed: {0}")]
    Fingerprint(#[from] FingerprintError),
    #[error("Scan cancelled")]
    Cancelled,
}

/// The stages one scan moves through, in order. `Failed` is reachable from
/// any stage; everything else is strictly sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Preprocessing,
    RecognizingPassA,
    RecognizingPassB,
    Extracting,
    Fingerprinting,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    Entered(ScanState),
    /// Overall progress 0–100 across all stages.
    Percent(u8),
}

/// One scan's exclusively-owned context: cancellation, event reporting and
/// the current state-machine position. Create a fresh session per scan.
pub struct ScanSession {
    state: ScanState,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ScanSession {
    pub fn new(cancel: CancellationToken, events: Option<mpsc::UnboundedSender<ProgressEvent>>) -> Self {
        Self { state: ScanState::Idle, cancel, events }
    }

    /// A session with no cancellation or progress consumer.
    pub fn detached() -> Self {
        Self::new(CancellationToken::new(), None)
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    fn enter(&mut self, state: ScanState) {
        debug!(from = ?self.state, to = ?state, "scan state transition");
        self.state = state;
        self.emit(ProgressEvent::Entered(state));
    }

    fn percent(&self, p: u8) {
        self.emit(ProgressEvent::Percent(p));
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Stage boundary: yield to the runtime, then honor cancellation. A
    /// superseded scan stops here instead of delivering late results.
    async fn checkpoint(&self) -> Result<(), PipelineError> {
        tokio::task::yield_now().await;
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }
}

/// The result of a completed scan.
#[derive(Debug, Clone)]
pub struct ScanResult<T> {
    pub record: T,
    /// Raw text of the winning OCR pass.
    pub raw_text: String,
    /// Hex fingerprint of the canonical record, for dedupe checks.
    pub fingerprint: String,
}

/// Chains preprocess → two-pass OCR → extraction → fingerprint over
/// injected OCR and hashing backends.
pub struct ScanPipeline<R: OcrBackend, H: FingerprintHasher> {
    recognizer: R,
    hasher: H,
    config: EngineConfig,
}

impl<R: OcrBackend, H: FingerprintHasher> ScanPipeline<R, H> {
    pub fn new(recognizer: R, hasher: H) -> Self {
        Self::with_config(recognizer, hasher, EngineConfig::default())
    }

    pub fn with_config(recognizer: R, hasher: H, config: EngineConfig) -> Self {
        Self { recognizer, hasher, config }
    }

    /// Scan an identity document image. Returns a best-effort (possibly
    /// partially empty) record; the only hard failures are an unavailable
    /// service and cancellation.
    pub async fn scan_identity(
        &self,
        input: &[u8],
        kind: DocumentKind,
        session: &mut ScanSession,
    ) -> Result<ScanResult<IdentityExtraction>, PipelineError> {
        match self.run_identity(input, kind, session).await {
            Ok(result) => {
                session.enter(ScanState::Complete);
                session.percent(100);
                Ok(result)
            }
            Err(e) => {
                session.enter(ScanState::Failed);
                Err(e)
            }
        }
    }

    /// Scan a property/legal document image. Sibling of the identity flow:
    /// same recognition stages, its own date-free field set.
    pub async fn scan_property(
        &self,
        input: &[u8],
        session: &mut ScanSession,
    ) -> Result<ScanResult<PropertyExtraction>, PipelineError> {
        match self.run_property(input, session).await {
            Ok(result) => {
                session.enter(ScanState::Complete);
                session.percent(100);
                Ok(result)
            }
            Err(e) => {
                session.enter(ScanState::Failed);
                Err(e)
            }
        }
    }

    /// Property extraction for non-image uploads whose text is already
    /// available — skips the recognition stages entirely.
    pub fn extract_property_text(&self, text: &str) -> Result<ScanResult<PropertyExtraction>, PipelineError> {
        let record = property::extract_property(text);
        let fingerprint = fingerprint::fingerprint_property(&self.hasher, &record, Utc::now())?;
        Ok(ScanResult { record, raw_text: text.to_string(), fingerprint })
    }

    async fn run_identity(
        &self,
        input: &[u8],
        kind: DocumentKind,
        session: &mut ScanSession,
    ) -> Result<ScanResult<IdentityExtraction>, PipelineError> {
        let text = self.recognition_stages(input, Some(kind), session).await?;

        session.checkpoint().await?;
        session.enter(ScanState::Extracting);
        session.percent(90);
        let today = Utc::now().date_naive();
        let mut record = IdentityExtraction::new();

        let zone = mrz::decode(&text, today);
        if let Some(dob) = zone.date_of_birth {
            record.record_date_of_birth(dob, today);
        } else if let Some(year) = zone.birth_year {
            record.record_birth_year(year, today);
        }
        if let Some(name) = zone.full_name {
            record.fill_full_name(name);
        }
        if let Some(nationality) = zone.nationality {
            record.fill_nationality(nationality);
        }
        identity::extract_identity(&text, today, &self.config, &mut record);

        session.checkpoint().await?;
        session.enter(ScanState::Fingerprinting);
        session.percent(95);
        let fingerprint = fingerprint::fingerprint_identity(&self.hasher, &record, Utc::now())?;

        Ok(ScanResult { record, raw_text: text, fingerprint })
    }

    async fn run_property(
        &self,
        input: &[u8],
        session: &mut ScanSession,
    ) -> Result<ScanResult<PropertyExtraction>, PipelineError> {
        let text = self.recognition_stages(input, None, session).await?;

        session.checkpoint().await?;
        session.enter(ScanState::Extracting);
        session.percent(90);
        let record = property::extract_property(&text);

        session.checkpoint().await?;
        session.enter(ScanState::Fingerprinting);
        session.percent(95);
        let fingerprint = fingerprint::fingerprint_property(&self.hasher, &record, Utc::now())?;

        Ok(ScanResult { record, raw_text: text, fingerprint })
    }

    /// Preprocess (identity documents only), then both OCR passes; the
    /// longer recognized text wins. No retries: an unavailable service
    /// fails the scan immediately.
    async fn recognition_stages(
        &self,
        input: &[u8],
        kind: Option<DocumentKind>,
        session: &mut ScanSession,
    ) -> Result<String, PipelineError> {
        session.checkpoint().await?;
        let image = match kind {
            Some(kind) => {
                session.enter(ScanState::Preprocessing);
                session.percent(0);
                let png = preprocess::prepare_for_ocr(input, kind, &self.config);
                session.percent(10);
                png
            }
            None => input.to_vec(),
        };

        session.checkpoint().await?;
        session.enter(ScanState::RecognizingPassA);
        let text_a = self
            .recognizer
            .recognize(&image, &OcrOptions::pass_a(), &mut |p| {
                session.percent(remap(p, 10, 50))
            })?;

        session.checkpoint().await?;
        session.enter(ScanState::RecognizingPassB);
        let text_b = self
            .recognizer
            .recognize(&image, &OcrOptions::pass_b(), &mut |p| {
                session.percent(remap(p, 50, 90))
            })?;

        debug!(pass_a = text_a.len(), pass_b = text_b.len(), "recognition passes complete");
        Ok(if text_b.len() > text_a.len() { text_b } else { text_a })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Sha256Hasher;
    use crate::recognizer::MockRecognizer;

    const PASSPORT_TEXT: &str =
        "PASSPORT\nP<USAJOHN<<DOE<<<<<<<<<<<<<<<<<<<<<<850315\nDate of Issue: 2020-01-02";

    fn pipeline(text: &str) -> ScanPipeline<MockRecognizer, Sha256Hasher> {
        ScanPipeline::new(MockRecognizer::new(text), Sha256Hasher)
    }

    #[tokio::test]
    async fn identity_scan_happy_path() {
        let p = pipeline(PASSPORT_TEXT);
        let mut session = ScanSession::detached();
        let result = p
            .scan_identity(b"img", DocumentKind::Passport, &mut session)
            .await
            .unwrap();

        assert_eq!(result.record.full_name.as_deref(), Some("JOHN DOE"));
        assert_eq!(result.record.nationality.as_deref(), Some("United States"));
        assert_eq!(result.record.birth_year, Some(1985));
        assert!(result.record.age.is_some());
        assert_eq!(result.fingerprint.len(), 64);
        assert_eq!(session.state(), ScanState::Complete);
    }

    #[tokio::test]
    async fn longer_pass_wins() {
        let p = ScanPipeline::new(
            MockRecognizer::two_pass("Name: SHORT", "Full Name: MUCH LONGER NAME HERE"),
            Sha256Hasher,
        );
        let mut session = ScanSession::detached();
        let result = p
            .scan_identity(b"img", DocumentKind::IdCard, &mut session)
            .await
            .unwrap();
        assert_eq!(result.raw_text, "Full Name: MUCH LONGER NAME HERE");
        assert_eq!(result.record.full_name.as_deref(), Some("MUCH LONGER NAME HERE"));
    }

    #[tokio::test]
    async fn tie_prefers_pass_a() {
        let p = ScanPipeline::new(MockRecognizer::two_pass("aaaa", "bbbb"), Sha256Hasher);
        let mut session = ScanSession::detached();
        let result = p
            .scan_identity(b"img", DocumentKind::IdCard, &mut session)
            .await
            .unwrap();
        assert_eq!(result.raw_text, "aaaa");
    }

    #[tokio::test]
    async fn states_advance_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let p = pipeline(PASSPORT_TEXT);
        let mut session = ScanSession::new(CancellationToken::new(), Some(tx));
        p.scan_identity(b"img", DocumentKind::Passport, &mut session)
            .await
            .unwrap();

        let mut states = Vec::new();
        let mut percents = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            match ev {
                ProgressEvent::Entered(s) => states.push(s),
                ProgressEvent::Percent(p) => percents.push(p),
            }
        }
        assert_eq!(
            states,
            vec![
                ScanState::Preprocessing,
                ScanState::RecognizingPassA,
                ScanState::RecognizingPassB,
                ScanState::Extracting,
                ScanState::Fingerprinting,
                ScanState::Complete,
            ]
        );
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "percents regressed: {percents:?}");
        assert_eq!(percents.first(), Some(&0));
        assert_eq!(percents.last(), Some(&100));
    }

    #[tokio::test]
    async fn service_unavailable_fails_the_scan() {
        struct DownRecognizer;
        impl OcrBackend for DownRecognizer {
            fn recognize(
                &self,
                _: &[u8],
                _: &OcrOptions,
                _: &mut dyn FnMut(u8),
            ) -> Result<String, OcrError> {
                Err(OcrError::ServiceUnavailable)
            }
        }
        let p = ScanPipeline::new(DownRecognizer, Sha256Hasher);
        let mut session = ScanSession::detached();
        let err = p
            .scan_identity(b"img", DocumentKind::Passport, &mut session)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Ocr(OcrError::ServiceUnavailable)));
        assert_eq!(session.state(), ScanState::Failed);
    }

    #[tokio::test]
    async fn cancelled_scan_fails_without_result() {
        let token = CancellationToken::new();
        token.cancel();
        let p = pipeline(PASSPORT_TEXT);
        let mut session = ScanSession::new(token, None);
        let err = p
            .scan_identity(b"img", DocumentKind::Passport, &mut session)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(session.state(), ScanState::Failed);
    }

    #[tokio::test]
    async fn identical_input_yields_identical_records() {
        let p = pipeline(PASSPORT_TEXT);
        let a = p
            .scan_identity(b"img", DocumentKind::Passport, &mut ScanSession::detached())
            .await
            .unwrap();
        let b = p
            .scan_identity(b"img", DocumentKind::Passport, &mut ScanSession::detached())
            .await
            .unwrap();
        // Field values are deterministic; the fingerprint also covers the
        // capture timestamp, so it is not compared here.
        assert_eq!(a.record, b.record);
    }

    #[tokio::test]
    async fn property_scan_extracts_deed_fields() {
        let text = "WARRANTY DEED\nDeed Number: D1234567\nOwner: Jane Q. Public";
        let p = pipeline(text);
        let mut session = ScanSession::detached();
        let result = p.scan_property(b"img", &mut session).await.unwrap();
        assert_eq!(result.record.deed_number.as_deref(), Some("D1234567"));
        assert_eq!(result.record.owner_name.as_deref(), Some("Jane Q. Public"));
        assert_eq!(result.fingerprint.len(), 64);
        assert_eq!(session.state(), ScanState::Complete);
    }

    #[tokio::test]
    async fn property_scan_skips_preprocessing_stage() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let p = pipeline("Deed Number: D1234567");
        let mut session = ScanSession::new(CancellationToken::new(), Some(tx));
        p.scan_property(b"img", &mut session).await.unwrap();
        while let Ok(ev) = rx.try_recv() {
            assert_ne!(ev, ProgressEvent::Entered(ScanState::Preprocessing));
        }
    }

    #[test]
    fn property_text_path_needs_no_ocr() {
        let p = pipeline("unused");
        let result = p.extract_property_text("Deed Number: D7654321").unwrap();
        assert_eq!(result.record.deed_number.as_deref(), Some("D7654321"));
        assert_eq!(result.fingerprint.len(), 64);
    }
}
