pub mod config;
pub mod dates;
pub mod fingerprint;
pub mod identity;
pub mod mrz;
pub mod pipeline;
pub mod preprocess;
pub mod property;
pub mod recognizer;

pub use config::EngineConfig;
pub use fingerprint::{FingerprintHasher, Sha256Hasher};
pub use pipeline::{PipelineError, ProgressEvent, ScanPipeline, ScanResult, ScanSession, ScanState};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError, OcrOptions};
