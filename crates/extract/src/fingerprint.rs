use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use veridoc_core::{IdentityExtraction, PropertyExtraction};

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("Hashing service unavailable")]
    ServiceUnavailable,
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Abstraction over the external hashing service: canonical string in,
/// fingerprint string out.
pub trait FingerprintHasher: Send + Sync {
    fn hash(&self, canonical: &str) -> Result<String, FingerprintError>;
}

/// Default SHA-256 backend. Deliberately unsalted: the fingerprint doubles
/// as a dedupe key, so the same record at the same capture time must hash
/// to the same value.
pub struct Sha256Hasher;

impl FingerprintHasher for Sha256Hasher {
    fn hash(&self, canonical: &str) -> Result<String, FingerprintError> {
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        Ok(to_hex(&digest))
    }
}

/// Encode a raw 32-byte hash as a lowercase hex string (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

// Field order is declaration order under serde_json, which keeps the
// canonical form stable across runs.
#[derive(Serialize)]
struct Canonical<'a, T: Serialize> {
    captured_at: String,
    record: &'a T,
}

fn canonical<T: Serialize>(record: &T, captured_at: DateTime<Utc>) -> Result<String, FingerprintError> {
    Ok(serde_json::to_string(&Canonical {
        captured_at: captured_at.to_rfc3339(),
        record,
    })?)
}

pub fn fingerprint_identity<H: FingerprintHasher + ?Sized>(
    hasher: &H,
    record: &IdentityExtraction,
    captured_at: DateTime<Utc>,
) -> Result<String, FingerprintError> {
    hasher.hash(&canonical(record, captured_at)?)
}

pub fn fingerprint_property<H: FingerprintHasher + ?Sized>(
    hasher: &H,
    record: &PropertyExtraction,
    captured_at: DateTime<Utc>,
) -> Result<String, FingerprintError> {
    hasher.hash(&canonical(record, captured_at)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn sha256_known_vector() {
        // SHA-256 of the empty string is a fixed constant.
        assert_eq!(
            Sha256Hasher.hash("").unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let mut rec = IdentityExtraction::new();
        rec.fill_full_name("JOHN DOE");
        let a = fingerprint_identity(&Sha256Hasher, &rec, at()).unwrap();
        let b = fingerprint_identity(&Sha256Hasher, &rec, at()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_changes_with_record() {
        let mut a = IdentityExtraction::new();
        a.fill_full_name("JOHN DOE");
        let mut b = IdentityExtraction::new();
        b.fill_full_name("JANE ROE");
        assert_ne!(
            fingerprint_identity(&Sha256Hasher, &a, at()).unwrap(),
            fingerprint_identity(&Sha256Hasher, &b, at()).unwrap()
        );
    }

    #[test]
    fn fingerprint_changes_with_timestamp() {
        let rec = IdentityExtraction::new();
        let later = at() + chrono::Duration::seconds(1);
        assert_ne!(
            fingerprint_identity(&Sha256Hasher, &rec, at()).unwrap(),
            fingerprint_identity(&Sha256Hasher, &rec, later).unwrap()
        );
    }

    #[test]
    fn property_fingerprint_works() {
        let rec = PropertyExtraction {
            deed_number: Some("D1234567".into()),
            ..PropertyExtraction::default()
        };
        let fp = fingerprint_property(&Sha256Hasher, &rec, at()).unwrap();
        assert_eq!(fp.len(), 64);
    }
}
