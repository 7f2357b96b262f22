use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of identity document being scanned. Drives preprocessing
/// decisions (passports are binarized, the others are not).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Passport,
    DriverLicense,
    IdCard,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Passport => write!(f, "passport"),
            DocumentKind::DriverLicense => write!(f, "driver_license"),
            DocumentKind::IdCard => write!(f, "id_card"),
        }
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passport" => Ok(DocumentKind::Passport),
            "driver_license" => Ok(DocumentKind::DriverLicense),
            "id_card" => Ok(DocumentKind::IdCard),
            other => Err(format!("Unknown document kind: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn display_roundtrip() {
        for kind in [
            DocumentKind::Passport,
            DocumentKind::DriverLicense,
            DocumentKind::IdCard,
        ] {
            assert_eq!(DocumentKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn from_str_rejects_unknown() {
        assert!(DocumentKind::from_str("visa").is_err());
    }
}
