use std::sync::OnceLock;

use regex::Regex;
use veridoc_core::PropertyExtraction;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_deed_labeled,
    r"(?i)\b(?:deed\s+(?:number|no)|title\s+(?:number|no)|property\s+id|recording\s+(?:number|no))\.?\s*[:\-]?\s*([A-Z0-9][A-Z0-9\-]{3,14})");
re!(re_deed_bare, r"\b(D\d{5,7})\b");
re!(re_address_labeled,
    r"(?i)\b(?:property\s+address|situs\s+address|address|located\s+at|premises)\s*[:\-]?\s*(\d+[^\n,;]{5,80})");
re!(re_owner_labeled,
    r"(?i)\b(?:owner(?:\s+name)?|grantee|purchaser|buyer)\s*[:\-]?\s*([A-Za-z][A-Za-z .,'&\-]{2,60})");
re!(re_tax_id_labeled,
    r"(?i)\b(?:tax\s+(?:id|parcel)(?:\s+(?:number|no))?|parcel\s+(?:number|no|id)|apn)\.?\s*[:\-]?\s*([A-Z0-9][A-Z0-9\-]{3,19})");

/// Extract the property-document field set. Each field family is tried
/// against the full text first, then per line — OCR regularly splits a
/// label and its value across lines.
pub fn extract_property(text: &str) -> PropertyExtraction {
    PropertyExtraction {
        deed_number: first_capture(text, re_deed_labeled())
            .or_else(|| first_capture(text, re_deed_bare())),
        address: first_capture(text, re_address_labeled()).map(|a| a.trim_end_matches('.').to_string()),
        owner_name: first_capture(text, re_owner_labeled()),
        tax_id: first_capture(text, re_tax_id_labeled()),
    }
}

/// Full-text pass, then a per-line retry. First non-empty capture wins.
fn first_capture(text: &str, re: &Regex) -> Option<String> {
    if let Some(v) = capture_in(text, re) {
        return Some(v);
    }
    text.lines().find_map(|line| capture_in(line, re))
}

fn capture_in(haystack: &str, re: &Regex) -> Option<String> {
    let c = re.captures(haystack)?;
    let v = c.get(1)?.as_str().trim().to_string();
    (!v.is_empty()).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_deed_number() {
        let r = extract_property("Deed Number: D1234567");
        assert_eq!(r.deed_number.as_deref(), Some("D1234567"));
    }

    #[test]
    fn deed_label_synonyms() {
        for text in [
            "Title Number: T-998877",
            "Property ID: T-998877",
            "Recording No: T-998877",
        ] {
            let r = extract_property(text);
            assert_eq!(r.deed_number.as_deref(), Some("T-998877"), "failed on: {text}");
        }
    }

    #[test]
    fn bare_deed_pattern_as_last_resort() {
        let r = extract_property("recorded against D123456 in the county registry");
        assert_eq!(r.deed_number.as_deref(), Some("D123456"));
    }

    #[test]
    fn bare_deed_pattern_bounds() {
        // 4 digits is too short, 8 too long.
        assert_eq!(extract_property("ref D1234").deed_number, None);
        assert_eq!(extract_property("ref D12345678").deed_number, None);
    }

    #[test]
    fn address_extraction() {
        let r = extract_property("Property Address: 123 Main Street, Springfield");
        assert_eq!(r.address.as_deref(), Some("123 Main Street"));
    }

    #[test]
    fn owner_and_tax_id() {
        let r = extract_property("Owner: Jane Q. Public\nTax Parcel No: 12-3456-789");
        assert_eq!(r.owner_name.as_deref(), Some("Jane Q. Public"));
        assert_eq!(r.tax_id.as_deref(), Some("12-3456-789"));
    }

    #[test]
    fn fields_are_independent() {
        let r = extract_property("Deed Number: D7654321");
        assert_eq!(r.deed_number.as_deref(), Some("D7654321"));
        assert_eq!(r.address, None);
        assert_eq!(r.owner_name, None);
        assert_eq!(r.tax_id, None);
    }

    #[test]
    fn empty_text_yields_empty_record() {
        assert!(extract_property("").is_empty());
    }
}
