use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use tracing::debug;
use veridoc_core::IdentityExtraction;

use crate::config::EngineConfig;
use crate::dates::parse_date_fragment;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Date fragments searched to the right of a label.
re!(re_frag_delimited, r"\d{1,4}\s*[./\-年]\s*\d{1,2}\s*[./\-月]\s*\d{1,4}\s*日?");
re!(re_frag_month_first, r"[A-Za-z]{3,9}\.?\s+\d{1,2},?\s+\d{4}");
re!(re_frag_day_first, r"\d{1,2}\s+[A-Za-z]{3,9}\.?,?\s+\d{4}");
re!(re_year_token, r"\b(19\d{2}|20\d{2})\b");
re!(re_document_number,
    r"(?i)\b(?:passport|document|license|licence|id|identity)\s*(?:no|number|num|#)\.?\s*[:\-]?\s*([A-Z0-9][A-Z0-9 \-]{3,18})");

/// Labels that anchor a date-of-birth mention, in match priority.
const DOB_LABELS: &[&str] = &["birth", "dob", "born", "date of birth"];
const NAME_LABELS: &[&str] = &["full name", "name"];
const NATIONALITY_LABELS: &[&str] = &["nationality", "citizenship", "country of citizenship"];
const ISSUE_LABELS: &[&str] = &["date of issue", "issue date", "issued"];
const EXPIRY_LABELS: &[&str] = &["date of expiry", "expiry date", "expiration", "valid until", "expiry"];

/// Stated default when no nationality token is found anywhere — citizenship
/// is never silently assumed.
pub const NATIONALITY_FALLBACK: &str = "not a US citizen";

/// Fill every field the MRZ pass left empty. Lower-precedence strategies
/// never displace values already on the record.
pub fn extract_identity(
    text: &str,
    today: NaiveDate,
    cfg: &EngineConfig,
    record: &mut IdentityExtraction,
) {
    match extract_date_of_birth(text, today, cfg) {
        DobCandidate::FullDate(dob) => {
            record.record_date_of_birth(dob, today);
        }
        DobCandidate::YearOnly(year) => {
            record.record_birth_year(year, today);
        }
        DobCandidate::None => {}
    }

    if let Some(name) = match_label_value(text, NAME_LABELS).filter(|v| is_plausible_name(v)) {
        record.fill_full_name(name);
    }

    match match_label_value(text, NATIONALITY_LABELS) {
        Some(nat) => record.fill_nationality(nat),
        None => record.fill_nationality(NATIONALITY_FALLBACK),
    }

    if let Some(num) = extract_document_number(text) {
        record.fill_document_number(num);
    }
    if let Some(date) = label_anchored_date_fragment(text, ISSUE_LABELS) {
        record.fill_issuance_date(date);
    }
    if let Some(date) = label_anchored_date_fragment(text, EXPIRY_LABELS) {
        record.fill_expiry_date(date);
    }
}

// ── Date-of-birth strategy chain ─────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub enum DobCandidate {
    FullDate(NaiveDate),
    YearOnly(i32),
    None,
}

/// Ordered strategies, stopping at the first plausible result:
/// labeled full date, labeled year, then bare-year sweep.
pub fn extract_date_of_birth(text: &str, today: NaiveDate, cfg: &EngineConfig) -> DobCandidate {
    for label in DOB_LABELS {
        if let Some(dob) = labeled_full_date(text, label, today) {
            debug!(%label, %dob, "dob from labeled date");
            return DobCandidate::FullDate(dob);
        }
    }
    for label in DOB_LABELS {
        if let Some(year) = labeled_year(text, label, today) {
            debug!(%label, year, "dob year from label");
            return DobCandidate::YearOnly(year);
        }
    }
    if let Some(year) = bare_birth_year(text, today, cfg) {
        debug!(year, "dob year from bare token");
        return DobCandidate::YearOnly(year);
    }
    DobCandidate::None
}

/// Remainder of the first line mentioning `label`, or None.
fn after_label<'t>(text: &'t str, label: &str) -> Option<&'t str> {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(label));
    let re = Regex::new(&pattern).ok()?;
    for line in text.lines() {
        if let Some(m) = re.find(line) {
            return Some(&line[m.end()..]);
        }
    }
    None
}

fn labeled_full_date(text: &str, label: &str, today: NaiveDate) -> Option<NaiveDate> {
    let rest = after_label(text, label)?;
    for frag_re in [re_frag_delimited(), re_frag_month_first(), re_frag_day_first()] {
        if let Some(m) = frag_re.find(rest) {
            if let Some(date) = parse_date_fragment(m.as_str(), today) {
                return Some(date);
            }
        }
    }
    None
}

fn labeled_year(text: &str, label: &str, today: NaiveDate) -> Option<i32> {
    let rest = after_label(text, label)?;
    let year: i32 = re_year_token().captures(rest)?.get(1)?.as_str().parse().ok()?;
    (year > 1900 && year <= today.year()).then_some(year)
}

/// Any bare 4-digit token within the plausible birth-year window; the most
/// recent candidate wins. The minimum-holder-age cap keeps issue years and
/// document numbers from masquerading as birth years.
fn bare_birth_year(text: &str, today: NaiveDate, cfg: &EngineConfig) -> Option<i32> {
    let ceiling = today.year() - cfg.min_holder_age;
    re_year_token()
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse::<i32>().ok())
        .filter(|y| *y >= cfg.bare_year_floor && *y <= ceiling)
        .max()
}

// ── Generic label matcher ─────────────────────────────────────────────────────

/// Four escalating strategies per label: exact substring, word-boundary
/// capture, line-starts-with, then fuzzy word overlap.
pub fn match_label_value(text: &str, labels: &[&str]) -> Option<String> {
    for label in labels {
        if let Some(v) = substring_value(text, label) {
            return Some(v);
        }
        if let Some(v) = word_boundary_value(text, label) {
            return Some(v);
        }
        if let Some(v) = starts_with_value(text, label) {
            return Some(v);
        }
        if let Some(v) = fuzzy_value(text, label) {
            return Some(v);
        }
    }
    None
}

/// Case-insensitive search returning byte offsets into `haystack` itself.
/// `to_lowercase` can change byte lengths (`İ` lowercases to two chars), so
/// offsets found in a lowercased copy must never slice the original.
fn find_ascii_ignore_case(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let needle: Vec<char> = needle.chars().collect();
    let hay: Vec<(usize, char)> = haystack.char_indices().collect();
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    for w in 0..=hay.len() - needle.len() {
        let matched = hay[w..w + needle.len()]
            .iter()
            .zip(&needle)
            .all(|((_, h), n)| h.to_ascii_lowercase() == *n);
        if matched {
            let start = hay[w].0;
            let end = hay.get(w + needle.len()).map_or(haystack.len(), |(i, _)| *i);
            return Some((start, end));
        }
    }
    None
}

fn substring_value(text: &str, label: &str) -> Option<String> {
    let needle = label.to_ascii_lowercase();
    for line in text.lines() {
        if let Some((_, end)) = find_ascii_ignore_case(line, &needle) {
            if let Some(v) = clean_value(&line[end..]) {
                return Some(v);
            }
        }
    }
    None
}

fn word_boundary_value(text: &str, label: &str) -> Option<String> {
    let re = Regex::new(&format!(r"(?i)\b{}\b\s*[:\-]?\s*(.+)", regex::escape(label))).ok()?;
    for line in text.lines() {
        if let Some(c) = re.captures(line) {
            if let Some(v) = clean_value(c.get(1)?.as_str()) {
                return Some(v);
            }
        }
    }
    None
}

fn starts_with_value(text: &str, label: &str) -> Option<String> {
    let needle = label.to_ascii_lowercase();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if let Some((0, end)) = find_ascii_ignore_case(trimmed, &needle) {
            if let Some(v) = clean_value(&trimmed[end..]) {
                return Some(v);
            }
        }
    }
    None
}

/// Accept a line when more than half of the label's significant words
/// (length > 2) appear in it; the value is the line with those words
/// stripped out.
fn fuzzy_value(text: &str, label: &str) -> Option<String> {
    let significant: Vec<String> = label
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .map(str::to_ascii_lowercase)
        .collect();
    if significant.is_empty() {
        return None;
    }
    for line in text.lines() {
        let present = significant
            .iter()
            .filter(|w| find_ascii_ignore_case(line, w).is_some())
            .count();
        if present * 2 > significant.len() {
            let mut remainder = line.to_string();
            for word in &significant {
                if let Some((start, end)) = find_ascii_ignore_case(&remainder, word) {
                    remainder.replace_range(start..end, "");
                }
            }
            if let Some(v) = clean_value(&remainder) {
                return Some(v);
            }
        }
    }
    None
}

/// Strip label-value separators and reject residue too short to be a value.
fn clean_value(raw: &str) -> Option<String> {
    let v = raw
        .trim()
        .trim_start_matches([':', '-', '.', '：'])
        .trim()
        .to_string();
    (v.len() >= 2 && v.len() <= 60 && v.chars().any(|c| c.is_alphanumeric())).then_some(v)
}

fn is_plausible_name(value: &str) -> bool {
    let alpha = value.chars().filter(|c| c.is_alphabetic()).count();
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    alpha >= 2 && digits <= alpha
}

// ── Supporting fields ─────────────────────────────────────────────────────────

fn extract_document_number(text: &str) -> Option<String> {
    let c = re_document_number().captures(text)?;
    let cleaned: String = c
        .get(1)?
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    (cleaned.len() >= 5 && cleaned.len() <= 15).then(|| cleaned.to_uppercase())
}

fn label_anchored_date_fragment(text: &str, labels: &[&str]) -> Option<String> {
    for label in labels {
        if let Some(rest) = after_label(text, label) {
            for frag_re in [re_frag_delimited(), re_frag_month_first(), re_frag_day_first()] {
                if let Some(m) = frag_re.find(rest) {
                    return Some(m.as_str().trim().to_string());
                }
            }
        }
    }
    None
}
