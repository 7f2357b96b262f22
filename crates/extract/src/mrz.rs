use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use tracing::debug;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// `P` + separator (or a misread of it) + 3-letter issuing country.
re!(re_marker, r"P[<KLC][A-Z]{3}");
// Whole-text sweep once misread separators are pre-normalized.
re!(re_sweep, r"P<[A-Z]{3}[A-Z0-9<]+");
re!(re_six_digits, r"[0-9]{6}");

/// Fields recovered from a machine-readable zone. Any subset may be absent;
/// decoding never raises a hard error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MrzDecode {
    pub full_name: Option<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    /// Set instead of `date_of_birth` when only the year decoded cleanly.
    pub birth_year: Option<i32>,
}

/// Locate and decode a passport-style MRZ anywhere in `text`.
pub fn decode(text: &str, today: NaiveDate) -> MrzDecode {
    let Some(line) = find_candidate_line(text) else {
        return MrzDecode::default();
    };
    debug!(line = %line, "mrz candidate line");
    decode_line(&line, today)
}

// ── Candidate-line search ─────────────────────────────────────────────────────

/// Three strategies, tried in order until one yields a line.
fn find_candidate_line(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    // 1. Long lines carrying a start marker (or a misread of it), else long
    //    entirely-uppercase lines.
    if let Some(l) = lines
        .iter()
        .find(|l| l.len() > 20 && (l.contains("P<") || re_marker().is_match(l)))
    {
        return Some((*l).to_string());
    }
    if let Some(l) = lines
        .iter()
        .filter(|l| l.len() > 20 && is_all_uppercase(l))
        .max_by_key(|l| l.len())
    {
        return Some((*l).to_string());
    }

    // 2. A known country code right after a (possibly misread) separator.
    if let Some(l) = lines.iter().find(|l| {
        re_country_after_sep().is_match(l)
    }) {
        return Some((*l).to_string());
    }

    // 3. Whole-text sweep with misreads pre-normalized, longest match wins.
    let normalized = normalize_separators(text);
    re_sweep()
        .find_iter(&normalized)
        .max_by_key(|m| m.len())
        .map(|m| m.as_str().to_string())
}

fn re_country_after_sep() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        let codes: Vec<&str> = COUNTRY_CODES.iter().map(|(c, _)| *c).collect();
        Regex::new(&format!(r"[<KLC]({})", codes.join("|"))).expect("invalid regex")
    })
}

fn is_all_uppercase(line: &str) -> bool {
    let mut has_alpha = false;
    for c in line.chars() {
        if c.is_alphabetic() {
            has_alpha = true;
            if !c.is_uppercase() {
                return false;
            }
        }
    }
    has_alpha
}

// ── Decoding ──────────────────────────────────────────────────────────────────

fn decode_line(line: &str, today: NaiveDate) -> MrzDecode {
    let mut out = MrzDecode::default();

    if let Some(m) = re_marker().find(line) {
        let marker = m.as_str();
        let code = &marker[2..5];
        out.nationality = Some(country_name(code).to_string());

        let name_raw = name_portion(&line[m.end()..]);
        let name = decode_name(name_raw, code == "MYS");
        if !name.is_empty() {
            out.full_name = Some(name);
        }
    } else if let Some(c) = re_country_after_sep().captures(line) {
        // No usable name structure without the marker, but a known country
        // code after a separator still pins nationality (second MRZ line).
        out.nationality = Some(country_name(&c[1]).to_string());
    }

    match decode_birth_date(line, today) {
        BirthDate::Full(d) => out.date_of_birth = Some(d),
        BirthDate::YearOnly(y) => out.birth_year = Some(y),
        BirthDate::None => {}
    }

    out
}

/// The name field runs from the marker up to the first digit (document
/// number, check digits and dates are all numeric).
fn name_portion(s: &str) -> &str {
    match s.find(|c: char| c.is_ascii_digit()) {
        Some(i) => &s[..i],
        None => s,
    }
}

/// Misread-separator repair: `K`, `L`, `C` where `<` is structurally
/// expected. Runs of 2+ characters drawn from {K, L, C, <} are filler;
/// a lone misread letter inside a name is left alone.
fn normalize_separators(s: &str) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    if chars.len() >= 2 && chars[0] == 'P' && matches!(chars[1], 'K' | 'L' | 'C') {
        chars[1] = '<';
    }
    let mut i = 0;
    while i < chars.len() {
        if matches!(chars[i], 'K' | 'L' | 'C' | '<') {
            let start = i;
            while i < chars.len() && matches!(chars[i], 'K' | 'L' | 'C' | '<') {
                i += 1;
            }
            if i - start >= 2 {
                for c in &mut chars[start..i] {
                    *c = '<';
                }
            }
        } else {
            i += 1;
        }
    }
    chars.into_iter().collect()
}

fn decode_name(raw: &str, malaysian: bool) -> String {
    let normalized = normalize_separators(raw);
    let spaced = normalized.replace('<', " ");
    let mut parts: Vec<String> = spaced.split_whitespace().map(str::to_string).collect();

    if malaysian {
        // BIN/BINTI patronymic markers split given name and father's name;
        // OCR often reads only the abbreviated form.
        for part in &mut parts {
            match part.as_str() {
                "B" => *part = "BIN".to_string(),
                "BT" => *part = "BINTI".to_string(),
                _ => {}
            }
        }
    }

    parts.join(" ")
}

enum BirthDate {
    Full(NaiveDate),
    YearOnly(i32),
    None,
}

/// First 6 contiguous digits in the line, read as YYMMDD, after correcting
/// the classic OCR digit confusions.
fn decode_birth_date(line: &str, today: NaiveDate) -> BirthDate {
    let corrected = correct_digit_confusions(line);
    let Some(m) = re_six_digits().find(&corrected) else {
        return BirthDate::None;
    };
    let digits = m.as_str();
    let yy: i32 = digits[0..2].parse().unwrap_or(0);
    let mm: u32 = digits[2..4].parse().unwrap_or(0);
    let dd: u32 = digits[4..6].parse().unwrap_or(0);

    let year = resolve_century(yy, today);
    match NaiveDate::from_ymd_opt(year, mm, dd) {
        Some(d) if d <= today => BirthDate::Full(d),
        _ => BirthDate::YearOnly(year),
    }
}

fn correct_digit_confusions(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'g' | 'q' => '9',
            'B' => '8',
            'G' => '6',
            'S' => '5',
            'l' | 'I' => '1',
            other => other,
        })
        .collect()
}

/// Two-digit years past `(current_year mod 100) + 20` belong to the 1900s.
/// A decoded date of birth can never be in the future, so the remaining
/// wraparound cases also fall back a century.
fn resolve_century(yy: i32, today: NaiveDate) -> i32 {
    let cutoff = today.year() % 100 + 20;
    let mut year = if yy > cutoff { 1900 + yy } else { 2000 + yy };
    if year > today.year() {
        year -= 100;
    }
    year
}

// ── Country codes ─────────────────────────────────────────────────────────────

const COUNTRY_CODES: &[(&str, &str)] = &[
    ("USA", "United States"),
    ("MYS", "Malaysia"),
    ("GBR", "United Kingdom"),
    ("CAN", "Canada"),
    ("AUS", "Australia"),
    ("NZL", "New Zealand"),
    ("SGP", "Singapore"),
    ("IDN", "Indonesia"),
    ("THA", "Thailand"),
    ("PHL", "Philippines"),
    ("VNM", "Vietnam"),
    ("IND", "India"),
    ("CHN", "China"),
    ("JPN", "Japan"),
    ("KOR", "South Korea"),
    ("FRA", "France"),
    ("DEU", "Germany"),
    ("NLD", "Netherlands"),
    ("ESP", "Spain"),
    ("ITA", "Italy"),
    ("MEX", "Mexico"),
    ("BRA", "Brazil"),
];

/// Map an ICAO code to a display name; unknown codes pass through as-is.
pub fn country_name(code: &str) -> &str {
    COUNTRY_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}
