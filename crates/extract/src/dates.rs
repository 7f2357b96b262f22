use chrono::{Datelike, NaiveDate};

/// Parse a date fragment captured near a label. Handles Western delimited
/// dates, month-name dates and CJK `年/月/日` dates. Numeric fragments are
/// normalized to a single delimiter and tried against format guesses in a
/// fixed order; the first guess whose year lands in `(1900, today's year]`
/// wins.
pub fn parse_date_fragment(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let parts = numeric_parts(raw);
    if parts.len() == 3 {
        // YYYY/MM/DD, then DD/MM/YYYY, then MM/DD/YYYY.
        let guesses = [
            (parts[0], parts[1], parts[2]),
            (parts[2], parts[1], parts[0]),
            (parts[2], parts[0], parts[1]),
        ];
        for (y, m, d) in guesses {
            if let Some(date) = build_date(y, m, d, today) {
                return Some(date);
            }
        }
    }
    // Generic parse for month-name forms the numeric guesses cannot see.
    parse_month_name(raw, today)
}

/// Split on everything that is not a digit: collapses CJK separators,
/// mixed delimiters and OCR noise in one pass.
fn numeric_parts(raw: &str) -> Vec<i64> {
    raw.split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

fn build_date(y: i64, m: i64, d: i64, today: NaiveDate) -> Option<NaiveDate> {
    if y <= 1900 || y > i64::from(today.year()) {
        return None;
    }
    NaiveDate::from_ymd_opt(y as i32, u32::try_from(m).ok()?, u32::try_from(d).ok()?)
}

fn parse_month_name(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let cleaned = raw.trim().replace(',', " ");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    for fmt in ["%B %d %Y", "%d %B %Y", "%b %d %Y", "%d %b %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, fmt) {
            if date.year() > 1900 && date.year() <= today.year() {
                return Some(date);
            }
        }
    }
    None
}
