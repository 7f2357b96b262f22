use chrono::{Datelike, NaiveDate};

/// Age in whole years on `today`, decremented when the birthday has not yet
/// occurred this year. Negative results (DOB in the future) are clamped by
/// the caller via [`is_plausible_age`].
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

/// Ages outside (0, 120) are extraction noise, never stored.
pub fn is_plausible_age(age: i32) -> bool {
    age > 0 && age < 120
}

/// Birth years outside (1900, current_year] are extraction noise.
pub fn is_plausible_birth_year(year: i32, today: NaiveDate) -> bool {
    year > 1900 && year <= today.year()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn age_day_before_birthday() {
        assert_eq!(age_on(d(2000, 3, 15), d(2024, 3, 14)), 23);
    }

    #[test]
    fn age_on_birthday() {
        assert_eq!(age_on(d(2000, 3, 15), d(2024, 3, 15)), 24);
    }

    #[test]
    fn age_day_after_birthday() {
        assert_eq!(age_on(d(2000, 3, 15), d(2024, 3, 16)), 24);
    }

    #[test]
    fn age_handles_year_end_boundary() {
        assert_eq!(age_on(d(1999, 12, 31), d(2024, 1, 1)), 24);
        assert_eq!(age_on(d(1999, 12, 31), d(2023, 12, 31)), 24);
        assert_eq!(age_on(d(1999, 12, 31), d(2023, 12, 30)), 23);
    }

    #[test]
    fn plausible_age_bounds_are_exclusive() {
        assert!(!is_plausible_age(0));
        assert!(is_plausible_age(1));
        assert!(is_plausible_age(119));
        assert!(!is_plausible_age(120));
        assert!(!is_plausible_age(-3));
    }

    #[test]
    fn plausible_birth_year_bounds() {
        let today = d(2024, 6, 1);
        assert!(!is_plausible_birth_year(1900, today));
        assert!(is_plausible_birth_year(1901, today));
        assert!(is_plausible_birth_year(2024, today));
        assert!(!is_plausible_birth_year(2025, today));
    }
}
