use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::age::{age_on, is_plausible_age, is_plausible_birth_year};

/// Which strategy produced the age-related fields currently stored on an
/// [`IdentityExtraction`]. A lower-precedence source never overwrites the
/// work of a higher-precedence one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeSource {
    /// Derived from a full date of birth. Highest precedence.
    DateOfBirth,
    /// An age figure read directly off the document.
    ExplicitAge,
    /// Derived from a bare birth year. Lowest precedence.
    BirthYear,
}

impl AgeSource {
    fn rank(self) -> u8 {
        match self {
            AgeSource::DateOfBirth => 2,
            AgeSource::ExplicitAge => 1,
            AgeSource::BirthYear => 0,
        }
    }

    fn outranks_or_ties(self, other: Option<AgeSource>) -> bool {
        match other {
            // Equal rank does not displace an already-validated value.
            Some(existing) => self.rank() > existing.rank(),
            None => true,
        }
    }
}

/// Best-effort structured record for an identity document. Fields fill in
/// incrementally as strategies succeed and are never retracted once set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityExtraction {
    pub full_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<u8>,
    pub birth_year: Option<i32>,
    pub nationality: Option<String>,
    pub document_number: Option<String>,
    pub issuance_date: Option<String>,
    pub expiry_date: Option<String>,
    age_source: Option<AgeSource>,
}

impl IdentityExtraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn age_source(&self) -> Option<AgeSource> {
        self.age_source
    }

    /// Store a full date of birth and derive age and birth year from it.
    /// Rejected (returns false, record untouched) when the derived age is
    /// implausible or a same-or-higher precedence source already ran.
    pub fn record_date_of_birth(&mut self, dob: NaiveDate, today: NaiveDate) -> bool {
        if !AgeSource::DateOfBirth.outranks_or_ties(self.age_source) {
            return false;
        }
        let age = age_on(dob, today);
        if !is_plausible_age(age) || !is_plausible_birth_year(dob.year(), today) {
            return false;
        }
        self.date_of_birth = Some(dob);
        self.age = Some(age as u8);
        self.birth_year = Some(dob.year());
        self.age_source = Some(AgeSource::DateOfBirth);
        true
    }

    /// Store an age read directly off the document.
    pub fn record_explicit_age(&mut self, age: i32) -> bool {
        if !AgeSource::ExplicitAge.outranks_or_ties(self.age_source) {
            return false;
        }
        if !is_plausible_age(age) {
            return false;
        }
        self.age = Some(age as u8);
        self.age_source = Some(AgeSource::ExplicitAge);
        true
    }

    /// Store a bare birth year; age becomes the plain year difference
    /// (no month/day available to adjust against).
    pub fn record_birth_year(&mut self, year: i32, today: NaiveDate) -> bool {
        if !AgeSource::BirthYear.outranks_or_ties(self.age_source) {
            return false;
        }
        if !is_plausible_birth_year(year, today) {
            return false;
        }
        let age = today.year() - year;
        if !is_plausible_age(age) {
            return false;
        }
        self.birth_year = Some(year);
        self.age = Some(age as u8);
        self.age_source = Some(AgeSource::BirthYear);
        true
    }

    /// Set `full_name` only if no earlier strategy filled it.
    pub fn fill_full_name(&mut self, name: impl Into<String>) {
        if self.full_name.is_none() {
            let name = name.into();
            if !name.trim().is_empty() {
                self.full_name = Some(name);
            }
        }
    }

    pub fn fill_nationality(&mut self, nationality: impl Into<String>) {
        if self.nationality.is_none() {
            let nationality = nationality.into();
            if !nationality.trim().is_empty() {
                self.nationality = Some(nationality);
            }
        }
    }

    pub fn fill_document_number(&mut self, number: impl Into<String>) {
        if self.document_number.is_none() {
            let number = number.into();
            if !number.trim().is_empty() {
                self.document_number = Some(number);
            }
        }
    }

    pub fn fill_issuance_date(&mut self, date: impl Into<String>) {
        if self.issuance_date.is_none() {
            self.issuance_date = Some(date.into());
        }
    }

    pub fn fill_expiry_date(&mut self, date: impl Into<String>) {
        if self.expiry_date.is_none() {
            self.expiry_date = Some(date.into());
        }
    }
}

/// Extracted fields for a property/legal document. Fields are independent;
/// there are no cross-field invariants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyExtraction {
    pub deed_number: Option<String>,
    pub address: Option<String>,
    pub owner_name: Option<String>,
    pub tax_id: Option<String>,
}

impl PropertyExtraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.deed_number.is_none()
            && self.address.is_none()
            && self.owner_name.is_none()
            && self.tax_id.is_none()
    }
}
