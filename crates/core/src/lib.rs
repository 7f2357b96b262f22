pub mod age;
pub mod document;
pub mod record;

pub use age::{age_on, is_plausible_age, is_plausible_birth_year};
pub use document::DocumentKind;
pub use record::{AgeSource, IdentityExtraction, PropertyExtraction};
