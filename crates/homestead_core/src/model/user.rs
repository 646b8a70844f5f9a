//! Resident identity record as seen by the ledger.
//!
//! Users are owned by an external identity store; the ledger only reads them
//! and maintains the `household_id` back-link through membership operations.

use crate::model::household::HouseholdId;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NATIONAL_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{0,31}$").expect("valid national id regex"));

/// Resident identity keyed by national ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Natural key shared with household member entries.
    pub national_id: String,
    pub name: String,
    /// Opaque hash produced by the identity store. Never logged or serialized.
    #[serde(skip_serializing, default)]
    pub credential_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    /// Written only by membership operations.
    pub household_id: Option<HouseholdId>,
}

/// Optional contact details supplied at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Partial profile update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.date_of_birth.is_none()
    }
}

/// Trims and checks a national ID.
///
/// Returns `None` for blank values or values containing characters outside
/// `[A-Za-z0-9-]` (max 32 chars).
pub fn normalize_national_id(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if NATIONAL_ID_RE.is_match(trimmed) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_national_id;

    #[test]
    fn national_id_is_trimmed() {
        assert_eq!(
            normalize_national_id("  001203004567 ").as_deref(),
            Some("001203004567")
        );
    }

    #[test]
    fn national_id_rejects_blank_and_spaces() {
        assert_eq!(normalize_national_id("   "), None);
        assert_eq!(normalize_national_id("0012 0300"), None);
        assert_eq!(normalize_national_id("-leading"), None);
    }
}
