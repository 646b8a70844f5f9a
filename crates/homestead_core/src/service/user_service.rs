//! Identity store adapter.
//!
//! Registration and profile edits only; the household link is owned by
//! [`crate::service::household_service`] and never written here.

use crate::error::{CoreError, CoreResult};
use crate::model::user::{normalize_national_id, ProfileUpdate, User, UserProfile};
use crate::repo::user_repo::UserRepository;
use crate::service::{log_write, required_text};
use std::time::Instant;

const MODULE: &str = "user";

pub struct UserService<U: UserRepository> {
    repo: U,
}

impl<U: UserRepository> UserService<U> {
    pub fn new(repo: U) -> Self {
        Self { repo }
    }

    /// Registers a user with no household link.
    ///
    /// `credential_hash` is stored as given; hashing happens upstream.
    ///
    /// # Errors
    /// - `Validation` for a malformed national ID or blank name/credential.
    /// - `Conflict` when the national ID is already registered.
    pub fn register_user(
        &self,
        national_id: &str,
        name: &str,
        credential_hash: &str,
        profile: UserProfile,
    ) -> CoreResult<User> {
        let started = Instant::now();
        let result = (|| -> CoreResult<User> {
            let national_id = parse_national_id(national_id)?;
            let user = User {
                name: required_text(name, "name")?,
                credential_hash: required_text(credential_hash, "credential hash")?,
                phone: profile.phone,
                address: profile.address,
                date_of_birth: profile.date_of_birth,
                household_id: None,
                national_id,
            };
            self.repo.create_user(&user)?;
            Ok(user)
        })();
        log_write(
            "user_register",
            MODULE,
            &format!("national_id={}", national_id.trim()),
            started,
            result,
        )
    }

    pub fn get_user(&self, national_id: &str) -> CoreResult<User> {
        let national_id = parse_national_id(national_id)?;
        self.repo
            .get_user(&national_id)?
            .ok_or_else(|| CoreError::not_found(format!("user not found: {national_id}")))
    }

    /// Applies the non-empty fields of `update`.
    pub fn update_profile(&self, national_id: &str, update: ProfileUpdate) -> CoreResult<User> {
        let started = Instant::now();
        let result = (|| -> CoreResult<User> {
            let national_id = parse_national_id(national_id)?;
            if update.is_empty() {
                return Err(CoreError::validation("profile update carries no fields"));
            }
            let update = ProfileUpdate {
                name: update
                    .name
                    .as_deref()
                    .map(|name| required_text(name, "name"))
                    .transpose()?,
                ..update
            };
            Ok(self.repo.update_profile(&national_id, &update)?)
        })();
        log_write(
            "user_update_profile",
            MODULE,
            &format!("national_id={}", national_id.trim()),
            started,
            result,
        )
    }
}

/// Normalizes a caller-supplied national ID or fails with `Validation`.
pub(crate) fn parse_national_id(value: &str) -> CoreResult<String> {
    normalize_national_id(value)
        .ok_or_else(|| CoreError::validation(format!("invalid national id: `{}`", value.trim())))
}
