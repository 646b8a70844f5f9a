//! Household registry and membership ledger use cases.
//!
//! # Responsibility
//! - Validate household and member input.
//! - Route every roster change through the household repository, which
//!   updates the user link and the roster in one transaction.
//!
//! # Invariants
//! - Only the registry links or unlinks users; see `household_repo`.
//! - A household never survives with an empty roster.
//! - Headship changes only through head removal.

use crate::error::{CoreError, CoreResult};
use crate::model::household::{
    HeadRemovalOutcome, Household, HouseholdId, MemberRemoval, HEAD_RELATIONSHIP,
};
use crate::model::page::{PageWindow, HOUSEHOLD_PAGE_SIZE};
use crate::repo::household_repo::HouseholdRepository;
use crate::service::user_service::parse_national_id;
use crate::service::{log_write, required_text};
use std::time::Instant;

const MODULE: &str = "household";

pub struct HouseholdService<H: HouseholdRepository> {
    repo: H,
}

impl<H: HouseholdRepository> HouseholdService<H> {
    pub fn new(repo: H) -> Self {
        Self { repo }
    }

    /// Creates a household headed by an existing, unlinked user.
    ///
    /// # Errors
    /// - `NotFound` when no user has `head_national_id`.
    /// - `Conflict` when that user already belongs to a household, or the
    ///   name is taken.
    pub fn create_household(
        &self,
        head_national_id: &str,
        name: &str,
        address: &str,
    ) -> CoreResult<Household> {
        let started = Instant::now();
        let result = (|| -> CoreResult<Household> {
            let head = parse_national_id(head_national_id)?;
            let name = required_text(name, "household name")?;
            let address = required_text(address, "address")?;
            Ok(self.repo.create_with_head(&head, &name, &address)?)
        })();
        let fields = match &result {
            Ok(household) => format!(
                "household_id={} head={}",
                household.id, household.head_national_id
            ),
            Err(_) => format!("head={}", head_national_id.trim()),
        };
        log_write("household_create", MODULE, &fields, started, result)
    }

    /// Deletes a household and clears every user link to it.
    ///
    /// Returns how many users were unlinked.
    pub fn delete_household(&self, household_id: HouseholdId) -> CoreResult<usize> {
        let started = Instant::now();
        let result = self
            .repo
            .delete_household(household_id)
            .map_err(CoreError::from);
        let fields = match &result {
            Ok(affected) => format!("household_id={household_id} affected_users={affected}"),
            Err(_) => format!("household_id={household_id}"),
        };
        log_write("household_delete", MODULE, &fields, started, result)
    }

    pub fn get(&self, household_id: HouseholdId) -> CoreResult<Household> {
        self.repo
            .get(household_id)?
            .ok_or_else(|| CoreError::not_found(format!("household not found: {household_id}")))
    }

    pub fn get_by_head(&self, head_national_id: &str) -> CoreResult<Household> {
        let head = parse_national_id(head_national_id)?;
        self.repo
            .get_by_head(&head)?
            .ok_or_else(|| CoreError::not_found(format!("no household is headed by {head}")))
    }

    /// Lists one page of households in creation order; page 0 reads as 1.
    pub fn list_paginated(&self, page: u32) -> CoreResult<Vec<Household>> {
        let window = PageWindow::new(page, HOUSEHOLD_PAGE_SIZE);
        Ok(self.repo.list(window.limit, window.offset)?)
    }

    pub fn count_households(&self) -> CoreResult<u64> {
        Ok(self.repo.count()?)
    }

    /// Adds an unlinked user to the roster and links them to the household.
    ///
    /// # Errors
    /// - `NotFound` when the household or the user is absent.
    /// - `Conflict` when the user already belongs to a household, including
    ///   when a concurrent call linked them first.
    /// - `Validation` for blank fields or a `head` relationship label.
    pub fn add_member(
        &self,
        household_id: HouseholdId,
        national_id: &str,
        name: &str,
        relationship: &str,
    ) -> CoreResult<Household> {
        let started = Instant::now();
        let result = (|| -> CoreResult<Household> {
            let national_id = parse_national_id(national_id)?;
            let name = required_text(name, "member name")?;
            let relationship = required_text(relationship, "relationship")?;
            if relationship.eq_ignore_ascii_case(HEAD_RELATIONSHIP) {
                return Err(CoreError::validation(
                    "relationship `head` is reserved for the household head",
                ));
            }
            Ok(self
                .repo
                .add_member(household_id, &national_id, &name, &relationship)?)
        })();
        log_write(
            "member_add",
            MODULE,
            &format!("household_id={household_id} national_id={}", national_id.trim()),
            started,
            result,
        )
    }

    /// Removes a non-head member from whichever household lists them.
    ///
    /// # Errors
    /// - `NotFound` when the user is absent or belongs to no household.
    /// - `Conflict` when the user is the head of their household.
    pub fn remove_member(&self, national_id: &str) -> CoreResult<Household> {
        let started = Instant::now();
        let result = (|| -> CoreResult<Household> {
            let national_id = parse_national_id(national_id)?;
            Ok(self.repo.remove_member(&national_id, None)?)
        })();
        log_write(
            "member_remove",
            MODULE,
            &format!("national_id={}", national_id.trim()),
            started,
            result,
        )
    }

    /// Removes the head; promotes the first remaining member or deletes the
    /// household when the head was alone.
    pub fn transfer_head_on_removal(
        &self,
        household_id: HouseholdId,
    ) -> CoreResult<HeadRemovalOutcome> {
        let started = Instant::now();
        let result = self.repo.remove_head(household_id).map_err(CoreError::from);
        let fields = match &result {
            Ok(HeadRemovalOutcome::HouseholdDeleted { former_head }) => format!(
                "household_id={household_id} former_head={} outcome=household_deleted",
                former_head.national_id
            ),
            Ok(HeadRemovalOutcome::HeadTransferred {
                former_head,
                new_head,
                ..
            }) => format!(
                "household_id={household_id} former_head={} new_head={} outcome=head_transferred",
                former_head.national_id, new_head.national_id
            ),
            Err(_) => format!("household_id={household_id}"),
        };
        log_write("head_remove", MODULE, &fields, started, result)
    }

    /// Removes `national_id` from `household_id`, taking the head-removal
    /// path when they are the head at write time.
    ///
    /// # Errors
    /// - `NotFound` when the household or user is absent, or the user is not
    ///   on this household's roster.
    pub fn remove_member_from(
        &self,
        household_id: HouseholdId,
        national_id: &str,
    ) -> CoreResult<MemberRemoval> {
        let started = Instant::now();
        let result = (|| -> CoreResult<MemberRemoval> {
            let national_id = parse_national_id(national_id)?;
            Ok(self.repo.remove_from(household_id, &national_id)?)
        })();
        let fields = match &result {
            Ok(MemberRemoval::Member { .. }) => format!(
                "household_id={household_id} national_id={} outcome=member_removed",
                national_id.trim()
            ),
            Ok(MemberRemoval::Head { outcome }) => format!(
                "household_id={household_id} national_id={} outcome={}",
                national_id.trim(),
                match outcome {
                    HeadRemovalOutcome::HouseholdDeleted { .. } => "household_deleted",
                    HeadRemovalOutcome::HeadTransferred { .. } => "head_transferred",
                }
            ),
            Err(_) => format!(
                "household_id={household_id} national_id={}",
                national_id.trim()
            ),
        };
        log_write("member_remove", MODULE, &fields, started, result)
    }
}
