//! Household aggregate and its embedded member roster.
//!
//! # Invariants
//! - `head_national_id` equals the national ID of exactly one member while
//!   the household exists.
//! - Member order is the stored roster order; head transfer promotes the
//!   first non-head member in that order.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable household identifier.
pub type HouseholdId = Uuid;

/// Relationship label carried by the member who is head.
pub const HEAD_RELATIONSHIP: &str = "head";

/// One roster entry inside a household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub national_id: String,
    pub name: String,
    /// Relationship to the head, e.g. `head`, `spouse`, `child`.
    pub relationship: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    pub id: HouseholdId,
    /// Display name, unique across households.
    pub name: String,
    pub address: String,
    pub head_name: String,
    pub head_national_id: String,
    pub members: Vec<Member>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

impl Household {
    /// Returns the roster entry of the current head.
    pub fn head(&self) -> Option<&Member> {
        self.members
            .iter()
            .find(|member| member.national_id == self.head_national_id)
    }

    pub fn has_member(&self, national_id: &str) -> bool {
        self.members
            .iter()
            .any(|member| member.national_id == national_id)
    }

    /// Checks the headship invariant: exactly one member is the head.
    pub fn is_consistent(&self) -> bool {
        self.members
            .iter()
            .filter(|member| member.national_id == self.head_national_id)
            .count()
            == 1
    }

}

/// Compact household projection attached to bill listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdSummary {
    pub id: HouseholdId,
    pub name: String,
    pub head_national_id: String,
    pub address: String,
}

/// Result of removing the head of a household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HeadRemovalOutcome {
    /// The head was the last member; the household no longer exists.
    HouseholdDeleted { former_head: Member },
    /// The first remaining member became head.
    HeadTransferred {
        former_head: Member,
        new_head: Member,
        household: Household,
    },
}

/// Result of removing one named member from a named household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "removed", rename_all = "snake_case")]
pub enum MemberRemoval {
    /// A non-head member left; the remaining household is returned.
    Member { household: Household },
    /// The head left; see [`HeadRemovalOutcome`].
    Head { outcome: HeadRemovalOutcome },
}

#[cfg(test)]
mod tests {
    use super::{Household, Member, HEAD_RELATIONSHIP};
    use uuid::Uuid;

    fn member(id: &str, relationship: &str) -> Member {
        Member {
            national_id: id.to_string(),
            name: format!("name-{id}"),
            relationship: relationship.to_string(),
        }
    }

    fn household(head: &str, members: Vec<Member>) -> Household {
        Household {
            id: Uuid::new_v4(),
            name: "Block A 101".to_string(),
            address: "1 Tran Phu".to_string(),
            head_name: format!("name-{head}"),
            head_national_id: head.to_string(),
            members,
            created_at: 0,
        }
    }

    #[test]
    fn head_lookup_and_consistency() {
        let h = household(
            "A",
            vec![member("A", HEAD_RELATIONSHIP), member("B", "spouse")],
        );
        assert_eq!(h.head().map(|m| m.national_id.as_str()), Some("A"));
        assert!(h.is_consistent());
        assert!(h.has_member("B"));
        assert!(!h.has_member("C"));
    }

    #[test]
    fn missing_head_is_inconsistent() {
        let h = household("A", vec![member("B", "spouse")]);
        assert!(h.head().is_none());
        assert!(!h.is_consistent());
    }
}
