//! Role Hierarchy
//!
//! Fixed set of ranked roles (higher rank = more authority) and the rules
//! for who may assign what. Assignment rules are pure; persisting a role set
//! is the identity store's job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IdentityError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "superAdmin")]
    SuperAdmin,
    #[serde(rename = "nla")]
    Nla,
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "manager")]
    Manager,
    #[serde(rename = "agent")]
    Agent,
    #[serde(rename = "notary")]
    Notary,
    #[serde(rename = "blocker")]
    Blocker,
    #[serde(rename = "paterns")]
    Paterns,
    #[serde(rename = "buyer")]
    Buyer,
}

impl Role {
    /// Highest rank first
    pub const ALL: [Role; 9] = [
        Role::SuperAdmin,
        Role::Nla,
        Role::Admin,
        Role::Manager,
        Role::Agent,
        Role::Notary,
        Role::Blocker,
        Role::Paterns,
        Role::Buyer,
    ];

    /// Role given to self-registered users
    pub const DEFAULT: Role = Role::Buyer;

    #[inline]
    pub const fn rank(&self) -> u8 {
        use Role::*;
        match self {
            SuperAdmin => 9,
            Nla => 8,
            Admin => 7,
            Manager => 6,
            Agent => 5,
            Notary => 4,
            Blocker => 3,
            Paterns => 2,
            Buyer => 1,
        }
    }

    #[inline]
    pub const fn code(&self) -> &'static str {
        use Role::*;
        match self {
            SuperAdmin => "superAdmin",
            Nla => "nla",
            Admin => "admin",
            Manager => "manager",
            Agent => "agent",
            Notary => "notary",
            Blocker => "blocker",
            Paterns => "paterns",
            Buyer => "buyer",
        }
    }

    /// Three-letter prefix used in user codes
    #[inline]
    pub const fn code_prefix(&self) -> &'static str {
        use Role::*;
        match self {
            SuperAdmin => "SPA",
            Nla => "NLA",
            Admin => "ADM",
            Manager => "MGR",
            Agent => "AGT",
            Notary => "NOT",
            Blocker => "BLK",
            Paterns => "PAT",
            Buyer => "BUY",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Role::ALL.into_iter().find(|r| r.code() == code)
    }

    /// May assign any role, including their own and higher
    #[inline]
    pub const fn is_universal_assigner(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Nla)
    }

    /// May use the role-management operation at all
    #[inline]
    pub const fn is_role_manager(&self) -> bool {
        matches!(
            self,
            Role::SuperAdmin | Role::Nla | Role::Admin | Role::Manager
        )
    }

    /// Universal assigners assign anything; everyone else only strictly lower ranks.
    #[inline]
    pub const fn can_assign(&self, target: Role) -> bool {
        self.is_universal_assigner() || self.rank() > target.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Role {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_code(s).ok_or_else(|| IdentityError::UnknownRole(s.to_string()))
    }
}

/// String-level view of the hierarchy, for role codes arriving from callers.
///
/// Unknown codes have rank 0: they can assign nothing and are assignable by
/// anyone who can assign at all.
pub struct RoleHierarchy;

impl RoleHierarchy {
    pub fn rank_of(code: &str) -> u8 {
        Role::from_code(code).map_or(0, |r| r.rank())
    }

    pub fn can_assign_role(acting: &str, target: &str) -> bool {
        match Role::from_code(acting) {
            Some(role) if role.is_universal_assigner() => true,
            _ => Self::rank_of(acting) > Self::rank_of(target),
        }
    }

    pub fn is_valid_role(code: &str) -> bool {
        Role::from_code(code).is_some()
    }

    /// Highest-ranked code; the first one wins on equal rank. `None` if empty.
    pub fn highest_role<'a, S: AsRef<str>>(codes: &'a [S]) -> Option<&'a str> {
        let mut iter = codes.iter().map(|c| c.as_ref());
        let first = iter.next()?;
        Some(iter.fold(first, |best, code| {
            if Self::rank_of(code) > Self::rank_of(best) {
                code
            } else {
                best
            }
        }))
    }

    /// Highest-ranked role of a typed set
    pub fn highest(roles: &[Role]) -> Option<Role> {
        let mut iter = roles.iter().copied();
        let first = iter.next()?;
        Some(iter.fold(first, |best, r| if r.rank() > best.rank() { r } else { best }))
    }
}
