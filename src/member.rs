// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Library members and their borrowing standing.

use crate::base::{MemberId, nullable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    #[default]
    Active,
    Expired,
    Suspended,
}

impl MembershipStatus {
    /// Only active members may open new loans.
    pub fn can_borrow(self) -> bool {
        self == MembershipStatus::Active
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Expired => "expired",
            MembershipStatus::Suspended => "suspended",
        };
        f.write_str(name)
    }
}

impl FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(MembershipStatus::Active),
            "expired" => Ok(MembershipStatus::Expired),
            "suspended" => Ok(MembershipStatus::Suspended),
            other => Err(format!("unknown membership status `{other}`")),
        }
    }
}

/// Registered library member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub id: MemberId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub membership_date: NaiveDate,
    pub membership_status: MembershipStatus,
}

/// Registration request for a new member.
///
/// `membership_date` defaults to the library's current date.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMember {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub membership_date: Option<NaiveDate>,
    #[serde(default)]
    pub membership_status: MembershipStatus,
}

impl NewMember {
    pub fn new(first_name: &str, last_name: &str, email: &str) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: MembershipStatus) -> Self {
        self.membership_status = status;
        self
    }
}

/// Fields that may be edited on an existing member.
///
/// `None` leaves a field alone; `Some(None)` clears an optional one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub address: Option<Option<String>>,
    pub membership_status: Option<MembershipStatus>,
}

/// Member listing predicates. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    /// Case-insensitive substring of the first or last name.
    pub name: Option<String>,
    pub status: Option<MembershipStatus>,
}

impl MemberFilter {
    pub fn status(status: MembershipStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, member: &Member) -> bool {
        if let Some(name) = &self.name {
            let name = name.to_lowercase();
            if !member.first_name.to_lowercase().contains(&name)
                && !member.last_name.to_lowercase().contains(&name)
            {
                return false;
            }
        }
        self.status
            .is_none_or(|status| member.membership_status == status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_members_can_borrow() {
        assert!(MembershipStatus::Active.can_borrow());
        assert!(!MembershipStatus::Expired.can_borrow());
        assert!(!MembershipStatus::Suspended.can_borrow());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(" Suspended ".parse(), Ok(MembershipStatus::Suspended));
        assert!("banned".parse::<MembershipStatus>().is_err());
    }

    #[test]
    fn new_member_defaults_to_active() {
        let member = NewMember::new("Ada", "Lovelace", "ada@example.org");
        assert_eq!(member.membership_status, MembershipStatus::Active);
        assert!(member.membership_date.is_none());
    }

    fn member(first: &str, last: &str, status: MembershipStatus) -> Member {
        Member {
            id: MemberId(1),
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: "someone@example.org".to_string(),
            phone: None,
            address: None,
            membership_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            membership_status: status,
        }
    }

    #[test]
    fn filter_matches_either_name_and_status() {
        let ada = member("Ada", "Lovelace", MembershipStatus::Active);
        let by_last = MemberFilter {
            name: Some("LOVE".into()),
            ..MemberFilter::default()
        };
        let by_first = MemberFilter {
            name: Some("ad".into()),
            ..MemberFilter::default()
        };
        assert!(by_last.matches(&ada));
        assert!(by_first.matches(&ada));
        assert!(MemberFilter::status(MembershipStatus::Active).matches(&ada));
        assert!(!MemberFilter::status(MembershipStatus::Expired).matches(&ada));

        let both = MemberFilter {
            name: Some("grace".into()),
            status: Some(MembershipStatus::Active),
        };
        assert!(!both.matches(&ada));
    }
}
