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

//! Loan records.
//!
//! A loan is stored in one of two states:
//!
//! ```text
//!  Borrowed ──return──► Returned
//!     │
//!     └──delete──► (removed, copy back on the shelf)
//! ```
//!
//! [`LoanStatus::Overdue`] is never stored. It is derived from the due date
//! by [`Loan::effective_status`].

use crate::base::{BookId, LoanId, MemberId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Borrowed,
    Returned,
    Overdue,
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoanStatus::Borrowed => "borrowed",
            LoanStatus::Returned => "returned",
            LoanStatus::Overdue => "overdue",
        };
        f.write_str(name)
    }
}

impl FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "borrowed" => Ok(LoanStatus::Borrowed),
            "returned" => Ok(LoanStatus::Returned),
            "overdue" => Ok(LoanStatus::Overdue),
            other => Err(format!("unknown loan status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Loan {
    pub id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,
    #[serde(serialize_with = "serialize_money")]
    pub fine_amount: Decimal,
}

impl Loan {
    /// Money is reported with cent precision.
    pub const MONEY_PRECISION: u32 = 2;

    pub(crate) fn borrowed(
        id: LoanId,
        book_id: BookId,
        member_id: MemberId,
        loan_date: NaiveDate,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            book_id,
            member_id,
            loan_date,
            due_date,
            return_date: None,
            status: LoanStatus::Borrowed,
            fine_amount: Decimal::ZERO,
        }
    }

    /// A loan is open while its copy is off the shelf.
    pub fn is_open(&self) -> bool {
        self.status != LoanStatus::Returned
    }

    /// Status as shown to patrons on `today`.
    ///
    /// Open loans past their due date read as [`LoanStatus::Overdue`].
    pub fn effective_status(&self, today: NaiveDate) -> LoanStatus {
        match self.status {
            LoanStatus::Returned => LoanStatus::Returned,
            _ if self.due_date < today => LoanStatus::Overdue,
            _ => LoanStatus::Borrowed,
        }
    }
}

fn serialize_money<S>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    Serialize::serialize(&amount.round_dp(Loan::MONEY_PRECISION), serializer)
}

/// Partial update of a loan.
///
/// Only `due_date` is a plain edit. Setting `status` to returned (optionally
/// with `return_date`) runs the return transition; every other combination
/// is rejected with [`crate::LoanError::ProtectedField`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoanUpdate {
    pub due_date: Option<NaiveDate>,
    pub status: Option<LoanStatus>,
    pub return_date: Option<NaiveDate>,
    pub fine_amount: Option<Decimal>,
}

/// Loan listing predicates. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoanFilter {
    pub member_id: Option<MemberId>,
    pub book_id: Option<BookId>,
    /// Compared against [`Loan::effective_status`].
    pub status: Option<LoanStatus>,
}

impl LoanFilter {
    pub fn member(member_id: MemberId) -> Self {
        Self {
            member_id: Some(member_id),
            ..Self::default()
        }
    }

    pub fn book(book_id: BookId) -> Self {
        Self {
            book_id: Some(book_id),
            ..Self::default()
        }
    }

    pub fn status(status: LoanStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, loan: &Loan, today: NaiveDate) -> bool {
        self.member_id.is_none_or(|id| loan.member_id == id)
            && self.book_id.is_none_or(|id| loan.book_id == id)
            && self
                .status
                .is_none_or(|status| loan.effective_status(today) == status)
    }
}
