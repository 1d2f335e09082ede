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

//! Error types for loan and catalog operations.

use crate::member::MembershipStatus;
use crate::{BookId, LoanId};
use std::fmt;
use thiserror::Error;

/// Kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Book,
    Member,
    Loan,
    Author,
    Category,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Book => "book",
            Entity::Member => "member",
            Entity::Loan => "loan",
            Entity::Author => "author",
            Entity::Category => "category",
        };
        f.write_str(name)
    }
}

/// Loan lifecycle and catalog errors.
///
/// Every variant is a business-rule rejection: nothing was persisted and
/// retrying the same request will fail the same way.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoanError {
    /// Referenced record does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: u32 },

    /// No copy of the book is on the shelf
    #[error("book {book} is not available for loan")]
    Unavailable { book: BookId },

    /// Member standing does not allow borrowing
    #[error("member's status is {status}, not active")]
    IneligibleMember { status: MembershipStatus },

    /// Loan was already closed
    #[error("loan {loan} has already been returned")]
    AlreadyReturned { loan: LoanId },

    /// Copy count would drop below zero
    #[error("no copies of book {book} left to lend")]
    Capacity { book: BookId },

    /// Due date lies before the loan date
    #[error("due date is before the loan date")]
    InvalidDueDate,

    /// Return date lies before the loan date
    #[error("return date is before the loan date")]
    InvalidReturnDate,

    /// Field may only change through a lifecycle transition
    #[error("field `{field}` cannot be updated directly")]
    ProtectedField { field: &'static str },

    /// Total copies would fall below the copies currently on loan
    #[error("total copies cannot be lower than the copies on loan")]
    InvalidCopies,

    /// Book is still referenced by loan records
    #[error("book {book} still has loan records")]
    BookHasLoans { book: BookId },

    /// Record is still referenced by another record
    #[error("{entity} {id} is still referenced by a {by}")]
    InUse { entity: Entity, id: u32, by: Entity },

    /// Unique key already taken
    #[error("{entity} with {key} already exists")]
    Duplicate { entity: Entity, key: String },
}

impl LoanError {
    pub(crate) fn not_found(entity: Entity, id: u32) -> Self {
        LoanError::NotFound { entity, id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            LoanError::not_found(Entity::Book, 4).to_string(),
            "book 4 not found"
        );
        assert_eq!(
            LoanError::Unavailable { book: BookId(4) }.to_string(),
            "book 4 is not available for loan"
        );
        assert_eq!(
            LoanError::IneligibleMember {
                status: MembershipStatus::Suspended
            }
            .to_string(),
            "member's status is suspended, not active"
        );
        assert_eq!(
            LoanError::AlreadyReturned { loan: LoanId(9) }.to_string(),
            "loan 9 has already been returned"
        );
        assert_eq!(
            LoanError::Capacity { book: BookId(1) }.to_string(),
            "no copies of book 1 left to lend"
        );
        assert_eq!(
            LoanError::ProtectedField {
                field: "fine_amount"
            }
            .to_string(),
            "field `fine_amount` cannot be updated directly"
        );
        assert_eq!(
            LoanError::Duplicate {
                entity: Entity::Member,
                key: "email a@b.org".into()
            }
            .to_string(),
            "member with email a@b.org already exists"
        );
        assert_eq!(
            LoanError::InUse {
                entity: Entity::Author,
                id: 2,
                by: Entity::Book
            }
            .to_string(),
            "author 2 is still referenced by a book"
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = LoanError::InvalidDueDate;
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
