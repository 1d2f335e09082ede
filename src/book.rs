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

//! Book records and the availability ledger.
//!
//! A book's `available_copies` is only moved by loan transitions:
//!
//! ```text
//!  open loan ──decrement_on_open──►  available - 1   (fails at 0)
//!  return / delete open loan ──increment_on_close──►  available + 1   (capped at total)
//! ```
//!
//! so that at any time `available_copies = total_copies - open loans`.
//!
//! # Example
//!
//! ```
//! use library_loans::{Book, BookId, NewBook};
//!
//! let book = Book::new(BookId(1), NewBook::new("Dune", 2));
//! assert_eq!(book.available_copies(), 2);
//! assert_eq!(book.on_loan(), 0);
//! ```

use crate::base::{AuthorId, BookId, CategoryId, nullable};
use crate::error::LoanError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
    pub publisher: Option<String>,
    pub category_id: Option<CategoryId>,
    pub author_ids: Vec<AuthorId>,
    total_copies: u32,
    available_copies: u32,
}

impl Book {
    /// Creates a book with every copy on the shelf.
    pub fn new(id: BookId, new: NewBook) -> Self {
        Self {
            id,
            title: new.title,
            isbn: new.isbn,
            publication_year: new.publication_year,
            publisher: new.publisher,
            category_id: new.category_id,
            author_ids: new.author_ids,
            total_copies: new.total_copies,
            available_copies: new.total_copies,
        }
    }

    pub fn total_copies(&self) -> u32 {
        self.total_copies
    }

    pub fn available_copies(&self) -> u32 {
        self.available_copies
    }

    /// Copies currently lent out.
    pub fn on_loan(&self) -> u32 {
        self.total_copies - self.available_copies
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.available_copies <= self.total_copies,
            "Invariant violated: available copies {} exceed total copies {}",
            self.available_copies,
            self.total_copies
        );
    }

    /// Takes one copy off the shelf for a new loan.
    pub(crate) fn decrement_on_open(&mut self) -> Result<(), LoanError> {
        if self.available_copies == 0 {
            return Err(LoanError::Capacity { book: self.id });
        }
        self.available_copies -= 1;
        self.assert_invariants();
        Ok(())
    }

    /// Puts one copy back on the shelf when a loan closes.
    ///
    /// Never exceeds `total_copies`, so a duplicate close cannot mint copies.
    pub(crate) fn increment_on_close(&mut self) {
        if self.available_copies < self.total_copies {
            self.available_copies += 1;
        }
        self.assert_invariants();
    }

    /// Changes the number of owned copies, keeping the copies on loan fixed.
    pub(crate) fn set_total_copies(&mut self, total: u32) -> Result<(), LoanError> {
        let on_loan = self.on_loan();
        if total < on_loan {
            return Err(LoanError::InvalidCopies);
        }
        self.total_copies = total;
        self.available_copies = total - on_loan;
        self.assert_invariants();
        Ok(())
    }
}

/// Catalog entry for a new title.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
    pub publisher: Option<String>,
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub author_ids: Vec<AuthorId>,
    pub total_copies: u32,
}

impl NewBook {
    pub fn new(title: &str, total_copies: u32) -> Self {
        Self {
            title: title.to_string(),
            total_copies,
            ..Self::default()
        }
    }
}

/// Fields an administrator may edit on an existing book.
///
/// `None` leaves a field alone. Optional fields take `Some(None)` to clear
/// them. `available_copies` is not editable; it only moves with loans.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub isbn: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub publication_year: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub publisher: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<CategoryId>>,
    pub author_ids: Option<Vec<AuthorId>>,
    pub total_copies: Option<u32>,
}

/// Book listing predicates. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    pub author_id: Option<AuthorId>,
    pub category_id: Option<CategoryId>,
}

impl BookFilter {
    pub fn matches(&self, book: &Book) -> bool {
        if let Some(title) = &self.title {
            if !book.title.to_lowercase().contains(&title.to_lowercase()) {
                return false;
            }
        }
        if let Some(author_id) = self.author_id {
            if !book.author_ids.contains(&author_id) {
                return false;
            }
        }
        if let Some(category_id) = self.category_id {
            if book.category_id != Some(category_id) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(copies: u32) -> Book {
        Book::new(BookId(1), NewBook::new("Dune", copies))
    }

    #[test]
    fn decrement_takes_one_copy() {
        let mut book = book(2);
        book.decrement_on_open().unwrap();
        assert_eq!(book.available_copies(), 1);
        assert_eq!(book.on_loan(), 1);
    }

    #[test]
    fn decrement_at_zero_is_capacity_error() {
        let mut book = book(1);
        book.decrement_on_open().unwrap();
        assert_eq!(
            book.decrement_on_open(),
            Err(LoanError::Capacity { book: BookId(1) })
        );
        assert_eq!(book.available_copies(), 0);
    }

    #[test]
    fn increment_is_clamped_to_total() {
        let mut book = book(1);
        book.decrement_on_open().unwrap();
        book.increment_on_close();
        book.increment_on_close();
        assert_eq!(book.available_copies(), 1);
    }

    #[test]
    fn growing_total_adds_shelf_copies() {
        let mut book = book(2);
        book.decrement_on_open().unwrap();
        book.set_total_copies(5).unwrap();
        assert_eq!(book.total_copies(), 5);
        assert_eq!(book.available_copies(), 4);
    }

    #[test]
    fn shrinking_total_below_loans_is_rejected() {
        let mut book = book(3);
        book.decrement_on_open().unwrap();
        book.decrement_on_open().unwrap();
        assert_eq!(book.set_total_copies(1), Err(LoanError::InvalidCopies));
        assert_eq!(book.total_copies(), 3);
        book.set_total_copies(2).unwrap();
        assert_eq!(book.available_copies(), 0);
    }

    #[test]
    fn filter_matches_title_author_and_category() {
        let mut book = book(1);
        book.author_ids = vec![AuthorId(3)];
        book.category_id = Some(CategoryId(2));

        let by_title = BookFilter {
            title: Some("dUN".into()),
            ..BookFilter::default()
        };
        assert!(by_title.matches(&book));

        let by_author = BookFilter {
            author_id: Some(AuthorId(4)),
            ..BookFilter::default()
        };
        assert!(!by_author.matches(&book));

        let by_category = BookFilter {
            category_id: Some(CategoryId(2)),
            ..BookFilter::default()
        };
        assert!(by_category.matches(&book));
    }
}
