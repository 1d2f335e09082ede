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

//! # Library Loans
//!
//! This library provides a loan engine for a small lending library: it opens,
//! returns and deletes loans while keeping every book's available-copy count,
//! each loan's status and its overdue fine consistent with one another.
//!
//! ## Core Components
//!
//! - [`Library`]: Loan lifecycle engine (open, return, renew, delete)
//! - [`Store`]: Thread-safe records for books, members, loans, authors and categories
//! - [`Book`]: Catalog entry owning the availability ledger
//! - [`FinePolicy`]: Per-day charge for late returns
//! - [`LoanError`]: Error types for rejected transitions
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use library_loans::{FinePolicy, FixedClock, Library, LoanStatus, NewBook, NewMember};
//! use rust_decimal_macros::dec;
//!
//! let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let library = Library::with_clock(FinePolicy::default(), FixedClock(today));
//!
//! let book = library.store().add_book(NewBook::new("Dune", 1)).unwrap();
//! let member = library
//!     .add_member(NewMember::new("Ada", "Lovelace", "ada@example.org"))
//!     .unwrap();
//!
//! // Lend the only copy
//! let loan = library.open_loan(book.id, member.id, today).unwrap();
//! assert_eq!(library.store().get_book(book.id).unwrap().available_copies(), 0);
//!
//! // Return it ten days late
//! let returned = library
//!     .return_loan(loan.id, NaiveDate::from_ymd_opt(2024, 1, 11))
//!     .unwrap();
//! assert_eq!(returned.status, LoanStatus::Returned);
//! assert_eq!(returned.fine_amount, dec!(5.00));
//! ```
//!
//! ## Thread Safety
//!
//! Each book is locked for the duration of a loan transition, so concurrent
//! requests on different books proceed in parallel while requests on the same
//! book are applied one at a time.

mod base;
mod book;
mod catalog;
mod clock;
pub mod config;
mod engine;
pub mod error;
mod fine;
mod journal;
mod loan;
mod member;
mod store;

pub use base::{AuthorId, BookId, CategoryId, LoanId, MemberId};
pub use book::{Book, BookFilter, BookUpdate, NewBook};
pub use catalog::{Author, AuthorUpdate, Category, CategoryUpdate, NewAuthor, NewCategory};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, LibraryConfig};
pub use engine::Library;
pub use error::{Entity, LoanError};
pub use fine::FinePolicy;
pub use journal::LoanEvent;
pub use loan::{Loan, LoanFilter, LoanStatus, LoanUpdate};
pub use member::{Member, MemberFilter, MemberUpdate, MembershipStatus, NewMember};
pub use store::Store;
