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

//! Loan lifecycle engine.
//!
//! The [`Library`] is the central component that opens, returns and deletes
//! loans while keeping each book's copy count in step with its open loans.
//!
//! # Transitions
//!
//! - **Open**: checks the book, its availability and the member's standing, then
//!   lends one copy.
//! - **Return**: closes an open loan, puts the copy back and charges a fine
//!   for every day past the due date.
//! - **Delete**: removes a loan, putting the copy back first if it was still open.
//! - **Renew**: moves the due date of an open loan.
//!
//! # Thread Safety
//!
//! Every transition runs inside one [`Store::transaction`] on the loan's book.
//! Transitions on different books run in parallel; transitions on the same
//! book are serialized, so two requests can never lend the same last copy.

use crate::base::{BookId, LoanId, MemberId};
use crate::clock::{Clock, SystemClock};
use crate::config::LibraryConfig;
use crate::error::{Entity, LoanError};
use crate::fine::FinePolicy;
use crate::journal::LoanEvent;
use crate::loan::{Loan, LoanFilter, LoanStatus, LoanUpdate};
use crate::member::{Member, NewMember};
use crate::store::{BookTransaction, Store};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Loan lifecycle engine bound to a store, a fine policy and a clock.
///
/// # Invariants
///
/// - `0 <= available_copies <= total_copies` for every book.
/// - `available_copies = total_copies - open loans on the book`.
/// - A loan's `fine_amount` is non-zero only if it was returned after its due date.
/// - A rejected transition persists nothing.
pub struct Library {
    store: Store,
    policy: FinePolicy,
    clock: Box<dyn Clock>,
}

impl Library {
    /// Creates an empty library with the default fine rate and the system clock.
    pub fn new() -> Self {
        Self::with_clock(FinePolicy::default(), SystemClock)
    }

    pub fn with_clock(policy: FinePolicy, clock: impl Clock + 'static) -> Self {
        Library {
            store: Store::new(),
            policy,
            clock: Box::new(clock),
        }
    }

    pub fn from_config(config: &LibraryConfig, clock: impl Clock + 'static) -> Self {
        Self::with_clock(config.fine_policy(), clock)
    }

    /// Catalog and member records.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn fine_policy(&self) -> FinePolicy {
        self.policy
    }

    /// Lends one copy of a book to a member.
    ///
    /// Preconditions are checked in order and the first failure wins.
    ///
    /// # Errors
    ///
    /// - [`LoanError::NotFound`] - Book does not exist.
    /// - [`LoanError::Unavailable`] - Every copy is on loan.
    /// - [`LoanError::NotFound`] - Member does not exist.
    /// - [`LoanError::IneligibleMember`] - Member is not active.
    /// - [`LoanError::InvalidDueDate`] - Due date is before today.
    pub fn open_loan(
        &self,
        book_id: BookId,
        member_id: MemberId,
        due_date: NaiveDate,
    ) -> Result<Loan, LoanError> {
        let loan_date = self.today();
        // Held until the loan is committed, so the member cannot be removed under it.
        let _references = self.store.pin_references();

        let loan = self
            .store
            .transaction(book_id, |tx| {
                if tx.book().available_copies() == 0 {
                    return Err(LoanError::Unavailable { book: book_id });
                }

                let member = self
                    .store
                    .get_member(member_id)
                    .ok_or_else(|| LoanError::not_found(Entity::Member, member_id.0))?;
                if !member.membership_status.can_borrow() {
                    return Err(LoanError::IneligibleMember {
                        status: member.membership_status,
                    });
                }

                if due_date < loan_date {
                    return Err(LoanError::InvalidDueDate);
                }

                tx.book_mut().decrement_on_open()?;
                let loan = Loan::borrowed(
                    self.store.next_loan_id(),
                    book_id,
                    member_id,
                    loan_date,
                    due_date,
                );
                tx.put_loan(loan.clone());
                tx.record(LoanEvent::Opened {
                    loan: loan.id,
                    book: book_id,
                    member: member_id,
                    due_date,
                });
                Ok((loan, tx.book().available_copies()))
            })
            .inspect_err(|e| debug!(book = %book_id, member = %member_id, "open rejected: {e}"));

        let (loan, available) = loan?;
        info!(loan = %loan.id, book = %book_id, member = %member_id, available, "loan opened");
        Ok(loan)
    }

    /// Closes an open loan. `return_date` defaults to today.
    ///
    /// # Errors
    ///
    /// - [`LoanError::NotFound`] - Loan does not exist.
    /// - [`LoanError::AlreadyReturned`] - Loan was closed before.
    /// - [`LoanError::InvalidReturnDate`] - Return date is before the loan date.
    pub fn return_loan(
        &self,
        loan_id: LoanId,
        return_date: Option<NaiveDate>,
    ) -> Result<Loan, LoanError> {
        let loan = self
            .with_loan(loan_id, |tx, loan| self.close(tx, loan, return_date))
            .inspect_err(|e| debug!(loan = %loan_id, "return rejected: {e}"))?;
        log_return(&loan);
        Ok(loan)
    }

    /// Removes a loan record, putting its copy back first if it was still out.
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::NotFound`] if the loan does not exist.
    pub fn delete_loan(&self, loan_id: LoanId) -> Result<(), LoanError> {
        let loan = self
            .with_loan(loan_id, |tx, loan| {
                if loan.is_open() {
                    tx.book_mut().increment_on_close();
                }
                tx.remove_loan(loan_id);
                tx.record(LoanEvent::Deleted {
                    loan: loan_id,
                    book: loan.book_id,
                    was_open: loan.is_open(),
                });
                Ok(loan)
            })
            .inspect_err(|e| debug!(loan = %loan_id, "delete rejected: {e}"))?;

        info!(loan = %loan_id, book = %loan.book_id, was_open = loan.is_open(), "loan deleted");
        Ok(())
    }

    /// Moves the due date of an open loan.
    ///
    /// # Errors
    ///
    /// - [`LoanError::NotFound`] - Loan does not exist.
    /// - [`LoanError::AlreadyReturned`] - Loan is closed.
    /// - [`LoanError::InvalidDueDate`] - New due date is before the loan date.
    pub fn renew_loan(&self, loan_id: LoanId, due_date: NaiveDate) -> Result<Loan, LoanError> {
        self.update_loan(
            loan_id,
            LoanUpdate {
                due_date: Some(due_date),
                ..LoanUpdate::default()
            },
        )
    }

    /// Applies a partial update.
    ///
    /// | Fields set | Effect |
    /// |------------|--------|
    /// | `due_date` | Renews an open loan |
    /// | `status = returned` (+ `return_date`, `due_date`) | Same as [`Library::return_loan`] |
    /// | other `status`, bare `return_date`, `fine_amount` | [`LoanError::ProtectedField`] |
    ///
    /// The whole update is one transaction: a rejected part rejects all of it.
    pub fn update_loan(&self, loan_id: LoanId, update: LoanUpdate) -> Result<Loan, LoanError> {
        let LoanUpdate {
            due_date,
            status,
            return_date,
            fine_amount,
        } = update;

        if fine_amount.is_some() {
            return Err(LoanError::ProtectedField {
                field: "fine_amount",
            });
        }
        let returning = match status {
            Some(LoanStatus::Returned) => true,
            Some(_) => return Err(LoanError::ProtectedField { field: "status" }),
            None if return_date.is_some() => {
                return Err(LoanError::ProtectedField {
                    field: "return_date",
                });
            }
            None => false,
        };

        let loan = self
            .with_loan(loan_id, |tx, mut loan| {
                if let Some(due_date) = due_date {
                    if !loan.is_open() {
                        return Err(LoanError::AlreadyReturned { loan: loan_id });
                    }
                    if due_date < loan.loan_date {
                        return Err(LoanError::InvalidDueDate);
                    }
                    loan.due_date = due_date;
                    tx.record(LoanEvent::Renewed {
                        loan: loan_id,
                        due_date,
                    });
                }
                if returning {
                    return self.close(tx, loan, return_date);
                }
                tx.put_loan(loan.clone());
                Ok(loan)
            })
            .inspect_err(|e| debug!(loan = %loan_id, "update rejected: {e}"))?;

        if let Some(due_date) = due_date {
            info!(loan = %loan_id, %due_date, "loan renewed");
        }
        if returning {
            log_return(&loan);
        }
        Ok(loan)
    }

    /// Registers a member, dating the membership today unless told otherwise.
    pub fn add_member(&self, new: NewMember) -> Result<Member, LoanError> {
        self.store.add_member(new, self.today())
    }

    /// Loans matching `filter`; status filters see overdue loans as of today.
    pub fn list_loans(&self, filter: &LoanFilter) -> Vec<Loan> {
        self.store.list_loans(filter, self.today())
    }

    /// Sum of the fines recorded on loans matching `filter`.
    pub fn total_fines(&self, filter: &LoanFilter) -> Decimal {
        self.list_loans(filter)
            .iter()
            .map(|loan| loan.fine_amount)
            .sum()
    }

    /// Committed transitions since the last call, oldest first.
    pub fn events(&self) -> Vec<LoanEvent> {
        self.store.drain_events()
    }

    /// Runs `work` on the current state of a loan inside its book's transaction.
    fn with_loan<T, F>(&self, loan_id: LoanId, work: F) -> Result<T, LoanError>
    where
        F: FnOnce(&mut BookTransaction<'_>, Loan) -> Result<T, LoanError>,
    {
        let not_found = || LoanError::not_found(Entity::Loan, loan_id.0);
        let book_id = self.store.get_loan(loan_id).ok_or_else(not_found)?.book_id;

        self.store.transaction(book_id, |tx| {
            // Re-read under the book lock; the loan may have moved on since.
            let loan = tx.loan(loan_id).ok_or_else(not_found)?;
            work(tx, loan)
        })
    }

    /// Return procedure shared by [`Library::return_loan`] and [`Library::update_loan`].
    fn close(
        &self,
        tx: &mut BookTransaction<'_>,
        mut loan: Loan,
        return_date: Option<NaiveDate>,
    ) -> Result<Loan, LoanError> {
        if !loan.is_open() {
            return Err(LoanError::AlreadyReturned { loan: loan.id });
        }
        let return_date = return_date.unwrap_or_else(|| self.today());
        if return_date < loan.loan_date {
            return Err(LoanError::InvalidReturnDate);
        }

        loan.return_date = Some(return_date);
        tx.book_mut().increment_on_close();
        if let Some(fine) = self.policy.fine_for(loan.due_date, return_date) {
            loan.fine_amount = fine;
        }
        loan.status = LoanStatus::Returned;

        tx.put_loan(loan.clone());
        tx.record(LoanEvent::Returned {
            loan: loan.id,
            book: loan.book_id,
            return_date,
            fine: (loan.fine_amount > Decimal::ZERO).then_some(loan.fine_amount),
        });
        Ok(loan)
    }
}

fn log_return(loan: &Loan) {
    info!(loan = %loan.id, book = %loan.book_id, fine = %loan.fine_amount, "loan returned");
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}
