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

//! In-memory entity store.
//!
//! Records live in [`DashMap`]s so lookups from many threads never block one
//! another. Each book sits behind its own [`Mutex`]: every change to a book's
//! copy counts, and every write to a loan on that book, happens while that
//! lock is held inside a [`BookTransaction`].
//!
//! # Lock ordering
//!
//! 1. The references lock. Writes that point at a member, author or category
//!    hold it shared; removals that look for such pointers hold it exclusively.
//! 2. A book mutex.
//! 3. Map shards.
//!
//! Locks are only ever taken in that order. Methods clone the book's `Arc`
//! out of the map and release the shard before locking it.

use crate::base::{AuthorId, BookId, CategoryId, LoanId, MemberId};
use crate::book::{Book, BookFilter, BookUpdate, NewBook};
use crate::catalog::{Author, AuthorUpdate, Category, CategoryUpdate, NewAuthor, NewCategory};
use crate::error::{Entity, LoanError};
use crate::journal::{Journal, LoanEvent};
use crate::loan::{Loan, LoanFilter};
use crate::member::{Member, MemberFilter, MemberUpdate, MembershipStatus, NewMember};
use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// `None` once the book has been removed, so a caller that cloned the cell
/// before the removal cannot write to it.
type BookCell = Arc<Mutex<Option<Book>>>;

/// Hands out ids starting at 1.
#[derive(Debug)]
struct IdSequence(AtomicU32);

impl IdSequence {
    fn new() -> Self {
        Self(AtomicU32::new(1))
    }

    fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[derive(Debug)]
enum LoanWrite {
    Put(Loan),
    Remove(LoanId),
}

/// Unit of work scoped to one book.
///
/// Holds a staged copy of the book, the loan writes made against it and the
/// events describing them. [`Store::transaction`] applies all three when the
/// closure returns `Ok`, and discards them when it returns `Err`.
pub(crate) struct BookTransaction<'a> {
    loans: &'a DashMap<LoanId, Loan>,
    journal: &'a Journal,
    book: Book,
    writes: Vec<LoanWrite>,
    events: Vec<LoanEvent>,
}

impl BookTransaction<'_> {
    pub(crate) fn book(&self) -> &Book {
        &self.book
    }

    pub(crate) fn book_mut(&mut self) -> &mut Book {
        &mut self.book
    }

    /// Committed state of a loan on this book.
    pub(crate) fn loan(&self, loan_id: LoanId) -> Option<Loan> {
        self.loans
            .get(&loan_id)
            .filter(|loan| loan.book_id == self.book.id)
            .map(|loan| loan.clone())
    }

    pub(crate) fn put_loan(&mut self, loan: Loan) {
        debug_assert_eq!(loan.book_id, self.book.id);
        self.writes.push(LoanWrite::Put(loan));
    }

    pub(crate) fn remove_loan(&mut self, loan_id: LoanId) {
        self.writes.push(LoanWrite::Remove(loan_id));
    }

    pub(crate) fn record(&mut self, event: LoanEvent) {
        self.events.push(event);
    }

    fn commit(self, book: &mut Book) {
        *book = self.book;
        for write in self.writes {
            match write {
                LoanWrite::Put(loan) => {
                    self.loans.insert(loan.id, loan);
                }
                LoanWrite::Remove(loan_id) => {
                    self.loans.remove(&loan_id);
                }
            }
        }
        // Still under the book lock, so the journal follows commit order.
        for event in self.events {
            self.journal.record(event);
        }
    }
}

/// Thread-safe store for books, members, loans, authors and categories.
#[derive(Debug)]
pub struct Store {
    books: DashMap<BookId, BookCell>,
    members: DashMap<MemberId, Member>,
    loans: DashMap<LoanId, Loan>,
    authors: DashMap<AuthorId, Author>,
    categories: DashMap<CategoryId, Category>,
    /// Unique-key indexes, claimed through the entry API.
    isbns: DashMap<String, BookId>,
    emails: DashMap<String, MemberId>,
    category_names: DashMap<String, CategoryId>,
    references: RwLock<()>,
    journal: Journal,
    book_ids: IdSequence,
    member_ids: IdSequence,
    loan_ids: IdSequence,
    author_ids: IdSequence,
    category_ids: IdSequence,
}

impl Store {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
            members: DashMap::new(),
            loans: DashMap::new(),
            authors: DashMap::new(),
            categories: DashMap::new(),
            isbns: DashMap::new(),
            emails: DashMap::new(),
            category_names: DashMap::new(),
            references: RwLock::new(()),
            journal: Journal::new(),
            book_ids: IdSequence::new(),
            member_ids: IdSequence::new(),
            loan_ids: IdSequence::new(),
            author_ids: IdSequence::new(),
            category_ids: IdSequence::new(),
        }
    }

    // === Transactions ===

    /// Runs `work` with exclusive access to one book.
    ///
    /// The book stays locked for the whole closure, so the
    /// read-check-write sequence cannot interleave with another transaction
    /// on the same book.
    pub(crate) fn transaction<T, F>(&self, book_id: BookId, work: F) -> Result<T, LoanError>
    where
        F: FnOnce(&mut BookTransaction<'_>) -> Result<T, LoanError>,
    {
        let cell = self.book_cell(book_id)?;
        let mut slot = cell.lock();
        let book = slot
            .as_mut()
            .ok_or_else(|| LoanError::not_found(Entity::Book, book_id.0))?;

        let mut transaction = BookTransaction {
            loans: &self.loans,
            journal: &self.journal,
            book: book.clone(),
            writes: Vec::new(),
            events: Vec::new(),
        };
        let output = work(&mut transaction)?;
        transaction.commit(book);
        Ok(output)
    }

    pub(crate) fn next_loan_id(&self) -> LoanId {
        LoanId(self.loan_ids.next())
    }

    /// Keeps members, authors and categories from being removed while held.
    pub(crate) fn pin_references(&self) -> RwLockReadGuard<'_, ()> {
        self.references.read()
    }

    /// Drains the events of every transaction committed so far.
    pub(crate) fn drain_events(&self) -> Vec<LoanEvent> {
        self.journal.drain()
    }

    fn book_cell(&self, book_id: BookId) -> Result<BookCell, LoanError> {
        self.books
            .get(&book_id)
            .map(|cell| Arc::clone(cell.value()))
            .ok_or_else(|| LoanError::not_found(Entity::Book, book_id.0))
    }

    // === Books ===

    /// Registers a title with all of its copies on the shelf.
    ///
    /// # Errors
    ///
    /// - [`LoanError::NotFound`] - Category or an author does not exist.
    /// - [`LoanError::Duplicate`] - ISBN already registered.
    pub fn add_book(&self, new: NewBook) -> Result<Book, LoanError> {
        let _references = self.pin_references();
        if let Some(category_id) = new.category_id {
            self.require_category(category_id)?;
        }
        self.require_authors(&new.author_ids)?;

        let book_id = BookId(self.book_ids.next());
        if let Some(isbn) = &new.isbn {
            self.claim_isbn(isbn, book_id)?;
        }

        let book = Book::new(book_id, new);
        self.books
            .insert(book_id, Arc::new(Mutex::new(Some(book.clone()))));
        debug!(book = %book_id, copies = book.total_copies(), "book added");
        Ok(book)
    }

    /// Snapshot of a book.
    pub fn get_book(&self, book_id: BookId) -> Option<Book> {
        let cell = self.book_cell(book_id).ok()?;
        let slot = cell.lock();
        slot.clone()
    }

    /// Applies an administrative edit.
    ///
    /// A `total_copies` change moves `available_copies` by the same amount.
    ///
    /// # Errors
    ///
    /// - [`LoanError::NotFound`] - Book, category or an author does not exist.
    /// - [`LoanError::InvalidCopies`] - New total is below the copies on loan.
    /// - [`LoanError::Duplicate`] - New ISBN belongs to another book.
    pub fn update_book(&self, book_id: BookId, update: BookUpdate) -> Result<Book, LoanError> {
        let _references = self.pin_references();
        if let Some(Some(category_id)) = update.category_id {
            self.require_category(category_id)?;
        }
        if let Some(author_ids) = &update.author_ids {
            self.require_authors(author_ids)?;
        }

        let cell = self.book_cell(book_id)?;
        let mut slot = cell.lock();
        let book = slot
            .as_mut()
            .ok_or_else(|| LoanError::not_found(Entity::Book, book_id.0))?;

        let mut updated = book.clone();
        if let Some(total) = update.total_copies {
            updated.set_total_copies(total)?;
        }
        if let Some(title) = update.title {
            updated.title = title;
        }
        if let Some(year) = update.publication_year {
            updated.publication_year = year;
        }
        if let Some(publisher) = update.publisher {
            updated.publisher = publisher;
        }
        if let Some(category_id) = update.category_id {
            updated.category_id = category_id;
        }
        if let Some(author_ids) = update.author_ids {
            updated.author_ids = author_ids;
        }
        // Last, so a rejected edit never leaves a claimed ISBN behind.
        if let Some(isbn) = update.isbn {
            if isbn != book.isbn {
                if let Some(new) = &isbn {
                    self.claim_isbn(new, book_id)?;
                }
                if let Some(old) = &book.isbn {
                    self.isbns.remove(old);
                }
            }
            updated.isbn = isbn;
        }

        *book = updated.clone();
        debug!(book = %book_id, "book updated");
        Ok(updated)
    }

    /// Deletes a book that no loan refers to.
    ///
    /// # Errors
    ///
    /// - [`LoanError::NotFound`] - Book does not exist.
    /// - [`LoanError::BookHasLoans`] - Some loan, open or returned, still references it.
    pub fn remove_book(&self, book_id: BookId) -> Result<(), LoanError> {
        let cell = self.book_cell(book_id)?;
        let mut slot = cell.lock();
        let Some(book) = slot.as_ref() else {
            return Err(LoanError::not_found(Entity::Book, book_id.0));
        };
        if self.loans.iter().any(|loan| loan.book_id == book_id) {
            return Err(LoanError::BookHasLoans { book: book_id });
        }

        if let Some(isbn) = &book.isbn {
            self.isbns.remove(isbn);
        }
        *slot = None;
        self.books.remove(&book_id);
        debug!(book = %book_id, "book removed");
        Ok(())
    }

    /// Books matching `filter`, ordered by id.
    pub fn list_books(&self, filter: &BookFilter) -> Vec<Book> {
        let cells: Vec<BookCell> = self
            .books
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut books: Vec<Book> = cells
            .iter()
            .filter_map(|cell| cell.lock().clone())
            .filter(|book| filter.matches(book))
            .collect();
        books.sort_by_key(|book| book.id);
        books
    }

    fn claim_isbn(&self, isbn: &str, book_id: BookId) -> Result<(), LoanError> {
        match self.isbns.entry(isbn.to_string()) {
            Entry::Occupied(_) => Err(LoanError::Duplicate {
                entity: Entity::Book,
                key: format!("isbn {isbn}"),
            }),
            Entry::Vacant(entry) => {
                entry.insert(book_id);
                Ok(())
            }
        }
    }

    // === Members ===

    /// Registers a member. `today` is used when no membership date is given.
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::Duplicate`] if the email is already registered.
    pub fn add_member(&self, new: NewMember, today: NaiveDate) -> Result<Member, LoanError> {
        let member_id = MemberId(self.member_ids.next());
        let email = normalize_email(&new.email);
        self.claim_email(&email, member_id)?;

        let member = Member {
            id: member_id,
            first_name: new.first_name,
            last_name: new.last_name,
            email,
            phone: new.phone,
            address: new.address,
            membership_date: new.membership_date.unwrap_or(today),
            membership_status: new.membership_status,
        };
        self.members.insert(member_id, member.clone());
        debug!(member = %member_id, status = %member.membership_status, "member added");
        Ok(member)
    }

    pub fn get_member(&self, member_id: MemberId) -> Option<Member> {
        self.members.get(&member_id).map(|member| member.clone())
    }

    /// Applies an edit to a member.
    ///
    /// # Errors
    ///
    /// - [`LoanError::NotFound`] - Member does not exist.
    /// - [`LoanError::Duplicate`] - New email belongs to another member.
    pub fn update_member(
        &self,
        member_id: MemberId,
        update: MemberUpdate,
    ) -> Result<Member, LoanError> {
        let mut member = self
            .members
            .get_mut(&member_id)
            .ok_or_else(|| LoanError::not_found(Entity::Member, member_id.0))?;

        let mut updated = member.clone();
        if let Some(first_name) = update.first_name {
            updated.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            updated.last_name = last_name;
        }
        if let Some(phone) = update.phone {
            updated.phone = phone;
        }
        if let Some(address) = update.address {
            updated.address = address;
        }
        if let Some(status) = update.membership_status {
            updated.membership_status = status;
        }
        if let Some(email) = update.email {
            let email = normalize_email(&email);
            if email != member.email {
                self.claim_email(&email, member_id)?;
                self.emails.remove(&member.email);
            }
            updated.email = email;
        }

        *member = updated.clone();
        debug!(member = %member_id, status = %updated.membership_status, "member updated");
        Ok(updated)
    }

    pub fn set_membership_status(
        &self,
        member_id: MemberId,
        status: MembershipStatus,
    ) -> Result<Member, LoanError> {
        self.update_member(
            member_id,
            MemberUpdate {
                membership_status: Some(status),
                ..MemberUpdate::default()
            },
        )
    }

    /// Deletes a member that no loan refers to.
    ///
    /// # Errors
    ///
    /// - [`LoanError::NotFound`] - Member does not exist.
    /// - [`LoanError::InUse`] - Some loan, open or returned, still references it.
    pub fn remove_member(&self, member_id: MemberId) -> Result<(), LoanError> {
        let _references = self.references.write();
        if !self.members.contains_key(&member_id) {
            return Err(LoanError::not_found(Entity::Member, member_id.0));
        }
        if self.loans.iter().any(|loan| loan.member_id == member_id) {
            return Err(LoanError::InUse {
                entity: Entity::Member,
                id: member_id.0,
                by: Entity::Loan,
            });
        }

        if let Some((_, member)) = self.members.remove(&member_id) {
            self.emails.remove(&member.email);
        }
        debug!(member = %member_id, "member removed");
        Ok(())
    }

    /// Members matching `filter`, ordered by id.
    pub fn list_members(&self, filter: &MemberFilter) -> Vec<Member> {
        let mut members: Vec<Member> = self
            .members
            .iter()
            .filter(|member| filter.matches(member))
            .map(|member| member.clone())
            .collect();
        members.sort_by_key(|member| member.id);
        members
    }

    fn claim_email(&self, email: &str, member_id: MemberId) -> Result<(), LoanError> {
        match self.emails.entry(email.to_string()) {
            Entry::Occupied(_) => Err(LoanError::Duplicate {
                entity: Entity::Member,
                key: format!("email {email}"),
            }),
            Entry::Vacant(entry) => {
                entry.insert(member_id);
                Ok(())
            }
        }
    }

    // === Loans ===

    pub fn get_loan(&self, loan_id: LoanId) -> Option<Loan> {
        self.loans.get(&loan_id).map(|loan| loan.clone())
    }

    /// Loans matching `filter` as of `today`, ordered by id.
    pub fn list_loans(&self, filter: &LoanFilter, today: NaiveDate) -> Vec<Loan> {
        let mut loans: Vec<Loan> = self
            .loans
            .iter()
            .filter(|loan| filter.matches(loan, today))
            .map(|loan| loan.clone())
            .collect();
        loans.sort_by_key(|loan| loan.id);
        loans
    }

    // === Authors and categories ===

    pub fn add_author(&self, new: NewAuthor) -> Author {
        let author = Author {
            id: AuthorId(self.author_ids.next()),
            first_name: new.first_name,
            last_name: new.last_name,
            birth_date: new.birth_date,
            nationality: new.nationality,
            biography: new.biography,
        };
        self.authors.insert(author.id, author.clone());
        debug!(author = %author.id, "author added");
        author
    }

    pub fn get_author(&self, author_id: AuthorId) -> Option<Author> {
        self.authors.get(&author_id).map(|author| author.clone())
    }

    /// # Errors
    ///
    /// Returns [`LoanError::NotFound`] if the author does not exist.
    pub fn update_author(
        &self,
        author_id: AuthorId,
        update: AuthorUpdate,
    ) -> Result<Author, LoanError> {
        let mut author = self
            .authors
            .get_mut(&author_id)
            .ok_or_else(|| LoanError::not_found(Entity::Author, author_id.0))?;
        author.apply(update);
        Ok(author.clone())
    }

    /// Deletes an author that no book credits.
    ///
    /// # Errors
    ///
    /// - [`LoanError::NotFound`] - Author does not exist.
    /// - [`LoanError::InUse`] - Some book still lists the author.
    pub fn remove_author(&self, author_id: AuthorId) -> Result<(), LoanError> {
        let _references = self.references.write();
        if !self.authors.contains_key(&author_id) {
            return Err(LoanError::not_found(Entity::Author, author_id.0));
        }
        let filter = BookFilter {
            author_id: Some(author_id),
            ..BookFilter::default()
        };
        if !self.list_books(&filter).is_empty() {
            return Err(LoanError::InUse {
                entity: Entity::Author,
                id: author_id.0,
                by: Entity::Book,
            });
        }

        self.authors.remove(&author_id);
        debug!(author = %author_id, "author removed");
        Ok(())
    }

    /// All authors, ordered by id.
    pub fn list_authors(&self) -> Vec<Author> {
        let mut authors: Vec<Author> = self.authors.iter().map(|a| a.clone()).collect();
        authors.sort_by_key(|author| author.id);
        authors
    }

    /// Registers a category.
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::Duplicate`] if the name is taken.
    pub fn add_category(&self, new: NewCategory) -> Result<Category, LoanError> {
        let category_id = CategoryId(self.category_ids.next());
        self.claim_category_name(&new.name, category_id)?;

        let category = Category {
            id: category_id,
            name: new.name,
            description: new.description,
        };
        self.categories.insert(category_id, category.clone());
        debug!(category = %category_id, "category added");
        Ok(category)
    }

    pub fn get_category(&self, category_id: CategoryId) -> Option<Category> {
        self.categories
            .get(&category_id)
            .map(|category| category.clone())
    }

    /// Applies an edit to a category.
    ///
    /// # Errors
    ///
    /// - [`LoanError::NotFound`] - Category does not exist.
    /// - [`LoanError::Duplicate`] - New name belongs to another category.
    pub fn update_category(
        &self,
        category_id: CategoryId,
        update: CategoryUpdate,
    ) -> Result<Category, LoanError> {
        let mut category = self
            .categories
            .get_mut(&category_id)
            .ok_or_else(|| LoanError::not_found(Entity::Category, category_id.0))?;

        if let Some(name) = update.name {
            if name != category.name {
                self.claim_category_name(&name, category_id)?;
                self.category_names.remove(&category.name);
                category.name = name;
            }
        }
        if let Some(description) = update.description {
            category.description = description;
        }
        Ok(category.clone())
    }

    /// Deletes a category that no book is filed under.
    ///
    /// # Errors
    ///
    /// - [`LoanError::NotFound`] - Category does not exist.
    /// - [`LoanError::InUse`] - Some book is still filed under it.
    pub fn remove_category(&self, category_id: CategoryId) -> Result<(), LoanError> {
        let _references = self.references.write();
        if !self.categories.contains_key(&category_id) {
            return Err(LoanError::not_found(Entity::Category, category_id.0));
        }
        let filter = BookFilter {
            category_id: Some(category_id),
            ..BookFilter::default()
        };
        if !self.list_books(&filter).is_empty() {
            return Err(LoanError::InUse {
                entity: Entity::Category,
                id: category_id.0,
                by: Entity::Book,
            });
        }

        if let Some((_, category)) = self.categories.remove(&category_id) {
            self.category_names.remove(&category.name);
        }
        debug!(category = %category_id, "category removed");
        Ok(())
    }

    /// All categories, ordered by id.
    pub fn list_categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = self.categories.iter().map(|c| c.clone()).collect();
        categories.sort_by_key(|category| category.id);
        categories
    }

    fn claim_category_name(&self, name: &str, category_id: CategoryId) -> Result<(), LoanError> {
        match self.category_names.entry(name.to_string()) {
            Entry::Occupied(_) => Err(LoanError::Duplicate {
                entity: Entity::Category,
                key: format!("name {name}"),
            }),
            Entry::Vacant(entry) => {
                entry.insert(category_id);
                Ok(())
            }
        }
    }

    fn require_category(&self, category_id: CategoryId) -> Result<(), LoanError> {
        if !self.categories.contains_key(&category_id) {
            return Err(LoanError::not_found(Entity::Category, category_id.0));
        }
        Ok(())
    }

    fn require_authors(&self, author_ids: &[AuthorId]) -> Result<(), LoanError> {
        match author_ids.iter().find(|id| !self.authors.contains_key(*id)) {
            Some(missing) => Err(LoanError::not_found(Entity::Author, missing.0)),
            None => Ok(()),
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
