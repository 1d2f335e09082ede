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

//! Benchmarks for the loan engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded loan lifecycles
//! - Parallel checkouts spread over many books
//! - Contention on a shrinking number of books
//! - Listing cost as loan history grows

use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use library_loans::{
    BookId, FinePolicy, FixedClock, Library, LoanFilter, MemberId, NewBook, NewMember,
};
use rayon::prelude::*;
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

/// Library with `books` titles of `copies` copies each and one active member.
fn setup(books: u32, copies: u32) -> (Library, Vec<BookId>, MemberId) {
    let library = Library::with_clock(FinePolicy::default(), FixedClock(date(1)));
    let book_ids = (0..books)
        .map(|n| {
            let new = NewBook::new(&format!("Book {n}"), copies);
            library.store().add_book(new).unwrap().id
        })
        .collect();
    let member = library
        .add_member(NewMember::new("Bench", "Member", "bench@example.org"))
        .unwrap()
        .id;
    (library, book_ids, member)
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_open_return(c: &mut Criterion) {
    let (library, books, member) = setup(1, 1);
    c.bench_function("open_return", |b| {
        b.iter(|| {
            let loan = library.open_loan(books[0], member, date(5)).unwrap();
            library
                .return_loan(black_box(loan.id), Some(date(9)))
                .unwrap();
        })
    });
}

fn bench_open_delete(c: &mut Criterion) {
    let (library, books, member) = setup(1, 1);
    c.bench_function("open_delete", |b| {
        b.iter(|| {
            let loan = library.open_loan(books[0], member, date(5)).unwrap();
            library.delete_loan(black_box(loan.id)).unwrap();
        })
    });
}

fn bench_checkout_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkout_throughput");

    for count in [100u32, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let (library, books, member) = setup(1, count);
                for _ in 0..count {
                    library.open_loan(books[0], member, date(5)).unwrap();
                }
                black_box(&library);
            })
        });
    }
    group.finish();
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    let total_ops = 10_000u32;

    // Fewer books = more threads competing for the same book lock
    for num_books in [1u32, 10, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(total_ops as u64));
        group.bench_with_input(
            BenchmarkId::new("books", num_books),
            num_books,
            |b, &num_books| {
                b.iter(|| {
                    let (library, books, member) = setup(num_books, total_ops);
                    let library = Arc::new(library);

                    (0..total_ops).into_par_iter().for_each(|i| {
                        let book = books[(i % num_books) as usize];
                        let loan = library.open_loan(book, member, date(5)).unwrap();
                        if i % 2 == 0 {
                            library.return_loan(loan.id, None).unwrap();
                        }
                    });

                    black_box(&library);
                })
            },
        );
    }
    group.finish();
}

// =============================================================================
// History Benchmarks
// =============================================================================

fn bench_loan_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("loan_listing");

    for history_size in [100u32, 1_000, 10_000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(history_size),
            history_size,
            |b, &history_size| {
                let (library, books, member) = setup(10, history_size);
                for i in 0..history_size {
                    let book = books[(i % 10) as usize];
                    let loan = library.open_loan(book, member, date(5)).unwrap();
                    if i % 3 == 0 {
                        library.return_loan(loan.id, Some(date(20))).unwrap();
                    }
                }

                b.iter(|| black_box(library.list_loans(&LoanFilter::book(books[0]))));
            },
        );
    }
    group.finish();
}

// =============================================================================
// Criterion Groups
// =============================================================================

criterion_group!(
    single_threaded,
    bench_open_return,
    bench_open_delete,
    bench_checkout_throughput,
);

criterion_group!(multi_threaded, bench_contention,);

criterion_group!(history, bench_loan_listing,);

criterion_main!(single_threaded, multi_threaded, history);
