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

//! Append-only journal of committed loan transitions.
//!
//! Entries are staged inside a book transaction and pushed as it commits,
//! while the book is still locked. A rejected request never shows up here,
//! and two transitions on the same book appear in the order they committed.

use crate::base::{BookId, LoanId, MemberId};
use chrono::NaiveDate;
use crossbeam::queue::SegQueue;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum LoanEvent {
    Opened {
        loan: LoanId,
        book: BookId,
        member: MemberId,
        due_date: NaiveDate,
    },
    Returned {
        loan: LoanId,
        book: BookId,
        return_date: NaiveDate,
        fine: Option<Decimal>,
    },
    Renewed {
        loan: LoanId,
        due_date: NaiveDate,
    },
    Deleted {
        loan: LoanId,
        book: BookId,
        was_open: bool,
    },
}

impl LoanEvent {
    pub fn loan_id(&self) -> LoanId {
        match self {
            Self::Opened { loan, .. } => *loan,
            Self::Returned { loan, .. } => *loan,
            Self::Renewed { loan, .. } => *loan,
            Self::Deleted { loan, .. } => *loan,
        }
    }
}

/// A lock-free FIFO of [`LoanEvent`]s, safe to push from many threads.
#[derive(Debug, Default)]
pub struct Journal {
    events: SegQueue<LoanEvent>,
}

impl Journal {
    pub fn new() -> Self {
        Self {
            events: SegQueue::new(),
        }
    }

    pub fn record(&self, event: LoanEvent) {
        self.events.push(event);
    }

    /// Removes and returns everything recorded so far, oldest first.
    pub fn drain(&self) -> Vec<LoanEvent> {
        let mut drained = Vec::with_capacity(self.events.len());
        while let Some(event) = self.events.pop() {
            drained.push(event);
        }
        drained
    }
}
