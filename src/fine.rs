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

//! Overdue fine calculation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Flat per-day charge for late returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinePolicy {
    pub rate_per_day: Decimal,
}

impl FinePolicy {
    pub const DEFAULT_RATE_PER_DAY: Decimal = dec!(0.50);

    pub fn new(rate_per_day: Decimal) -> Self {
        Self { rate_per_day }
    }

    /// Fine owed for a copy due on `due_date` and returned on `return_date`.
    ///
    /// Returns `None` when the copy came back on or before its due date.
    pub fn fine_for(&self, due_date: NaiveDate, return_date: NaiveDate) -> Option<Decimal> {
        let days_late = (return_date - due_date).num_days();
        if days_late <= 0 {
            return None;
        }
        Some(Decimal::from(days_late) * self.rate_per_day)
    }
}

impl Default for FinePolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RATE_PER_DAY)
    }
}
