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

//! Core identifier types for catalog records, members and loans.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Unique identifier for a book title (all of its copies share it).
    BookId
);

record_id!(
    /// Unique identifier for a library member.
    MemberId
);

record_id!(
    /// Unique identifier for a loan.
    ///
    /// Assigned by the store, starting at 1 and never reused.
    LoanId
);

record_id!(AuthorId);

record_id!(CategoryId);

/// Reads a nullable update field: absent stays `None`, `null` becomes
/// `Some(None)` (clear the field), a value becomes `Some(Some(value))`.
///
/// Pair with `#[serde(default)]` so an absent key is accepted.
pub(crate) fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_as_bare_numbers() {
        assert_eq!(BookId(7).to_string(), "7");
        assert_eq!(LoanId(42).to_string(), "42");
    }

    #[test]
    fn ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&MemberId(3)).unwrap(), "3");
        let id: CategoryId = serde_json::from_str("12").unwrap();
        assert_eq!(id, CategoryId(12));
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        isbn: Option<Option<String>>,
    }

    #[test]
    fn nullable_tells_absent_from_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.isbn, None);
        let cleared: Patch = serde_json::from_str(r#"{"isbn":null}"#).unwrap();
        assert_eq!(cleared.isbn, Some(None));
        let set: Patch = serde_json::from_str(r#"{"isbn":"978-0441013593"}"#).unwrap();
        assert_eq!(set.isbn, Some(Some("978-0441013593".to_string())));
    }
}
