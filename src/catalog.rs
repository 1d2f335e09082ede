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

//! Authors and categories referenced by books.

use crate::base::{AuthorId, CategoryId, nullable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub id: AuthorId,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub biography: Option<String>,
}

impl Author {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAuthor {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub biography: Option<String>,
}

impl NewAuthor {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            ..Self::default()
        }
    }
}

/// Fields that may be edited on an existing author.
///
/// `None` leaves a field alone; `Some(None)` clears an optional one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub birth_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub nationality: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub biography: Option<Option<String>>,
}

impl Author {
    pub(crate) fn apply(&mut self, update: AuthorUpdate) {
        if let Some(first_name) = update.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            self.last_name = last_name;
        }
        if let Some(birth_date) = update.birth_date {
            self.birth_date = birth_date;
        }
        if let Some(nationality) = update.nationality {
            self.nationality = nationality;
        }
        if let Some(biography) = update.biography {
            self.biography = biography;
        }
    }
}

/// Shelf category. Names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

impl NewCategory {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_update_sets_and_clears() {
        let mut author = Author {
            id: AuthorId(1),
            first_name: "Frank".into(),
            last_name: "Herbert".into(),
            birth_date: None,
            nationality: Some("British".into()),
            biography: None,
        };
        author.apply(AuthorUpdate {
            birth_date: Some(NaiveDate::from_ymd_opt(1920, 10, 8)),
            nationality: Some(None),
            ..AuthorUpdate::default()
        });
        assert_eq!(author.full_name(), "Frank Herbert");
        assert_eq!(author.birth_date, NaiveDate::from_ymd_opt(1920, 10, 8));
        assert_eq!(author.nationality, None);
    }
}
