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

//! Library policy configuration.
//!
//! Loaded from TOML; every key is optional.
//!
//! ```toml
//! fine_rate_per_day = "0.75"
//! default_loan_days = 21
//! ```

use crate::fine::FinePolicy;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("fine rate must not be negative")]
    NegativeFineRate,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibraryConfig {
    pub fine_rate_per_day: Decimal,
    /// Loan length used when a checkout does not name a due date.
    pub default_loan_days: u32,
}

impl LibraryConfig {
    pub const DEFAULT_LOAN_DAYS: u32 = 14;

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: LibraryConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fine_rate_per_day.is_sign_negative() {
            return Err(ConfigError::NegativeFineRate);
        }
        Ok(())
    }

    pub fn fine_policy(&self) -> FinePolicy {
        FinePolicy::new(self.fine_rate_per_day)
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            fine_rate_per_day: FinePolicy::DEFAULT_RATE_PER_DAY,
            default_loan_days: Self::DEFAULT_LOAN_DAYS,
        }
    }
}
