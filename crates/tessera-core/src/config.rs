// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Sizing settings for the residency engines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The default GPU buffer arena size: 1 MiB.
pub const DEFAULT_ARENA_BYTES: usize = 1024 * 1024;
/// The default texture cache budget: 64 MiB.
pub const DEFAULT_CACHE_BUDGET_BYTES: usize = 64 * 1024 * 1024;
/// The default number of reclamation windows tried by the partitioner.
pub const DEFAULT_RECLAIM_TRIALS: usize = 7;

/// Budgets supplied by the caller when building the residency engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// The first byte address managed by the buffer partitioner.
    pub arena_first_byte: usize,
    /// The size in bytes of the buffer partitioner's arena.
    pub arena_bytes: usize,
    /// The memory budget, in bytes, of the texture cache.
    pub cache_budget_bytes: usize,
    /// How many least-recently-used chunks the partitioner tries as
    /// reclamation origins before picking the least disruptive one.
    pub reclaim_trials: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            arena_first_byte: 0,
            arena_bytes: DEFAULT_ARENA_BYTES,
            cache_budget_bytes: DEFAULT_CACHE_BUDGET_BYTES,
            reclaim_trials: DEFAULT_RECLAIM_TRIALS,
        }
    }
}

impl MemorySettings {
    /// Parses settings from a JSON document. Missing fields take their
    /// default value.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serializes the settings to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, SettingsError> {
        serde_json::to_string_pretty(self).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    /// Checks that the settings describe usable engines.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.arena_bytes == 0 {
            return Err(SettingsError::Invalid(
                "arena_bytes must be greater than zero".to_owned(),
            ));
        }
        if self.arena_first_byte.checked_add(self.arena_bytes).is_none() {
            return Err(SettingsError::Invalid(
                "arena_first_byte + arena_bytes overflows the address space".to_owned(),
            ));
        }
        if self.reclaim_trials == 0 {
            return Err(SettingsError::Invalid(
                "reclaim_trials must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    /// The byte following the last byte of the arena.
    pub fn arena_end_byte(&self) -> usize {
        self.arena_first_byte + self.arena_bytes
    }
}

/// An error raised while loading or validating [`MemorySettings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// The settings document could not be parsed or written.
    Parse(String),
    /// The settings were parsed but describe unusable engines.
    Invalid(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Parse(msg) => write!(f, "Failed to parse memory settings: {msg}"),
            SettingsError::Invalid(msg) => write!(f, "Invalid memory settings: {msg}"),
        }
    }
}

impl std::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = MemorySettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.reclaim_trials, 7);
        assert_eq!(settings.arena_end_byte(), DEFAULT_ARENA_BYTES);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = MemorySettings::from_json_str(r#"{ "arena_bytes": 4096 }"#).unwrap();
        assert_eq!(settings.arena_bytes, 4096);
        assert_eq!(settings.cache_budget_bytes, DEFAULT_CACHE_BUDGET_BYTES);
    }

    #[test]
    fn test_round_trip_through_json() {
        let settings = MemorySettings {
            arena_first_byte: 128,
            arena_bytes: 2048,
            cache_budget_bytes: 10,
            reclaim_trials: 3,
        };
        let json = settings.to_json_string().unwrap();
        assert_eq!(MemorySettings::from_json_str(&json).unwrap(), settings);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let err = MemorySettings::from_json_str(r#"{ "arena_bytes": 0 }"#).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));

        let err = MemorySettings::from_json_str(r#"{ "reclaim_trials": 0 }"#).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));

        let err = MemorySettings::from_json_str("not json").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
        assert!(err.to_string().starts_with("Failed to parse memory settings"));
    }
}
