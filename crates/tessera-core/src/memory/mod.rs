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

//! Provides the contract through which residency engines report their usage.
//!
//! A residency engine (the texture cache, the GPU buffer partitioner) owns a
//! bounded budget of bytes and decides what stays resident inside it. This
//! module defines the snapshot every engine can produce on demand, so that the
//! `tessera-telemetry` service can sample them without knowing their types.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The core trait for a residency engine that can be sampled.
///
/// Engines are single-threaded and owned by the frame loop, so the trait does
/// not require `Send` or `Sync`.
pub trait ResidencyMonitor {
    /// Returns a unique, human-readable identifier for this engine instance.
    fn monitor_id(&self) -> Cow<'static, str>;

    /// Returns a snapshot of the engine's current usage.
    fn residency_report(&self) -> ResidencyReport;
}

/// A snapshot of how much of a residency budget is in use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidencyReport {
    /// The number of bytes currently held by resident resources.
    pub used_bytes: u64,
    /// The budget or arena size in bytes.
    pub capacity_bytes: u64,
    /// The number of resources currently resident.
    pub resident_count: usize,
    /// The number of resident resources that are currently protected from
    /// eviction by outstanding locks.
    pub pinned_count: usize,
}

impl ResidencyReport {
    /// Returns the ratio of used bytes over capacity.
    ///
    /// The ratio can exceed `1.0` when locked resources force an engine past
    /// its nominal budget. A zero capacity reports `0.0`.
    pub fn utilization(&self) -> f64 {
        if self.capacity_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.capacity_bytes as f64
        }
    }

    /// Returns `true` if the engine currently exceeds its budget.
    pub fn is_over_budget(&self) -> bool {
        self.used_bytes > self.capacity_bytes
    }

    /// Returns the used bytes in megabytes (MB).
    pub fn used_mb(&self) -> f64 {
        self.used_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilization() {
        let report = ResidencyReport {
            used_bytes: 50,
            capacity_bytes: 200,
            ..Default::default()
        };
        assert_eq!(report.utilization(), 0.25);
        assert!(!report.is_over_budget());

        let empty = ResidencyReport::default();
        assert_eq!(empty.utilization(), 0.0);
    }

    #[test]
    fn test_over_budget() {
        let report = ResidencyReport {
            used_bytes: 3 * 1024 * 1024,
            capacity_bytes: 2 * 1024 * 1024,
            resident_count: 2,
            pinned_count: 2,
        };
        assert!(report.is_over_budget());
        assert_eq!(report.used_mb(), 3.0);
    }
}
