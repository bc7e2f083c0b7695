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

//! Service sampling the residency engines at a fixed interval.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tessera_core::{ResidencyMonitor, ResidencyReport};

/// What the service remembers about one residency engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorSample {
    /// The most recent report.
    pub latest: ResidencyReport,
    /// The highest `used_bytes` seen so far.
    pub peak_used_bytes: u64,
    /// How many times the engine was sampled.
    pub sample_count: u64,
}

/// Samples residency engines, keyed by their monitor id.
///
/// Engines are owned by the frame loop, so they are passed to every
/// [`tick`](TelemetryService::tick) instead of being registered.
#[derive(Debug)]
pub struct TelemetryService {
    samples: BTreeMap<String, MonitorSample>,
    last_update: Instant,
    update_interval: Duration,
}

impl TelemetryService {
    /// Creates a new telemetry service with the given update interval.
    pub fn new(update_interval: Duration) -> Self {
        Self {
            samples: BTreeMap::new(),
            last_update: Instant::now(),
            update_interval,
        }
    }

    /// The interval between two samplings.
    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Should be called periodically (e.g., once per frame).
    /// Samples every monitor if the interval has passed.
    pub fn tick(&mut self, monitors: &[&dyn ResidencyMonitor]) -> bool {
        if self.last_update.elapsed() >= self.update_interval {
            self.sample_now(monitors);
            true
        } else {
            false
        }
    }

    /// Samples every monitor right away and restarts the interval.
    pub fn sample_now(&mut self, monitors: &[&dyn ResidencyMonitor]) {
        log::trace!("Sampling {} residency monitors...", monitors.len());
        for monitor in monitors {
            let report = monitor.residency_report();
            let sample = self
                .samples
                .entry(monitor.monitor_id().into_owned())
                .or_default();
            sample.latest = report;
            sample.peak_used_bytes = sample.peak_used_bytes.max(report.used_bytes);
            sample.sample_count += 1;

            if report.is_over_budget() {
                log::trace!(
                    "'{}' is over budget: {:.1}%",
                    monitor.monitor_id(),
                    report.utilization() * 100.0
                );
            }
        }
        self.last_update = Instant::now();
    }

    /// The sample kept for the monitor `id`.
    pub fn sample(&self, id: &str) -> Option<&MonitorSample> {
        self.samples.get(id)
    }

    /// Every sample, ordered by monitor id.
    pub fn samples(&self) -> impl Iterator<Item = (&str, &MonitorSample)> {
        self.samples.iter().map(|(id, sample)| (id.as_str(), sample))
    }

    /// Logs every sample at `info` level.
    pub fn log_summary(&self) {
        for (id, sample) in &self.samples {
            log::info!(
                "{id}: {:.2} MB used ({:.0}%), peak {:.2} MB, {} resident, {} pinned",
                sample.latest.used_mb(),
                sample.latest.utilization() * 100.0,
                sample.peak_used_bytes as f64 / (1024.0 * 1024.0),
                sample.latest.resident_count,
                sample.latest.pinned_count
            );
        }
    }

    /// Serializes every sample to JSON, keyed by monitor id.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.samples)
    }
}

impl Default for TelemetryService {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::cell::Cell;

    struct FakeEngine {
        used: Cell<u64>,
    }

    impl ResidencyMonitor for FakeEngine {
        fn monitor_id(&self) -> Cow<'static, str> {
            Cow::Borrowed("fake")
        }

        fn residency_report(&self) -> ResidencyReport {
            ResidencyReport {
                used_bytes: self.used.get(),
                capacity_bytes: 100,
                resident_count: 1,
                pinned_count: 0,
            }
        }
    }

    #[test]
    fn test_tick_respects_interval() {
        let engine = FakeEngine { used: Cell::new(10) };
        let mut service = TelemetryService::new(Duration::from_secs(3600));

        assert!(!service.tick(&[&engine]));
        assert!(service.sample("fake").is_none());

        service.sample_now(&[&engine]);
        assert_eq!(service.sample("fake").unwrap().sample_count, 1);
    }

    #[test]
    fn test_peak_is_kept_across_samples() {
        // --- 1. SETUP ---
        let engine = FakeEngine { used: Cell::new(80) };
        let mut service = TelemetryService::new(Duration::ZERO);

        // --- 2. ACTION ---
        assert!(service.tick(&[&engine]));
        engine.used.set(30);
        assert!(service.tick(&[&engine]));

        // --- 3. ASSERTIONS ---
        let sample = service.sample("fake").unwrap();
        assert_eq!(sample.latest.used_bytes, 30);
        assert_eq!(sample.peak_used_bytes, 80);
        assert_eq!(sample.sample_count, 2);
        assert_eq!(service.samples().count(), 1);
    }

    #[test]
    fn test_json_export() {
        let engine = FakeEngine { used: Cell::new(5) };
        let mut service = TelemetryService::default();
        service.sample_now(&[&engine]);

        let json: serde_json::Value = serde_json::from_str(&service.to_json().unwrap()).unwrap();
        assert_eq!(json["fake"]["peak_used_bytes"], 5);
        assert_eq!(json["fake"]["latest"]["capacity_bytes"], 100);
    }
}
