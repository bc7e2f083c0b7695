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

//! Installs the process-wide logger.

use env_logger::{Builder, Env};

/// Installs `env_logger`, filtered by `RUST_LOG` or by `default_filter` when
/// the variable is unset.
///
/// # Panics
///
/// Panics if a logger is already installed.
pub fn init_logging(default_filter: &str) {
    Builder::from_env(Env::default().default_filter_or(default_filter)).init();
}

/// Like [`init_logging`], but returns `false` instead of panicking when a
/// logger is already installed. Meant for tests, which share one process.
pub fn try_init_logging(default_filter: &str) -> bool {
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .is_test(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_refused() {
        try_init_logging("debug");
        assert!(!try_init_logging("debug"), "A logger is already installed");
        log::debug!("Logging is ready");
    }
}
