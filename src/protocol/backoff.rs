// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device, per-operation adaptive delays.
//!
//! Each `(address, operation)` pair keeps its own delay and failure count.
//! A failure doubles the delay up to the policy maximum; a success decays it
//! by a quarter and decrements the failure count. Entries outlive individual
//! connections, so a device that keeps dropping stays throttled across
//! reconnects.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;

use crate::manager::BackoffPolicy;

/// Operation kinds throttled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Establishing the connection.
    Connect,
    /// Writing the password.
    Auth,
    /// Reading a characteristic.
    Read,
    /// Writing a characteristic.
    Write,
}

impl OperationKind {
    /// Returns the operation name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Auth => "auth",
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delay state of one `(address, operation)` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationDelay {
    /// Current delay applied before the operation.
    pub delay: Duration,
    /// Outstanding failure count.
    pub failures: u32,
}

/// Table of adaptive delays, shareable between thermostats.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use easytouch_lib::protocol::{AdaptiveDelayTable, OperationKind};
///
/// let table = AdaptiveDelayTable::default();
/// table.on_failure("AA", OperationKind::Write);
/// table.on_failure("AA", OperationKind::Write);
///
/// assert_eq!(table.delay("AA", OperationKind::Write), Duration::from_secs(2));
/// assert_eq!(table.delay("BB", OperationKind::Write), Duration::ZERO);
/// ```
#[derive(Debug, Default)]
pub struct AdaptiveDelayTable {
    policy: BackoffPolicy,
    entries: Mutex<HashMap<(String, OperationKind), OperationDelay>>,
}

impl AdaptiveDelayTable {
    /// Creates an empty table using `policy`.
    #[must_use]
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the delay to apply before `operation` on `address`.
    #[must_use]
    pub fn delay(&self, address: &str, operation: OperationKind) -> Duration {
        self.entry(address, operation).delay
    }

    /// Returns the full state of an entry, zero if never touched.
    #[must_use]
    pub fn entry(&self, address: &str, operation: OperationKind) -> OperationDelay {
        self.entries
            .lock()
            .get(&(address.to_string(), operation))
            .copied()
            .unwrap_or_default()
    }

    /// Records a failure and returns the new delay.
    pub fn on_failure(&self, address: &str, operation: OperationKind) -> Duration {
        let mut entries = self.entries.lock();
        let entry = entries
            .entry((address.to_string(), operation))
            .or_default();
        entry.failures = entry.failures.saturating_add(1);
        entry.delay = self.policy.delay_for_failures(entry.failures);

        tracing::debug!(
            address,
            operation = %operation,
            delay_ms = entry.delay.as_millis(),
            failures = entry.failures,
            "Increased operation delay"
        );
        entry.delay
    }

    /// Records a success, decaying the delay.
    pub fn on_success(&self, address: &str, operation: OperationKind) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&(address.to_string(), operation)) else {
            return;
        };

        if entry.failures > 0 {
            entry.failures -= 1;
            entry.delay = entry.delay.mul_f64(self.policy.decay);
            tracing::debug!(
                address,
                operation = %operation,
                delay_ms = entry.delay.as_millis(),
                failures = entry.failures,
                "Decayed operation delay"
            );
        }
        if entry.failures == 0 && entry.delay < self.policy.reset_below {
            entry.delay = Duration::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_failures_then_one_success() {
        let table = AdaptiveDelayTable::default();
        for _ in 0..3 {
            table.on_failure("addrA", OperationKind::Write);
        }
        assert_eq!(table.delay("addrA", OperationKind::Write), Duration::from_secs(4));

        table.on_success("addrA", OperationKind::Write);
        let entry = table.entry("addrA", OperationKind::Write);
        assert_eq!(entry.delay, Duration::from_secs(3));
        assert_eq!(entry.failures, 2);

        assert_eq!(table.entry("addrB", OperationKind::Write), OperationDelay::default());
    }

    #[test]
    fn operations_are_independent() {
        let table = AdaptiveDelayTable::default();
        table.on_failure("addr", OperationKind::Connect);
        assert_eq!(table.delay("addr", OperationKind::Connect), Duration::from_secs(1));
        assert_eq!(table.delay("addr", OperationKind::Read), Duration::ZERO);
    }

    #[test]
    fn delay_is_capped() {
        let table = AdaptiveDelayTable::default();
        for _ in 0..20 {
            table.on_failure("addr", OperationKind::Auth);
        }
        assert_eq!(table.delay("addr", OperationKind::Auth), Duration::from_secs(6));
    }

    #[test]
    fn successes_decay_to_zero() {
        let table = AdaptiveDelayTable::default();
        table.on_failure("addr", OperationKind::Read);
        assert_eq!(table.delay("addr", OperationKind::Read), Duration::from_secs(1));

        table.on_success("addr", OperationKind::Read);
        // One failure decayed once leaves 0.75s with no outstanding failures.
        assert_eq!(table.delay("addr", OperationKind::Read), Duration::from_millis(750));

        let table = AdaptiveDelayTable::new(BackoffPolicy::default().with_base(Duration::from_millis(40)));
        table.on_failure("addr", OperationKind::Read);
        table.on_success("addr", OperationKind::Read);
        assert_eq!(table.delay("addr", OperationKind::Read), Duration::ZERO);
    }

    #[test]
    fn success_on_untouched_entry_is_noop() {
        let table = AdaptiveDelayTable::default();
        table.on_success("addr", OperationKind::Write);
        assert_eq!(table.entry("addr", OperationKind::Write), OperationDelay::default());
    }
}
