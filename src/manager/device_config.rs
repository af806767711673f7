// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device configuration types.

use std::time::Duration;

use crate::types::ZoneId;

/// Configuration for one thermostat.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use easytouch_lib::manager::{DeviceConfig, PollingConfig};
///
/// let config = DeviceConfig::new("AA:BB:CC:DD:EE:FF")
///     .with_credentials("1234", "owner@example.com")
///     .with_detected_zones(vec![0, 1, 2])
///     .with_polling(PollingConfig::default().with_interval(Duration::from_secs(60)));
///
/// assert_eq!(config.address, "AA:BB:CC:DD:EE:FF");
/// assert_eq!(config.credentials.password.as_deref(), Some("1234"));
/// ```
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Bluetooth address of the thermostat.
    pub address: String,
    /// Password and account email.
    pub credentials: Credentials,
    /// Zones detected during setup, if known.
    pub detected_zones: Vec<ZoneId>,
    /// Background polling settings.
    pub polling: PollingConfig,
    /// Timeouts, retry counts and settle delays.
    pub timing: TimingConfig,
    /// Adaptive delay policy.
    pub backoff: BackoffPolicy,
}

impl DeviceConfig {
    /// Creates a configuration for the thermostat at `address`.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            credentials: Credentials::default(),
            detected_zones: Vec::new(),
            polling: PollingConfig::default(),
            timing: TimingConfig::default(),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Sets the password and account email.
    #[must_use]
    pub fn with_credentials(mut self, password: impl Into<String>, email: impl Into<String>) -> Self {
        self.credentials = Credentials {
            password: Some(password.into()),
            email: Some(email.into()),
        };
        self
    }

    /// Sets only the password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.credentials.password = Some(password.into());
        self
    }

    /// Sets the zones detected during setup.
    #[must_use]
    pub fn with_detected_zones(mut self, zones: Vec<ZoneId>) -> Self {
        self.detected_zones = zones;
        self
    }

    /// Sets the polling settings.
    #[must_use]
    pub fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    /// Sets the timing settings.
    #[must_use]
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Sets the adaptive delay policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Credentials sent to the thermostat.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Plaintext password written to the password characteristic.
    pub password: Option<String>,
    /// Account email included in status requests.
    pub email: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("email", &self.email)
            .finish()
    }
}

/// Background polling settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    /// Whether polling runs at all.
    pub enabled: bool,
    /// Time between polls.
    pub interval: Duration,
    /// Delay before the first poll.
    pub startup_delay: Duration,
}

impl PollingConfig {
    /// Creates a disabled polling configuration.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the interval between polls.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the delay before the first poll.
    #[must_use]
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(30),
            startup_delay: Duration::from_secs(1),
        }
    }
}

/// Timeouts, retry counts and settle delays of the engine.
///
/// Every wait in the engine is bounded by one of these values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingConfig {
    /// Budget of one connection attempt.
    pub connect_timeout: Duration,
    /// Budget of one probe connection attempt.
    pub probe_connect_timeout: Duration,
    /// Connection attempts before giving up.
    pub connect_attempts: u32,
    /// Pause between connection attempts.
    pub connect_retry_delay: Duration,
    /// Wait before re-checking an empty service table.
    pub service_discovery_wait: Duration,
    /// Authentication attempts before giving up.
    pub auth_attempts: u32,
    /// Pause between authentication attempts.
    pub auth_retry_delay: Duration,
    /// Attempts per characteristic read or write.
    pub gatt_retries: u32,
    /// Budget of a single characteristic read or write.
    pub gatt_operation_timeout: Duration,
    /// Wait between writing a command and reading its response.
    pub command_settle: Duration,
    /// Pause between queued commands.
    pub inter_command_delay: Duration,
    /// Pause after an unexpected worker failure.
    pub worker_error_recovery: Duration,
    /// How long the worker waits for a command before checking idleness.
    pub queue_idle_wait: Duration,
    /// Idle time after which the connection is released.
    pub idle_timeout: Duration,
    /// Interval of the connection health check.
    pub health_check_interval: Duration,
    /// Time a caller waits for a queued command's result.
    pub command_result_timeout: Duration,
    /// Connection attempts of the zone probe.
    pub probe_attempts: u32,
    /// Pause between zone probe attempts.
    pub probe_settle: Duration,
    /// Wait between the probe's status request and its read.
    pub probe_response_delay: Duration,
    /// Attempts to resolve an address to a handle before polling.
    pub resolve_attempts: u32,
    /// Time background tasks get to acknowledge a stop request.
    pub task_shutdown_grace: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            probe_connect_timeout: Duration::from_secs(10),
            connect_attempts: 7,
            connect_retry_delay: Duration::from_millis(250),
            service_discovery_wait: Duration::from_secs(2),
            auth_attempts: 3,
            auth_retry_delay: Duration::from_secs(2),
            gatt_retries: 3,
            gatt_operation_timeout: Duration::from_secs(10),
            command_settle: Duration::from_millis(100),
            inter_command_delay: Duration::from_millis(100),
            worker_error_recovery: Duration::from_secs(1),
            queue_idle_wait: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(120),
            health_check_interval: Duration::from_secs(60),
            command_result_timeout: Duration::from_secs(30),
            probe_attempts: 3,
            probe_settle: Duration::from_secs(1),
            probe_response_delay: Duration::from_millis(200),
            resolve_attempts: 3,
            task_shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Adaptive delay policy applied per device and operation kind.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use easytouch_lib::manager::BackoffPolicy;
///
/// let policy = BackoffPolicy::default();
/// assert_eq!(policy.delay_for_failures(1), Duration::from_secs(1));
/// assert_eq!(policy.delay_for_failures(3), Duration::from_secs(4));
/// assert_eq!(policy.delay_for_failures(10), Duration::from_secs(6));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay unit doubled per failure.
    pub base: Duration,
    /// Upper bound on any delay.
    pub max: Duration,
    /// Factor applied to the delay on each success.
    pub decay: f64,
    /// Delays below this are cleared once failures reach zero.
    pub reset_below: Duration,
}

impl BackoffPolicy {
    /// Sets the delay unit.
    #[must_use]
    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Sets the upper bound.
    #[must_use]
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    /// Returns `min(base * 2^failures, max)`.
    #[must_use]
    pub fn delay_for_failures(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures).unwrap_or(i32::MAX);
        let secs = self.base.as_secs_f64() * 2f64.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max.as_secs_f64()))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(6),
            decay: 0.75,
            reset_below: Duration::from_millis(100),
        }
    }
}
