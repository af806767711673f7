// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration and background machinery of a thermostat.
//!
//! Each [`Thermostat`](crate::Thermostat) runs up to three background tasks:
//!
//! - **Command worker**: drains the command queue one command at a time
//! - **Poller**: requests a status report every polling interval, deferring
//!   to queued commands
//! - **Health monitor**: releases idle or silently broken connections
//!
//! All three share one connection guarded by one lock. The worker and the
//! health monitor start with the first queued command; the poller starts
//! with [`Thermostat::start_polling`](crate::Thermostat::start_polling).
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use easytouch_lib::manager::{BackoffPolicy, DeviceConfig, PollingConfig, TimingConfig};
//!
//! let timing = TimingConfig {
//!     connect_attempts: 3,
//!     ..TimingConfig::default()
//! };
//!
//! let config = DeviceConfig::new("AA:BB:CC:DD:EE:FF")
//!     .with_credentials("1234", "owner@example.com")
//!     .with_polling(PollingConfig::default().with_interval(Duration::from_secs(15)))
//!     .with_timing(timing)
//!     .with_backoff(BackoffPolicy::default().with_max(Duration::from_secs(4)));
//!
//! assert_eq!(config.timing.connect_attempts, 3);
//! ```

mod device_config;
pub(crate) mod engine;
mod executor;
mod health;
mod poller;

pub use device_config::{BackoffPolicy, Credentials, DeviceConfig, PollingConfig, TimingConfig};
pub use poller::PollStatus;
