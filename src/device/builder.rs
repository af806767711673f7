// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thermostat builder.

use std::sync::Arc;

use crate::device::Thermostat;
use crate::manager::DeviceConfig;
use crate::protocol::{AdaptiveDelayTable, DeviceResolver, GattConnector, NoResolver};

/// Builder for [`Thermostat`].
///
/// # Examples
///
/// ```ignore
/// use std::sync::Arc;
/// use easytouch_lib::Thermostat;
/// use easytouch_lib::manager::DeviceConfig;
/// use easytouch_lib::protocol::AdaptiveDelayTable;
///
/// # async fn example(connector: MyConnector) {
/// // Share one delay table between every thermostat of a host
/// let delays = Arc::new(AdaptiveDelayTable::default());
///
/// // Zones are probed over the air when none are configured
/// let thermostat = Thermostat::builder(DeviceConfig::new("AA:BB:CC:DD:EE:FF"), connector)
///     .with_delay_table(delays)
///     .with_resolver(|address: &str| scanner.lookup(address))
///     .build_with_probe()
///     .await;
/// # }
/// ```
pub struct ThermostatBuilder<C: GattConnector> {
    config: DeviceConfig,
    connector: Arc<C>,
    delays: Option<Arc<AdaptiveDelayTable>>,
    resolver: Arc<dyn DeviceResolver>,
}

impl<C: GattConnector> ThermostatBuilder<C> {
    pub(crate) fn new(config: DeviceConfig, connector: C) -> Self {
        Self {
            config,
            connector: Arc::new(connector),
            delays: None,
            resolver: Arc::new(NoResolver),
        }
    }

    /// Uses a shared adaptive delay table.
    ///
    /// Entries are keyed by address, so devices sharing a table keep
    /// separate back-off state. Without this call the thermostat gets its
    /// own table built from the configured back-off policy.
    #[must_use]
    pub fn with_delay_table(mut self, delays: Arc<AdaptiveDelayTable>) -> Self {
        self.delays = Some(delays);
        self
    }

    /// Sets the resolver used to find the device before polling.
    #[must_use]
    pub fn with_resolver(mut self, resolver: impl DeviceResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Returns the configuration being built.
    #[must_use]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Builds the thermostat without touching the device.
    #[must_use]
    pub fn build(self) -> Thermostat<C> {
        let delays = self
            .delays
            .unwrap_or_else(|| Arc::new(AdaptiveDelayTable::new(self.config.backoff.clone())));
        Thermostat::new(self.config, self.connector, delays, self.resolver)
    }

    /// Builds the thermostat, probing the served zones first when the
    /// configuration lists none.
    pub async fn build_with_probe(self) -> Thermostat<C> {
        let probe = self.config.detected_zones.is_empty();
        let thermostat = self.build();
        if probe {
            thermostat.get_available_zones().await;
        }
        thermostat
    }
}

impl<C: GattConnector> std::fmt::Debug for ThermostatBuilder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThermostatBuilder")
            .field("config", &self.config)
            .field("shared_delays", &self.delays.is_some())
            .finish_non_exhaustive()
    }
}
