// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level thermostat abstraction.
//!
//! A [`Thermostat`] owns the connection to one controller and exposes the
//! operations front ends need. Nothing here returns an error: every
//! operation reports failure as `false`, `None` or a fallback value and
//! logs the cause.
//!
//! # Per-Zone Control
//!
//! [`Thermostat::zone`] returns a [`ZoneController`] that validates modes,
//! fan speeds and presets against the zone configuration before anything is
//! written to the device.
//!
//! ```ignore
//! use easytouch_lib::types::{FanModeName, HvacMode};
//!
//! let zone = thermostat.zone(1);
//! if zone.hvac_modes().contains(&HvacMode::Cool) {
//!     zone.set_hvac_mode(HvacMode::Cool).await;
//!     zone.set_fan_mode(FanModeName::Low).await;
//! }
//! ```

mod builder;
mod zone;

pub use builder::ThermostatBuilder;
pub use zone::{SetpointRequest, ZoneController};

use std::sync::Arc;

use parking_lot::RwLock;

use crate::capabilities::{FanCapabilities, ZoneConfig};
use crate::command::{Command, StatusRequest};
use crate::manager::engine::Engine;
use crate::manager::{DeviceConfig, PollStatus, PollingConfig};
use crate::protocol::{AdaptiveDelayTable, DeviceHandle, DeviceResolver, GattConnector};
use crate::state::DeviceState;
use crate::subscription::{Subscribable, Subscription};
use crate::types::{DeviceMode, ZoneId};

/// One `EasyTouch` controller and the zones it serves.
///
/// The type parameter is the BLE transport; see
/// [`GattConnector`](crate::protocol::GattConnector).
///
/// # Examples
///
/// ```ignore
/// use easytouch_lib::{Command, Thermostat};
/// use easytouch_lib::manager::DeviceConfig;
/// use easytouch_lib::subscription::Subscribable;
///
/// let config = DeviceConfig::new("AA:BB:CC:DD:EE:FF").with_credentials("1234", "me@example.com");
/// let thermostat = Thermostat::builder(config, connector).build();
///
/// thermostat.subscribe_updates(|state| {
///     println!("power on: {}", state.is_on());
/// });
/// thermostat.start_polling();
///
/// thermostat.send_command(Command::get_status(0)).await;
/// thermostat.shutdown().await;
/// ```
pub struct Thermostat<C: GattConnector> {
    engine: Arc<Engine<C>>,
    polling: PollingConfig,
    detected_zones: RwLock<Vec<ZoneId>>,
}

impl<C: GattConnector> Thermostat<C> {
    /// Creates a builder.
    #[must_use]
    pub fn builder(config: DeviceConfig, connector: C) -> ThermostatBuilder<C> {
        ThermostatBuilder::new(config, connector)
    }

    pub(crate) fn new(
        config: DeviceConfig,
        connector: Arc<C>,
        delays: Arc<AdaptiveDelayTable>,
        resolver: Arc<dyn DeviceResolver>,
    ) -> Self {
        let engine = Arc::new(Engine::new(&config, connector, delays, resolver));
        Self {
            engine,
            polling: config.polling,
            detected_zones: RwLock::new(config.detected_zones),
        }
    }

    /// Returns the Bluetooth address.
    #[must_use]
    pub fn address(&self) -> &str {
        self.engine.address()
    }

    // ========== Commands ==========

    /// Queues a command and waits for its outcome.
    ///
    /// Returns `true` once the command was written and the device's
    /// response was read back. Returns `false` on failure, on timeout and
    /// after [`shutdown`](Self::shutdown).
    pub async fn send_command(&self, command: Command) -> bool {
        self.engine.submit(command).await
    }

    /// Like [`send_command`](Self::send_command), through a freshly resolved
    /// handle.
    ///
    /// The handle is kept for later operations. Unlike
    /// [`handle_advertisement`](Self::handle_advertisement), storing it
    /// publishes nothing.
    pub async fn send_command_via(&self, handle: DeviceHandle, command: Command) -> bool {
        self.adopt_handle(handle) && self.send_command(command).await
    }

    /// Requests a status report for `zone` and publishes it.
    pub async fn request_status(&self, zone: ZoneId) -> bool {
        let mut request = StatusRequest::new(zone);
        if let Some(email) = &self.engine.credentials().email {
            request = request.with_email(email.clone());
        }
        self.send_command(request.into()).await
    }

    /// Turns every zone off.
    pub async fn all_zones_off(&self) -> bool {
        self.send_command(Command::all_zones_off()).await
    }

    /// Sends the location used by the device for its schedules.
    pub async fn set_location(&self, latitude: f64, longitude: f64) -> bool {
        let request = StatusRequest::new(0).with_location(latitude, longitude);
        self.send_command(request.into()).await
    }

    /// Reboots the controller.
    ///
    /// Runs outside the command queue on a connection of its own.
    pub async fn reboot_device(&self) -> bool {
        self.engine.reboot().await
    }

    /// Like [`reboot_device`](Self::reboot_device), through a freshly
    /// resolved handle.
    pub async fn reboot_device_via(&self, handle: DeviceHandle) -> bool {
        self.adopt_handle(handle) && self.reboot_device().await
    }

    // ========== Zones ==========

    /// Asks the device which zones it serves.
    ///
    /// Uses a short-lived connection of its own and falls back to `[0]`.
    /// The result is remembered as the detected zones.
    pub async fn get_available_zones(&self) -> Vec<ZoneId> {
        let zones = self.engine.probe_zones().await;
        self.detected_zones.write().clone_from(&zones);
        zones
    }

    /// Like [`get_available_zones`](Self::get_available_zones), through a
    /// freshly resolved handle. A handle for another device yields `[0]`.
    pub async fn get_available_zones_via(&self, handle: DeviceHandle) -> Vec<ZoneId> {
        if !self.adopt_handle(handle) {
            return vec![0];
        }
        self.get_available_zones().await
    }

    /// Zones from configuration or the last probe.
    #[must_use]
    pub fn detected_zones(&self) -> Vec<ZoneId> {
        self.detected_zones.read().clone()
    }

    /// Returns a controller for `zone`.
    #[must_use]
    pub fn zone(&self, zone: ZoneId) -> ZoneController<'_, C> {
        ZoneController::new(self, zone)
    }

    fn known_zones(&self) -> Vec<ZoneId> {
        let detected = self.detected_zones();
        if !detected.is_empty() {
            return detected;
        }
        let available = self.engine.store.snapshot().available_zones.clone();
        if available.is_empty() {
            vec![0]
        } else {
            available
        }
    }

    // ========== Zone Configuration ==========

    /// Fetches the configuration of `zone` from the device.
    pub async fn get_zone_config(&self, zone: ZoneId) -> Option<ZoneConfig> {
        if !self.send_command(Command::get_config(zone)).await {
            tracing::warn!(address = %self.address(), zone, "Could not fetch zone configuration");
            return None;
        }
        self.engine.store.snapshot().zone_configs.get(&zone).cloned()
    }

    /// Fetches the configuration of every zone in `zones`.
    ///
    /// Returns how many configurations were stored.
    pub async fn refresh_zone_configs(&self, zones: &[ZoneId]) -> usize {
        let mut stored = 0;
        for &zone in zones {
            if self.get_zone_config(zone).await.is_some() {
                stored += 1;
            }
        }
        tracing::debug!(address = %self.address(), requested = zones.len(), stored, "Zone configurations refreshed");
        stored
    }

    /// Fetches the configurations not yet known.
    ///
    /// Returns how many were stored; `0` when nothing was missing.
    pub async fn refresh_zone_configs_if_missing(&self) -> usize {
        let state = self.engine.store.snapshot();
        let missing: Vec<ZoneId> = self
            .known_zones()
            .into_iter()
            .filter(|zone| !state.zone_config(*zone).is_fetched())
            .collect();
        if missing.is_empty() {
            return 0;
        }
        self.refresh_zone_configs(&missing).await
    }

    /// Returns the stored configuration of `zone`, or an empty one.
    #[must_use]
    pub fn zone_config(&self, zone: ZoneId) -> ZoneConfig {
        self.engine.store.snapshot().zone_config(zone)
    }

    /// See [`ZoneConfig::is_mode_available`].
    #[must_use]
    pub fn is_mode_available(&self, zone: ZoneId, mode: DeviceMode) -> bool {
        self.zone_config(zone).is_mode_available(mode)
    }

    /// See [`ZoneConfig::available_modes`].
    #[must_use]
    pub fn available_modes(&self, zone: ZoneId) -> Vec<DeviceMode> {
        self.zone_config(zone).available_modes()
    }

    /// See [`ZoneConfig::fan_capabilities`].
    #[must_use]
    pub fn fan_capabilities(&self, zone: ZoneId, mode: DeviceMode) -> FanCapabilities {
        self.zone_config(zone).fan_capabilities(mode)
    }

    /// See [`ZoneConfig::available_fan_speeds`].
    #[must_use]
    pub fn available_fan_speeds(&self, zone: ZoneId, mode: DeviceMode) -> Vec<u8> {
        self.zone_config(zone).available_fan_speeds(mode)
    }

    // ========== Discovery ==========

    /// Records a sighting of the device and re-publishes the current state.
    pub fn handle_advertisement(&self, handle: DeviceHandle) {
        tracing::trace!(address = %handle.address, rssi = ?handle.rssi, "Advertisement");
        self.engine.set_handle(handle);
        self.engine.store.notify_current();
    }

    /// Stores `handle` for this thermostat's device without publishing.
    fn adopt_handle(&self, handle: DeviceHandle) -> bool {
        if !handle.address.eq_ignore_ascii_case(self.address()) {
            tracing::warn!(
                address = %self.address(),
                handle = %handle.address,
                "Ignoring handle for another device"
            );
            return false;
        }
        self.engine.set_handle(handle);
        true
    }

    // ========== Polling and Lifecycle ==========

    /// Starts background polling with the configured interval.
    ///
    /// Returns `false` if polling is disabled, already running or the
    /// thermostat is shut down.
    pub fn start_polling(&self) -> bool {
        self.engine.start_polling(&self.polling)
    }

    /// Stops background polling and waits for the poller to exit.
    pub async fn stop_polling(&self) {
        self.engine.stop_polling().await;
    }

    /// Returns `true` while the poller runs.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.engine.is_polling()
    }

    /// Returns the outcome of the most recent poll.
    #[must_use]
    pub fn poll_status(&self) -> PollStatus {
        self.engine.poll_status.lock().clone()
    }

    /// Stops every background task, fails queued commands and disconnects.
    ///
    /// Commands sent afterwards resolve to `false`.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }
}

impl<C: GattConnector> Subscribable for Thermostat<C> {
    fn subscribe_updates<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&DeviceState) + Send + Sync + 'static,
    {
        self.engine.store.callbacks().subscribe(callback)
    }

    fn on_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.engine.store.callbacks().subscribe_bare(callback)
    }

    fn device_data(&self) -> Arc<DeviceState> {
        self.engine.store.snapshot()
    }
}

impl<C: GattConnector> Drop for Thermostat<C> {
    fn drop(&mut self) {
        self.engine.signal_stop();
    }
}

impl<C: GattConnector> std::fmt::Debug for Thermostat<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thermostat")
            .field("address", &self.address())
            .field("detected_zones", &*self.detected_zones.read())
            .field("polling", &self.polling)
            .finish_non_exhaustive()
    }
}
