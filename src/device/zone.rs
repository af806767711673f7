// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validated per-zone commands.

use crate::capabilities::ZoneConfig;
use crate::command::{ChangeSet, Command, FanField, SetpointField};
use crate::error::CapabilityGap;
use crate::protocol::GattConnector;
use crate::state::ZoneState;
use crate::types::{
    DeviceMode, FULL_AUTO_SPEED, FanModeName, HeatPreset, HvacMode, MANUAL_AUTO_SPEED, ZoneId,
};

use super::Thermostat;

/// Target temperature request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetpointRequest {
    /// One setpoint, applied to the current mode.
    Single(i32),
    /// Auto mode range.
    Range {
        /// Heat below this.
        low: i32,
        /// Cool above this.
        high: i32,
    },
}

/// Reads and changes one zone.
///
/// Every setter checks the zone configuration first; a setting the zone
/// does not offer is logged and rejected without any wire traffic.
pub struct ZoneController<'a, C: GattConnector> {
    thermostat: &'a Thermostat<C>,
    zone: ZoneId,
}

impl<'a, C: GattConnector> ZoneController<'a, C> {
    pub(crate) fn new(thermostat: &'a Thermostat<C>, zone: ZoneId) -> Self {
        Self { thermostat, zone }
    }

    /// Returns the zone number.
    #[must_use]
    pub fn id(&self) -> ZoneId {
        self.zone
    }

    /// Returns the latest reported state of the zone.
    #[must_use]
    pub fn state(&self) -> Option<ZoneState> {
        use crate::subscription::Subscribable;
        self.thermostat.device_data().zone(self.zone).cloned()
    }

    /// Returns the stored configuration of the zone.
    #[must_use]
    pub fn config(&self) -> ZoneConfig {
        self.thermostat.zone_config(self.zone)
    }

    fn mode_num(&self) -> DeviceMode {
        self.state().map_or(DeviceMode::OFF, |state| state.mode_num)
    }

    // ========== Readings ==========

    /// Temperature measured at the faceplate.
    #[must_use]
    pub fn current_temperature(&self) -> Option<i64> {
        self.state()
            .filter(|state| !state.is_empty())
            .map(|state| state.faceplate_temperature)
    }

    /// Single target temperature of the current mode.
    #[must_use]
    pub fn target_temperature(&self) -> Option<i64> {
        self.state()?.target_temperature()
    }

    /// Auto mode target range as `(low, high)`.
    #[must_use]
    pub fn target_range(&self) -> Option<(i64, i64)> {
        self.state()?.target_range()
    }

    /// Lowest setpoint the zone accepts.
    #[must_use]
    pub fn min_temp(&self) -> i32 {
        self.config().min_temp()
    }

    /// Highest setpoint the zone accepts.
    #[must_use]
    pub fn max_temp(&self) -> i32 {
        self.config().max_temp()
    }

    // ========== HVAC Mode ==========

    /// Mode selected on the zone.
    #[must_use]
    pub fn hvac_mode(&self) -> HvacMode {
        self.mode_num().hvac_mode()
    }

    /// Modes the zone offers, or every mode before its configuration is
    /// known.
    #[must_use]
    pub fn hvac_modes(&self) -> Vec<HvacMode> {
        let available = self.config().available_modes();
        let mut modes: Vec<HvacMode> = HvacMode::ALL
            .into_iter()
            .filter(|mode| available.contains(&mode.device_mode()))
            .collect();
        for mode in &available {
            let hvac = mode.hvac_mode();
            if mode.value() <= 12 && !modes.contains(&hvac) {
                modes.push(hvac);
            }
        }
        if modes.is_empty() {
            HvacMode::ALL.to_vec()
        } else {
            modes
        }
    }

    fn resolve_device_mode(&self, mode: HvacMode) -> Result<DeviceMode, CapabilityGap> {
        let config = self.config();
        let preferred = mode.device_mode();
        if config.is_mode_available(preferred) {
            return Ok(preferred);
        }
        mode.alternatives()
            .iter()
            .map(|&value| DeviceMode::new(value))
            .find(|candidate| config.is_mode_available(*candidate))
            .ok_or(CapabilityGap::Mode {
                zone: self.zone,
                mode: preferred.value(),
            })
    }

    /// Switches the zone to `mode`.
    ///
    /// Heat and auto fall back to the first variant the zone offers. Off is
    /// sent as mode 0 with power on, which only affects this zone; use
    /// [`Thermostat::all_zones_off`] to switch the whole system off.
    pub async fn set_hvac_mode(&self, mode: HvacMode) -> bool {
        let device_mode = match self.resolve_device_mode(mode) {
            Ok(device_mode) => device_mode,
            Err(gap) => return self.reject(&gap),
        };
        tracing::debug!(zone = self.zone, mode = %mode, device_mode = %device_mode, "Setting HVAC mode");
        self.send(ChangeSet::zone(self.zone).with_power(true).with_mode(device_mode))
            .await
    }

    // ========== Temperature ==========

    /// Changes the setpoint(s) of the zone.
    ///
    /// A single setpoint goes to the cool, heat or dry setpoint according to
    /// the current mode; a range sets both auto setpoints.
    pub async fn set_temperature(&self, request: SetpointRequest) -> bool {
        let changes = ChangeSet::zone(self.zone).with_power(true);
        let changes = match request {
            SetpointRequest::Single(value) => {
                let Some(field) = SetpointField::for_hvac_mode(self.hvac_mode()) else {
                    return self.reject(&CapabilityGap::Setpoint { zone: self.zone });
                };
                changes.with_setpoint(field, value)
            }
            SetpointRequest::Range { low, high } => changes
                .with_setpoint(SetpointField::AutoHeat, low)
                .with_setpoint(SetpointField::AutoCool, high),
        };
        self.send(changes).await
    }

    // ========== Fan ==========

    fn speed_names(&self, mode: DeviceMode) -> Vec<(u8, FanModeName)> {
        let config = self.config();
        let max_speed = config.fan_capabilities(mode).max_speed;
        config
            .available_fan_speeds(mode)
            .into_iter()
            .map(|speed| (speed, FanModeName::for_speed(speed, max_speed)))
            .collect()
    }

    /// Current fan setting of the zone.
    ///
    /// A zone whose only speed is full auto always reports auto. A raw speed
    /// the configuration does not list is reported as auto as well.
    #[must_use]
    pub fn fan_mode(&self) -> Option<FanModeName> {
        let state = self.state()?;
        let mode = state.mode_num;
        let names = self.speed_names(mode);
        if let [(FULL_AUTO_SPEED, _)] = names.as_slice() {
            return Some(FanModeName::Auto);
        }

        let raw = state.active_fan_speed().unwrap_or(i64::from(FULL_AUTO_SPEED));
        let named = names
            .iter()
            .find(|(speed, _)| i64::from(*speed) == raw)
            .map(|(_, name)| *name);
        if named.is_none() && !names.is_empty() {
            tracing::debug!(zone = self.zone, mode = %mode, raw, "Fan speed not in configuration");
        }
        Some(named.unwrap_or(FanModeName::Auto))
    }

    /// Fan settings offered in the current mode, in device order.
    #[must_use]
    pub fn fan_modes(&self) -> Vec<FanModeName> {
        let mut names = Vec::new();
        for (_, name) in self.speed_names(self.mode_num()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        if names.is_empty() {
            names.push(FanModeName::Auto);
        }
        names
    }

    fn resolve_fan_speed(&self, mode: DeviceMode, name: FanModeName) -> Result<u8, CapabilityGap> {
        let config = self.config();
        let capabilities = config.fan_capabilities(mode);
        let available = config.available_fan_speeds(mode);

        let speed = match name {
            FanModeName::Off => Some(0),
            FanModeName::Auto => Some(FULL_AUTO_SPEED),
            FanModeName::Low | FanModeName::Medium | FanModeName::High => {
                let candidates: Vec<u8> = available
                    .iter()
                    .copied()
                    .filter(|&speed| {
                        FanModeName::for_speed(speed, capabilities.max_speed) == name
                    })
                    .collect();
                let manual = |speed: &u8| (1..MANUAL_AUTO_SPEED).contains(speed);
                let manual_auto = |speed: &u8| (MANUAL_AUTO_SPEED + 1..FULL_AUTO_SPEED).contains(speed);

                let prefer_auto_offset =
                    mode.hvac_mode() == HvacMode::Auto && capabilities.allow_manual_auto;
                let (preferred, fallback): (&dyn Fn(&u8) -> bool, &dyn Fn(&u8) -> bool) =
                    if prefer_auto_offset {
                        (&manual_auto, &manual)
                    } else {
                        (&manual, &manual_auto)
                    };
                candidates
                    .iter()
                    .copied()
                    .find(|speed| preferred(speed))
                    .or_else(|| candidates.iter().copied().find(|speed| fallback(speed)))
            }
        };

        speed
            .filter(|speed| available.contains(speed))
            .ok_or_else(|| match speed {
                Some(speed) => CapabilityGap::FanSpeed {
                    zone: self.zone,
                    mode: mode.value(),
                    speed,
                },
                None => CapabilityGap::FanMode {
                    zone: self.zone,
                    name: name.to_string(),
                },
            })
    }

    /// Changes the fan setting for the current mode.
    pub async fn set_fan_mode(&self, name: FanModeName) -> bool {
        let mode = self.mode_num();
        let Some(field) = FanField::for_mode(mode) else {
            return self.reject(&CapabilityGap::FanMode {
                zone: self.zone,
                name: name.to_string(),
            });
        };
        let speed = match self.resolve_fan_speed(mode, name) {
            Ok(speed) => speed,
            Err(gap) => return self.reject(&gap),
        };
        tracing::debug!(zone = self.zone, fan = %name, speed, field = field.key(), "Setting fan mode");
        self.send(ChangeSet::zone(self.zone).with_fan(field, speed))
            .await
    }

    // ========== Heat Presets ==========

    /// Heat sources offered by the zone, only while heating.
    #[must_use]
    pub fn preset_modes(&self) -> Vec<HeatPreset> {
        if self.hvac_mode() != HvacMode::Heat {
            return Vec::new();
        }
        let config = self.config();
        HeatPreset::ALL
            .into_iter()
            .filter(|preset| config.is_mode_available(preset.device_mode()))
            .collect()
    }

    /// Heat source in use, only while heating.
    #[must_use]
    pub fn preset_mode(&self) -> Option<HeatPreset> {
        if self.hvac_mode() != HvacMode::Heat {
            return None;
        }
        self.mode_num().heat_preset()
    }

    /// Switches the zone to heat with `preset` as source.
    pub async fn set_preset(&self, preset: HeatPreset) -> bool {
        let mode = preset.device_mode();
        if !self.config().is_mode_available(mode) {
            return self.reject(&CapabilityGap::Mode {
                zone: self.zone,
                mode: mode.value(),
            });
        }
        tracing::debug!(zone = self.zone, preset = %preset, "Setting heat source");
        self.send(ChangeSet::zone(self.zone).with_power(true).with_mode(mode))
            .await
    }

    // ========== Helpers ==========

    fn reject(&self, gap: &CapabilityGap) -> bool {
        tracing::warn!(address = %self.thermostat.address(), zone = self.zone, "{gap}");
        false
    }

    async fn send(&self, changes: ChangeSet) -> bool {
        let sent = self.thermostat.send_command(Command::change(changes)).await;
        if !sent {
            tracing::warn!(address = %self.thermostat.address(), zone = self.zone, "Zone change failed");
        }
        sent
    }
}

impl<C: GattConnector> std::fmt::Debug for ZoneController<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneController")
            .field("address", &self.thermostat.address())
            .field("zone", &self.zone)
            .finish()
    }
}
