// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoded device and zone state.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::capabilities::ZoneConfig;
use crate::types::{DeviceMode, HeatPreset, HvacMode, ZoneId};

/// Number of positional fields in a zone status array.
pub const ZONE_STATUS_LEN: usize = 16;

/// What a zone is actually doing, from its active-state bitmask.
///
/// This can differ from the selected mode: a zone set to heat sits idle
/// once the setpoint is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrentMode {
    /// Idle.
    #[default]
    Off,
    /// Drying (bit 0).
    Dry,
    /// Cooling (bit 1).
    Cool,
    /// Heating (bit 2).
    Heat,
}

impl CurrentMode {
    const DRY_BIT: i64 = 0b001;
    const COOL_BIT: i64 = 0b010;
    const HEAT_BIT: i64 = 0b100;

    /// Derives the activity from an active-state bitmask.
    ///
    /// When several bits are set, cooling wins over heating, which wins over
    /// drying.
    #[must_use]
    pub const fn from_active_state(bits: i64) -> Self {
        if bits & Self::COOL_BIT != 0 {
            Self::Cool
        } else if bits & Self::HEAT_BIT != 0 {
            Self::Heat
        } else if bits & Self::DRY_BIT != 0 {
            Self::Dry
        } else {
            Self::Off
        }
    }

    /// Returns the name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Dry => "dry",
            Self::Cool => "cool",
            Self::Heat => "heat",
        }
    }
}

/// State of one zone, rebuilt from every status payload.
///
/// Positional layout of the status array:
///
/// | Index | Field                     |
/// |-------|---------------------------|
/// | 0     | Auto heat setpoint        |
/// | 1     | Auto cool setpoint        |
/// | 2     | Cool setpoint             |
/// | 3     | Heat setpoint             |
/// | 4     | Dry setpoint              |
/// | 6     | Fan-only fan speed        |
/// | 7     | Cool fan speed            |
/// | 8     | Electric heat fan speed   |
/// | 9     | Auto fan speed            |
/// | 10    | Selected mode             |
/// | 11    | Furnace fan speed         |
/// | 12    | Faceplate temperature     |
/// | 15    | Active-state bitmask      |
///
/// Indices 5, 13 and 14 are not interpreted and kept in [`raw`](Self::raw)
/// whatever their JSON type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ZoneState {
    /// Auto mode lower setpoint.
    pub auto_heat_sp: i64,
    /// Auto mode upper setpoint.
    pub auto_cool_sp: i64,
    /// Cool setpoint.
    pub cool_sp: i64,
    /// Heat setpoint.
    pub heat_sp: i64,
    /// Dry setpoint.
    pub dry_sp: i64,
    /// Fan speed used in fan-only mode.
    pub fan_only_fan: i64,
    /// Fan speed used in cool mode.
    pub cool_fan: i64,
    /// Fan speed used in electric heat modes.
    pub heat_fan: i64,
    /// Fan speed used in auto modes.
    pub auto_fan: i64,
    /// Fan speed used in furnace heat modes.
    pub furnace_fan: i64,
    /// Selected operating mode.
    pub mode_num: DeviceMode,
    /// Temperature measured at the faceplate.
    pub faceplate_temperature: i64,
    /// Raw active-state bitmask.
    pub active_state: i64,
    /// Activity derived from [`active_state`](Self::active_state).
    pub current_mode: CurrentMode,
    /// System power flag (shared by every zone).
    pub on: bool,
    /// Status label of the selected mode, when it has one.
    pub mode_label: Option<&'static str>,
    /// Heat source of the selected mode, when heating.
    pub heat_preset: Option<HeatPreset>,
    /// The status array as reported, untyped. Empty for a placeholder zone.
    pub raw: Vec<Value>,
}

impl ZoneState {
    /// Returns `true` for a placeholder zone with no reported data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Returns the coarse HVAC mode of the selected mode.
    #[must_use]
    pub const fn hvac_mode(&self) -> HvacMode {
        self.mode_num.hvac_mode()
    }

    /// Returns the fan speed that applies to the selected mode.
    ///
    /// Off and dry have no fan setting.
    #[must_use]
    pub const fn active_fan_speed(&self) -> Option<i64> {
        match self.hvac_mode() {
            HvacMode::FanOnly => Some(self.fan_only_fan),
            HvacMode::Cool => Some(self.cool_fan),
            HvacMode::Heat if self.mode_num.is_furnace() => Some(self.furnace_fan),
            HvacMode::Heat => Some(self.heat_fan),
            HvacMode::Auto => Some(self.auto_fan),
            HvacMode::Off | HvacMode::Dry => None,
        }
    }

    /// Returns the single target temperature of the selected mode.
    #[must_use]
    pub const fn target_temperature(&self) -> Option<i64> {
        match self.hvac_mode() {
            HvacMode::Cool => Some(self.cool_sp),
            HvacMode::Heat => Some(self.heat_sp),
            HvacMode::Dry => Some(self.dry_sp),
            _ => None,
        }
    }

    /// Returns the `(low, high)` target range in auto mode.
    #[must_use]
    pub const fn target_range(&self) -> Option<(i64, i64)> {
        match self.hvac_mode() {
            HvacMode::Auto => Some((self.auto_heat_sp, self.auto_cool_sp)),
            _ => None,
        }
    }
}

/// Snapshot of everything known about a device.
///
/// A new snapshot replaces the previous one wholesale on every successful
/// decode; snapshots are never mutated in place once published.
///
/// # Examples
///
/// ```
/// use easytouch_lib::DeviceState;
///
/// let state = DeviceState::default();
/// assert_eq!(state.available_zones, vec![0]);
/// assert!(state.zone(0).is_some_and(|zone| zone.is_empty()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceState {
    /// Serial number (`SN`).
    pub serial: Option<String>,
    /// Controller identifier (`CI`).
    pub controller_id: Option<Value>,
    /// Home-automation indicator (`hA` or `HA`).
    pub ha_indicator: Option<Value>,
    /// Parameter flags (`PRM`).
    pub raw_parameter_flags: Vec<i64>,
    /// Per-zone state.
    pub zones: BTreeMap<ZoneId, ZoneState>,
    /// Zones with valid status data, ascending. Never empty.
    pub available_zones: Vec<ZoneId>,
    /// Zone configurations, fetched separately from status payloads.
    pub zone_configs: BTreeMap<ZoneId, ZoneConfig>,
    /// Copy of zone 0 for single-zone consumers.
    pub root_zone: Option<ZoneState>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            serial: None,
            controller_id: None,
            ha_indicator: None,
            raw_parameter_flags: Vec::new(),
            zones: BTreeMap::from([(0, ZoneState::default())]),
            available_zones: vec![0],
            zone_configs: BTreeMap::new(),
            root_zone: None,
        }
    }
}

impl DeviceState {
    /// Returns the state of `zone`.
    #[must_use]
    pub fn zone(&self, zone: ZoneId) -> Option<&ZoneState> {
        self.zones.get(&zone)
    }

    /// Returns the configuration of `zone`, or an unfetched default.
    #[must_use]
    pub fn zone_config(&self, zone: ZoneId) -> ZoneConfig {
        self.zone_configs.get(&zone).cloned().unwrap_or_default()
    }

    /// Returns `true` if the system power flag is set.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.raw_parameter_flags
            .get(1)
            .is_some_and(|flags| flags & 8 != 0)
    }

    /// Returns a copy carrying `configs` as its zone configurations.
    #[must_use]
    pub fn with_zone_configs(mut self, configs: BTreeMap<ZoneId, ZoneConfig>) -> Self {
        self.zone_configs = configs;
        self
    }

    /// Returns a copy with `config` stored for `zone`.
    #[must_use]
    pub fn with_zone_config(mut self, zone: ZoneId, config: ZoneConfig) -> Self {
        self.zone_configs.insert(zone, config);
        self
    }
}
