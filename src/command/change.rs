// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `Changes` body of a `Change` command.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::types::{DeviceMode, HvacMode, ZoneId};

/// Setpoint fields of a `Change` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetpointField {
    /// Cool mode setpoint.
    Cool,
    /// Heat mode setpoint.
    Heat,
    /// Dry mode setpoint.
    Dry,
    /// Lower bound in auto mode.
    AutoHeat,
    /// Upper bound in auto mode.
    AutoCool,
}

impl SetpointField {
    /// Returns the wire field name.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Cool => "cool_sp",
            Self::Heat => "heat_sp",
            Self::Dry => "dry_sp",
            Self::AutoHeat => "autoHeat_sp",
            Self::AutoCool => "autoCool_sp",
        }
    }

    /// Returns the single setpoint used in `mode`, if it has one.
    ///
    /// Auto uses a range and has no single setpoint.
    #[must_use]
    pub const fn for_hvac_mode(mode: HvacMode) -> Option<Self> {
        match mode {
            HvacMode::Cool => Some(Self::Cool),
            HvacMode::Heat => Some(Self::Heat),
            HvacMode::Dry => Some(Self::Dry),
            _ => None,
        }
    }
}

/// Fan fields of a `Change` command.
///
/// Each mode family stores its fan setting separately on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FanField {
    /// Fan-only mode.
    FanOnly,
    /// Cool mode.
    Cool,
    /// Furnace heat modes (3, 4).
    Gas,
    /// Electric heat modes (5, 7, 12).
    Electric,
    /// Auto modes (8-11).
    Auto,
}

impl FanField {
    /// Returns the wire field name.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::FanOnly => "fanOnly",
            Self::Cool => "coolFan",
            Self::Gas => "gasFan",
            Self::Electric => "eleFan",
            Self::Auto => "autoFan",
        }
    }

    /// Returns the fan field that applies while the zone runs in `mode`.
    #[must_use]
    pub const fn for_mode(mode: DeviceMode) -> Option<Self> {
        match mode.hvac_mode() {
            HvacMode::FanOnly => Some(Self::FanOnly),
            HvacMode::Cool => Some(Self::Cool),
            HvacMode::Heat if mode.is_furnace() => Some(Self::Gas),
            HvacMode::Heat => Some(Self::Electric),
            HvacMode::Auto => Some(Self::Auto),
            HvacMode::Off | HvacMode::Dry => None,
        }
    }
}

/// Field mutations carried by a `Change` command.
///
/// # Examples
///
/// ```
/// use easytouch_lib::command::{ChangeSet, FanField};
/// use easytouch_lib::types::DeviceMode;
///
/// let changes = ChangeSet::zone(2)
///     .with_power(true)
///     .with_mode(DeviceMode::COOL)
///     .with_fan(FanField::Cool, 2);
///
/// assert_eq!(changes.target_zone(), Some(2));
/// assert_eq!(changes.get("mode"), Some(&serde_json::json!(2)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    zone: Option<ZoneId>,
    #[serde(flatten)]
    fields: BTreeMap<String, Value>,
}

impl ChangeSet {
    /// Creates an empty change set for `zone`.
    #[must_use]
    pub fn zone(zone: ZoneId) -> Self {
        Self {
            zone: Some(zone),
            fields: BTreeMap::new(),
        }
    }

    /// Creates an empty system-wide change set.
    #[must_use]
    pub fn system() -> Self {
        Self::default()
    }

    /// Sets `power`.
    ///
    /// On a zone, `power: 1` with mode 0 switches just that zone off.
    /// System-wide, `power: 0` switches every zone off.
    #[must_use]
    pub fn with_power(self, on: bool) -> Self {
        self.with_field("power", u8::from(on))
    }

    /// Sets `mode`.
    #[must_use]
    pub fn with_mode(self, mode: DeviceMode) -> Self {
        self.with_field("mode", mode.value())
    }

    /// Sets a setpoint.
    #[must_use]
    pub fn with_setpoint(self, field: SetpointField, value: i32) -> Self {
        self.with_field(field.key(), value)
    }

    /// Sets a fan speed.
    #[must_use]
    pub fn with_fan(self, field: FanField, speed: u8) -> Self {
        self.with_field(field.key(), speed)
    }

    /// Adds the reboot request.
    #[must_use]
    pub fn with_reset(self) -> Self {
        self.with_field("reset", " OK")
    }

    /// Sets an arbitrary field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns the target zone, `None` for system-wide changes.
    #[must_use]
    pub const fn target_zone(&self) -> Option<ZoneId> {
        self.zone
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
