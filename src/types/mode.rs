// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Operating mode tables.
//!
//! The thermostat reports and accepts a raw mode number (0-15). Several raw
//! numbers collapse onto the same coarse [`HvacMode`]: furnace, heat pump,
//! heat strip and electric heat are all "heat", and the three backup
//! variants of auto are all "auto".
//!
//! | Raw | Meaning                      | [`HvacMode`] |
//! |-----|------------------------------|--------------|
//! | 0   | Off                          | Off          |
//! | 1   | Fan only                     | `FanOnly`    |
//! | 2   | Cool                         | Cool         |
//! | 3   | Gas furnace                  | Heat         |
//! | 4   | Furnace                      | Heat         |
//! | 5   | Heat pump                    | Heat         |
//! | 6   | Dry                          | Dry          |
//! | 7   | Heat strip                   | Heat         |
//! | 8   | Auto                         | Auto         |
//! | 9   | Auto, heat strip backup      | Auto         |
//! | 10  | Auto, heat pump backup       | Auto         |
//! | 11  | Auto, furnace backup         | Auto         |
//! | 12  | Electric heat                | Heat         |

use std::fmt;
use std::str::FromStr;

/// Raw device operating mode number.
///
/// # Examples
///
/// ```
/// use easytouch_lib::types::{DeviceMode, HvacMode};
///
/// let mode = DeviceMode::new(5);
/// assert_eq!(mode.hvac_mode(), HvacMode::Heat);
/// assert_eq!(mode.status_label(), Some("heat_on"));
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct DeviceMode(u8);

impl DeviceMode {
    /// Highest mode number representable in the availability mask.
    pub const MAX: u8 = 15;

    /// Off.
    pub const OFF: Self = Self(0);
    /// Fan only.
    pub const FAN_ONLY: Self = Self(1);
    /// Cool.
    pub const COOL: Self = Self(2);
    /// Gas furnace heat.
    pub const GAS_FURNACE: Self = Self(3);
    /// Furnace heat.
    pub const FURNACE: Self = Self(4);
    /// Heat pump.
    pub const HEAT_PUMP: Self = Self(5);
    /// Dry / dehumidify.
    pub const DRY: Self = Self(6);
    /// Heat strip.
    pub const HEAT_STRIP: Self = Self(7);
    /// Auto.
    pub const AUTO: Self = Self(8);
    /// Electric heat.
    pub const ELECTRIC_HEAT: Self = Self(12);

    /// Wraps a raw mode number.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Returns the raw mode number.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Returns the label the status payload uses for this mode, if any.
    #[must_use]
    pub const fn status_label(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("off"),
            1 => Some("fan"),
            2 => Some("cool"),
            3 => Some("cool_on"),
            4 => Some("heat"),
            5 => Some("heat_on"),
            8 | 10 | 11 => Some("auto"),
            _ => None,
        }
    }

    /// Returns the coarse HVAC mode. Unknown numbers map to [`HvacMode::Off`].
    #[must_use]
    pub const fn hvac_mode(self) -> HvacMode {
        match self.0 {
            1 => HvacMode::FanOnly,
            2 => HvacMode::Cool,
            3 | 4 | 5 | 7 | 12 => HvacMode::Heat,
            6 => HvacMode::Dry,
            8..=11 => HvacMode::Auto,
            _ => HvacMode::Off,
        }
    }

    /// Returns the heat source preset for this mode, if it is a heat mode.
    #[must_use]
    pub const fn heat_preset(self) -> Option<HeatPreset> {
        match self.0 {
            3 => Some(HeatPreset::GasFurnace),
            4 => Some(HeatPreset::Furnace),
            5 => Some(HeatPreset::HeatPump),
            7 => Some(HeatPreset::HeatStrip),
            12 => Some(HeatPreset::ElectricHeat),
            _ => None,
        }
    }

    /// Returns `true` for the furnace heat modes (3 and 4).
    #[must_use]
    pub const fn is_furnace(self) -> bool {
        matches!(self.0, 3 | 4)
    }
}

impl From<u8> for DeviceMode {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse climate mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    /// Zone off.
    Off,
    /// Heating.
    Heat,
    /// Cooling.
    Cool,
    /// Automatic heat/cool.
    Auto,
    /// Fan only.
    FanOnly,
    /// Dehumidify.
    Dry,
}

impl HvacMode {
    /// All modes, in the order front ends list them.
    pub const ALL: [Self; 6] = [
        Self::Off,
        Self::Heat,
        Self::Cool,
        Self::Auto,
        Self::FanOnly,
        Self::Dry,
    ];

    /// Returns the device mode sent when this mode is selected.
    #[must_use]
    pub const fn device_mode(self) -> DeviceMode {
        match self {
            Self::Off => DeviceMode::OFF,
            Self::Heat => DeviceMode::HEAT_PUMP,
            Self::Cool => DeviceMode::COOL,
            Self::Auto => DeviceMode::AUTO,
            Self::FanOnly => DeviceMode::FAN_ONLY,
            Self::Dry => DeviceMode::DRY,
        }
    }

    /// Returns the device modes to try, in order, when the default
    /// [`device_mode`](Self::device_mode) is not available for a zone.
    #[must_use]
    pub fn alternatives(self) -> &'static [u8] {
        match self {
            Self::Heat => &[5, 3, 4, 7, 12],
            Self::Auto => &[8, 9, 10, 11],
            _ => &[],
        }
    }

    /// Returns the mode name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::Auto => "auto",
            Self::FanOnly => "fan_only",
            Self::Dry => "dry",
        }
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named heat source, selectable while a zone is heating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum HeatPreset {
    /// Heat pump (mode 5).
    HeatPump,
    /// Gas furnace (mode 3).
    GasFurnace,
    /// Furnace (mode 4).
    Furnace,
    /// Heat strip (mode 7).
    HeatStrip,
    /// Electric heat (mode 12).
    ElectricHeat,
}

impl HeatPreset {
    /// All presets in display order.
    pub const ALL: [Self; 5] = [
        Self::HeatPump,
        Self::GasFurnace,
        Self::Furnace,
        Self::HeatStrip,
        Self::ElectricHeat,
    ];

    /// Returns the device mode selecting this heat source.
    #[must_use]
    pub const fn device_mode(self) -> DeviceMode {
        match self {
            Self::HeatPump => DeviceMode::HEAT_PUMP,
            Self::GasFurnace => DeviceMode::GAS_FURNACE,
            Self::Furnace => DeviceMode::FURNACE,
            Self::HeatStrip => DeviceMode::HEAT_STRIP,
            Self::ElectricHeat => DeviceMode::ELECTRIC_HEAT,
        }
    }

    /// Returns the display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::HeatPump => "Heat Pump",
            Self::GasFurnace => "Gas Furnace",
            Self::Furnace => "Furnace",
            Self::HeatStrip => "Heat Strip",
            Self::ElectricHeat => "Electric Heat",
        }
    }
}

impl fmt::Display for HeatPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HeatPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown heat preset: {s}"))
    }
}
