// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Zone capability model.
//!
//! Each zone reports a configuration block (`Get Config`) describing which
//! operating modes it supports and which fan speeds are allowed in each mode.
//! This module decodes that block into [`ZoneConfig`] and answers capability
//! questions against it.
//!
//! # Wire Format
//!
//! ```json
//! {"MAV": 294, "FA": [0, 0, 51, ...], "SPL": [55, 95, 40, 95], "MA": [...]}
//! ```
//!
//! - `MAV` - mode availability mask, bit N set means mode N is usable
//! - `FA` - fan ability per mode number, see [`FanCapabilities`]
//! - `SPL` - setpoint limits `[cool_min, cool_max, heat_min, heat_max]`
//!
//! # Unfetched Configuration
//!
//! A zone whose configuration has not been fetched yet has `MAV == 0`. Every
//! mode is then reported as available so callers stay usable until the first
//! configuration round trip completes.

use serde::{Deserialize, Serialize};

use crate::types::{DeviceMode, FULL_AUTO_SPEED, FanModeName, MANUAL_AUTO_SPEED};

/// Setpoint limits used when a zone reports none.
pub const DEFAULT_SETPOINT_LIMITS: [i32; 4] = [60, 85, 50, 85];

fn default_setpoint_limits() -> Vec<i32> {
    DEFAULT_SETPOINT_LIMITS.to_vec()
}

/// Configuration block of a single zone.
///
/// # Examples
///
/// ```
/// use easytouch_lib::ZoneConfig;
/// use easytouch_lib::types::DeviceMode;
///
/// let config: ZoneConfig =
///     serde_json::from_str(r#"{"MAV": 6, "FA": [0, 0, 162], "SPL": [60, 85, 50, 85]}"#).unwrap();
///
/// assert!(config.is_mode_available(DeviceMode::COOL));
/// assert!(!config.is_mode_available(DeviceMode::HEAT_PUMP));
/// assert_eq!(config.available_fan_speeds(DeviceMode::COOL), vec![0, 1, 2, 128]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Mode availability mask.
    #[serde(rename = "MAV", default)]
    pub mode_availability: u32,

    /// Fan ability byte per mode number.
    #[serde(rename = "FA", default)]
    pub fan_abilities: Vec<u32>,

    /// Setpoint limits `[cool_min, cool_max, heat_min, heat_max]`.
    #[serde(rename = "SPL", default = "default_setpoint_limits")]
    pub setpoint_limits: Vec<i32>,

    /// Per-mode auxiliary array, carried as reported.
    #[serde(rename = "MA", default)]
    pub mode_attributes: Vec<i64>,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            mode_availability: 0,
            fan_abilities: Vec::new(),
            setpoint_limits: default_setpoint_limits(),
            mode_attributes: Vec::new(),
        }
    }
}

impl ZoneConfig {
    /// Returns `true` once a configuration with a non-zero mask was fetched.
    #[must_use]
    pub const fn is_fetched(&self) -> bool {
        self.mode_availability != 0
    }

    /// Returns `true` if `mode` is usable, or if the mask is still zero.
    #[must_use]
    pub fn is_mode_available(&self, mode: DeviceMode) -> bool {
        if self.mode_availability == 0 {
            return true;
        }
        mode.value() <= DeviceMode::MAX && self.mode_availability & (1 << mode.value()) != 0
    }

    /// Returns every mode whose bit is set, ascending.
    #[must_use]
    pub fn available_modes(&self) -> Vec<DeviceMode> {
        (0..=DeviceMode::MAX)
            .filter(|bit| self.mode_availability & (1 << bit) != 0)
            .map(DeviceMode::new)
            .collect()
    }

    /// Unpacks the fan ability byte for `mode`.
    ///
    /// A mode beyond the end of `FA` has no fan capability at all.
    #[must_use]
    pub fn fan_capabilities(&self, mode: DeviceMode) -> FanCapabilities {
        self.fan_abilities
            .get(usize::from(mode.value()))
            .map_or_else(FanCapabilities::default, |&byte| {
                FanCapabilities::from_byte(byte)
            })
    }

    /// Returns the raw fan speeds offered in `mode`.
    ///
    /// The order is significant and not sorted: off, manual speeds, then the
    /// auto regimes.
    #[must_use]
    pub fn available_fan_speeds(&self, mode: DeviceMode) -> Vec<u8> {
        self.fan_capabilities(mode).available_speeds()
    }

    /// Names a raw fan speed using the fan capabilities of `mode`.
    #[must_use]
    pub fn fan_speed_name(&self, mode: DeviceMode, speed: u8) -> FanModeName {
        FanModeName::for_speed(speed, self.fan_capabilities(mode).max_speed)
    }

    /// Lowest setpoint allowed in any mode.
    #[must_use]
    pub fn min_temp(&self) -> i32 {
        match self.setpoint_limits.as_slice() {
            [cool_min, _, heat_min, ..] => (*cool_min).min(*heat_min),
            _ => DEFAULT_SETPOINT_LIMITS[2],
        }
    }

    /// Highest setpoint allowed in any mode.
    #[must_use]
    pub fn max_temp(&self) -> i32 {
        match self.setpoint_limits.as_slice() {
            [_, cool_max, _, heat_max, ..] => (*cool_max).max(*heat_max),
            _ => DEFAULT_SETPOINT_LIMITS[3],
        }
    }
}

/// Fan abilities of one zone in one mode.
///
/// Packed in a single byte:
///
/// | Bits | Meaning                       |
/// |------|-------------------------------|
/// | 0-3  | Maximum manual speed          |
/// | 4    | Fixed speed                   |
/// | 5    | Off allowed                   |
/// | 6    | Manual auto (64-67) allowed   |
/// | 7    | Full auto (128) allowed       |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
// The four flags are independent bits of the device byte.
#[allow(clippy::struct_excessive_bools)]
pub struct FanCapabilities {
    /// Maximum manual speed.
    pub max_speed: u8,
    /// The fan runs at a single forced speed.
    pub fixed_speed: bool,
    /// The fan may be switched off.
    pub allow_off: bool,
    /// Manual auto is allowed.
    pub allow_manual_auto: bool,
    /// Full auto is allowed.
    pub allow_full_auto: bool,
}

impl FanCapabilities {
    const MAX_SPEED_MASK: u32 = 0x0F;
    const FIXED_SPEED: u32 = 0x10;
    const ALLOW_OFF: u32 = 0x20;
    const MANUAL_AUTO: u32 = 0x40;
    const FULL_AUTO: u32 = 0x80;

    /// Unpacks a fan ability byte.
    #[must_use]
    pub const fn from_byte(byte: u32) -> Self {
        Self {
            #[allow(clippy::cast_possible_truncation)]
            max_speed: (byte & Self::MAX_SPEED_MASK) as u8,
            fixed_speed: byte & Self::FIXED_SPEED != 0,
            allow_off: byte & Self::ALLOW_OFF != 0,
            allow_manual_auto: byte & Self::MANUAL_AUTO != 0,
            allow_full_auto: byte & Self::FULL_AUTO != 0,
        }
    }

    /// Returns the raw fan speeds these abilities allow.
    #[must_use]
    pub fn available_speeds(&self) -> Vec<u8> {
        if self.fixed_speed {
            let forced = if self.max_speed == 0 { 1 } else { self.max_speed };
            return vec![forced];
        }

        let mut speeds = Vec::with_capacity(6);
        if self.allow_off {
            speeds.push(0);
        }
        speeds.extend(1..=self.max_speed.min(3));
        if self.max_speed == 0
            && self.allow_off
            && !self.allow_manual_auto
            && !self.allow_full_auto
        {
            speeds.push(FULL_AUTO_SPEED);
        }
        if self.allow_manual_auto {
            speeds.push(MANUAL_AUTO_SPEED);
        }
        if self.allow_full_auto {
            speeds.push(FULL_AUTO_SPEED);
        }
        speeds
    }
}
