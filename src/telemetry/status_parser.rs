// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Status payload decoding.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::state::{CurrentMode, DeviceState, ZONE_STATUS_LEN, ZoneState};
use crate::types::{DeviceMode, ZoneId};

/// Top-level status payload as sent by the device.
#[derive(Debug, Deserialize)]
struct StatusPayload {
    #[serde(rename = "Z_sts")]
    zone_status: Option<Map<String, Value>>,

    #[serde(rename = "PRM", default)]
    parameter_flags: Vec<Value>,

    #[serde(rename = "SN")]
    serial: Option<Value>,

    #[serde(rename = "CI")]
    controller_id: Option<Value>,

    #[serde(rename = "hA")]
    ha_indicator: Option<Value>,

    #[serde(rename = "HA")]
    ha_indicator_upper: Option<Value>,
}

/// Decodes a status payload, carrying `previous` zone configurations forward.
///
/// Never fails: a payload that is not JSON or has no `Z_sts` mapping yields
/// the single placeholder zone 0.
///
/// # Examples
///
/// ```
/// use easytouch_lib::DeviceState;
/// use easytouch_lib::telemetry::decode_status;
///
/// let raw = br#"{"Z_sts":{"0":[70,75,72,70,0,0,1,2,5,128,5,0,68,0,0,4]},"PRM":[0,8]}"#;
/// let state = decode_status(raw, &DeviceState::default());
///
/// let zone = state.zone(0).unwrap();
/// assert_eq!(zone.mode_num.value(), 5);
/// assert_eq!(zone.faceplate_temperature, 68);
/// assert!(zone.on);
///
/// let degraded = decode_status(b"not json", &state);
/// assert_eq!(degraded.available_zones, vec![0]);
/// ```
#[must_use]
pub fn decode_status(raw: &[u8], previous: &DeviceState) -> DeviceState {
    let decoded = try_decode_status(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Status payload unusable, using placeholder state");
        DeviceState::default()
    });
    decoded.with_zone_configs(previous.zone_configs.clone())
}

/// Decodes a status payload, reporting why it could not be used.
///
/// The returned state carries no zone configurations.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] if the payload is not a JSON object, and
/// [`DecodeError::MissingZoneStatus`] if it has no `Z_sts` mapping.
pub fn try_decode_status(raw: &[u8]) -> Result<DeviceState, DecodeError> {
    let payload: StatusPayload = serde_json::from_slice(raw)?;
    let zone_status = payload.zone_status.ok_or(DecodeError::MissingZoneStatus)?;

    let flags: Vec<i64> = payload
        .parameter_flags
        .iter()
        .filter_map(Value::as_i64)
        .collect();
    let on = flags.get(1).is_some_and(|f| f & 8 != 0);

    let mut zones = BTreeMap::new();
    for (key, value) in &zone_status {
        match decode_zone(key, value, on) {
            Ok((zone, state)) => {
                zones.insert(zone, state);
            }
            Err(e) => tracing::warn!(zone = %key, error = %e, "Skipping zone"),
        }
    }

    if zones.is_empty() {
        tracing::warn!("No valid zones in status payload, using placeholder zone 0");
        zones.insert(0, ZoneState::default());
    }

    let available_zones: Vec<ZoneId> = zones.keys().copied().collect();
    let root_zone = zones.get(&0).filter(|zone| !zone.is_empty()).cloned();

    tracing::debug!(zones = ?available_zones, on, "Decoded status payload");

    Ok(DeviceState {
        serial: payload.serial.map(|serial| match serial {
            Value::String(s) => s,
            other => other.to_string(),
        }),
        controller_id: payload.controller_id,
        ha_indicator: payload.ha_indicator.or(payload.ha_indicator_upper),
        raw_parameter_flags: flags,
        zones,
        available_zones,
        zone_configs: BTreeMap::new(),
        root_zone,
    })
}

fn invalid(message: impl Into<String>) -> DecodeError {
    DecodeError::InvalidField {
        field: "Z_sts",
        message: message.into(),
    }
}

/// Reads an interpreted position. Fractional numbers are rounded.
fn number_at(info: &[Value], index: usize) -> Result<i64, DecodeError> {
    let value = &info[index];
    if let Some(number) = value.as_i64() {
        return Ok(number);
    }
    match value.as_f64() {
        #[allow(clippy::cast_possible_truncation)]
        Some(number) if number.is_finite() && number.abs() < 1e15 => Ok(number.round() as i64),
        _ => Err(invalid(format!("position {index} is not a number: {value}"))),
    }
}

fn decode_zone(key: &str, value: &Value, on: bool) -> Result<(ZoneId, ZoneState), DecodeError> {
    let zone: ZoneId = key
        .trim()
        .parse()
        .map_err(|_| invalid(format!("zone key {key:?} is not a zone number")))?;

    let info = value
        .as_array()
        .ok_or_else(|| invalid("zone status is not an array"))?;
    if info.len() < ZONE_STATUS_LEN {
        return Err(invalid(format!(
            "zone status has {} elements, expected {ZONE_STATUS_LEN}",
            info.len()
        )));
    }

    let field = |index: usize| number_at(info, index);

    let mode = field(10)?;
    let mode_num = u8::try_from(mode)
        .ok()
        .filter(|value| *value <= DeviceMode::MAX)
        .map(DeviceMode::new)
        .ok_or_else(|| invalid(format!("mode {mode} out of range")))?;
    let active_state = field(15)?;

    let state = ZoneState {
        auto_heat_sp: field(0)?,
        auto_cool_sp: field(1)?,
        cool_sp: field(2)?,
        heat_sp: field(3)?,
        dry_sp: field(4)?,
        fan_only_fan: field(6)?,
        cool_fan: field(7)?,
        heat_fan: field(8)?,
        auto_fan: field(9)?,
        mode_num,
        furnace_fan: field(11)?,
        faceplate_temperature: field(12)?,
        active_state,
        current_mode: CurrentMode::from_active_state(active_state),
        on,
        mode_label: mode_num.status_label(),
        heat_preset: mode_num.heat_preset(),
        raw: info.clone(),
    };
    Ok((zone, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::ZoneConfig;
    use crate::types::HeatPreset;

    const SCENARIO: &[u8] =
        br#"{"Z_sts":{"0":[70,75,72,70,0,0,1,2,5,128,5,0,68,0,0,4]},"PRM":[0,8]}"#;

    #[test]
    fn scenario_payload() {
        let state = try_decode_status(SCENARIO).unwrap();
        let zone = state.zone(0).unwrap();

        assert_eq!(zone.mode_num, DeviceMode::HEAT_PUMP);
        assert_eq!(zone.mode_label, Some("heat_on"));
        assert_eq!(zone.current_mode, CurrentMode::Heat);
        assert!(zone.on);
        assert_eq!(zone.faceplate_temperature, 68);
        assert_eq!(zone.auto_heat_sp, 70);
        assert_eq!(zone.auto_cool_sp, 75);
        assert_eq!(zone.cool_sp, 72);
        assert_eq!(zone.heat_sp, 70);
        assert_eq!(zone.heat_fan, 5);
        assert_eq!(zone.auto_fan, 128);
        assert_eq!(zone.heat_preset, Some(HeatPreset::HeatPump));
        assert_eq!(state.available_zones, vec![0]);
        assert_eq!(state.root_zone.as_ref(), Some(zone));
        assert!(state.is_on());
    }

    #[test]
    fn invalid_json_degrades_to_placeholder() {
        let state = decode_status(b"{not json", &DeviceState::default());
        assert_eq!(state, DeviceState::default());
        assert!(matches!(
            try_decode_status(b"{not json"),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn missing_zone_status_degrades_to_placeholder() {
        let raw = br#"{"PRM":[0,8],"SN":"X1"}"#;
        assert!(matches!(
            try_decode_status(raw),
            Err(DecodeError::MissingZoneStatus)
        ));
        assert_eq!(decode_status(raw, &DeviceState::default()).available_zones, vec![0]);
    }

    #[test]
    fn short_zone_is_skipped_without_aborting() {
        let raw = br#"{"Z_sts":{
            "1":[70,75,72,70,0,0,1,2,5,128,2,0,71,0,0,2],
            "2":[70,75,72],
            "3":[68,74,73,69,0,0,1,2,5,128,8,0,70,0,0,0]
        },"PRM":[0,3]}"#;
        let state = try_decode_status(raw).unwrap();

        assert_eq!(state.available_zones, vec![1, 3]);
        assert!(state.zone(2).is_none());
        assert!(state.root_zone.is_none());
        assert!(!state.zone(1).unwrap().on);
    }

    #[test]
    fn no_valid_zones_yields_placeholder() {
        let raw = br#"{"Z_sts":{"0":[1,2,3]},"PRM":[0,8]}"#;
        let state = try_decode_status(raw).unwrap();
        assert_eq!(state.available_zones, vec![0]);
        assert!(state.zone(0).unwrap().is_empty());
        assert!(state.root_zone.is_none());
    }

    #[test]
    fn non_integer_and_bad_keys_are_skipped() {
        let raw = br#"{"Z_sts":{
            "x":[70,75,72,70,0,0,1,2,5,128,2,0,71,0,0,2],
            "1":[70,"75",72,70,0,0,1,2,5,128,2,0,71,0,0,2],
            "2":[70,75,72,70,0,0,1,2,5,128,2,0,71,0,0,2]
        }}"#;
        let state = try_decode_status(raw).unwrap();
        assert_eq!(state.available_zones, vec![2]);
    }

    #[test]
    fn uninterpreted_positions_accept_any_value() {
        let raw = br#"{"Z_sts":{
            "0":[70,75,72.5,70,0,"x",1,2,5,128,2,0,71,{},null,2],
            "1":[68,76,74,69,0,0,1,2,5,65,3,2,66,0,null,4]
        },"PRM":[0,8]}"#;
        let state = try_decode_status(raw).unwrap();

        assert_eq!(state.available_zones, vec![0, 1]);
        let zone = state.zone(0).unwrap();
        assert_eq!(zone.cool_sp, 73);
        assert_eq!(zone.raw[5], Value::from("x"));
        assert_eq!(zone.raw[14], Value::Null);
        assert_eq!(state.zone(1).unwrap().mode_num, DeviceMode::GAS_FURNACE);
    }

    #[test]
    fn mode_above_fifteen_is_rejected() {
        let raw = br#"{"Z_sts":{
            "1":[70,75,72,70,0,0,1,2,5,128,200,0,71,0,0,2],
            "2":[70,75,72,70,0,0,1,2,5,128,15,0,71,0,0,2],
            "3":[70,75,72,70,0,0,1,2,5,128,16,0,71,0,0,2]
        }}"#;
        let state = try_decode_status(raw).unwrap();
        assert_eq!(state.available_zones, vec![2]);
        assert_eq!(state.zone(2).unwrap().mode_num, DeviceMode::new(15));
    }

    #[test]
    fn power_flag_absent_is_off() {
        let raw = br#"{"Z_sts":{"0":[70,75,72,70,0,0,1,2,5,128,2,0,71,0,0,2]}}"#;
        let state = try_decode_status(raw).unwrap();
        assert!(!state.zone(0).unwrap().on);
    }

    #[test]
    fn metadata_fields() {
        let raw = br#"{"Z_sts":{"0":[70,75,72,70,0,0,1,2,5,128,2,0,71,0,0,2]},
            "SN":12345,"CI":"abc","HA":1}"#;
        let state = try_decode_status(raw).unwrap();
        assert_eq!(state.serial.as_deref(), Some("12345"));
        assert_eq!(state.controller_id, Some(Value::from("abc")));
        assert_eq!(state.ha_indicator, Some(Value::from(1)));
    }

    #[test]
    fn zone_configs_carried_forward() {
        let previous = DeviceState::default().with_zone_config(
            0,
            ZoneConfig {
                mode_availability: 0x0127,
                ..ZoneConfig::default()
            },
        );

        let first = decode_status(SCENARIO, &previous);
        let raw = br#"{"Z_sts":{"0":[65,78,74,66,0,0,1,2,5,128,2,0,70,0,0,2]},"PRM":[0,8]}"#;
        let second = decode_status(raw, &first);

        assert_eq!(second.zone_configs, previous.zone_configs);
        assert_eq!(decode_status(b"garbage", &second).zone_configs, previous.zone_configs);
    }
}
