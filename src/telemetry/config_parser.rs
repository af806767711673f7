// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Zone configuration response parsing.

use serde_json::Value;

use crate::capabilities::ZoneConfig;
use crate::error::DecodeError;

/// Parses a `Get Config` response.
///
/// The configuration block under `CFG` may be a JSON object or a string
/// holding JSON.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] if the payload or an embedded `CFG` string
/// is not valid JSON, [`DecodeError::NotConfig`] if the payload is another
/// kind of response, and [`DecodeError::InvalidField`] if `CFG` has an
/// unexpected shape.
///
/// # Examples
///
/// ```
/// use easytouch_lib::telemetry::parse_zone_config;
///
/// let raw = br#"{"Type":"Response","RT":"Config","CFG":"{\"MAV\":260,\"SPL\":[55,95,40,90]}"}"#;
/// let config = parse_zone_config(raw).unwrap();
/// assert_eq!(config.mode_availability, 260);
/// assert_eq!(config.max_temp(), 95);
/// ```
pub fn parse_zone_config(raw: &[u8]) -> Result<ZoneConfig, DecodeError> {
    let payload: Value = serde_json::from_slice(raw)?;
    let object = payload
        .as_object()
        .ok_or_else(|| DecodeError::NotConfig("payload is not an object".to_string()))?;

    if let Some(kind) = object.get("Type").and_then(Value::as_str)
        && kind != "Response"
    {
        return Err(DecodeError::NotConfig(format!("Type is {kind:?}")));
    }
    if let Some(response_type) = object.get("RT").and_then(Value::as_str)
        && response_type != "Config"
    {
        return Err(DecodeError::NotConfig(format!("RT is {response_type:?}")));
    }

    let config = match object.get("CFG") {
        Some(Value::String(text)) => serde_json::from_str(text)?,
        Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())?,
        Some(other) => {
            return Err(DecodeError::InvalidField {
                field: "CFG",
                message: format!("expected object or string, got {other}"),
            });
        }
        None => return Err(DecodeError::NotConfig("missing CFG".to_string())),
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_config() {
        let raw = br#"{"Type":"Response","RT":"Config","CFG":{"MAV":294,"FA":[0,0,162],"SPL":[60,85,50,85],"MA":[0,1]}}"#;
        let config = parse_zone_config(raw).unwrap();
        assert_eq!(config.mode_availability, 294);
        assert_eq!(config.fan_abilities, vec![0, 0, 162]);
        assert_eq!(config.mode_attributes, vec![0, 1]);
    }

    #[test]
    fn string_config() {
        let raw = br#"{"Type":"Response","RT":"Config","CFG":"{\"MAV\":4}"}"#;
        let config = parse_zone_config(raw).unwrap();
        assert_eq!(config.mode_availability, 4);
        assert_eq!(config.setpoint_limits, vec![60, 85, 50, 85]);
    }

    #[test]
    fn status_payload_is_not_config() {
        let raw = br#"{"Z_sts":{"0":[70,75,72,70,0,0,1,2,5,128,5,0,68,0,0,4]}}"#;
        assert!(matches!(parse_zone_config(raw), Err(DecodeError::NotConfig(_))));

        let raw = br#"{"Type":"Response","RT":"Status"}"#;
        assert!(matches!(parse_zone_config(raw), Err(DecodeError::NotConfig(_))));
    }

    #[test]
    fn malformed_config() {
        assert!(matches!(parse_zone_config(b"[]"), Err(DecodeError::NotConfig(_))));
        assert!(matches!(
            parse_zone_config(br#"{"CFG":42}"#),
            Err(DecodeError::InvalidField { field: "CFG", .. })
        ));
        assert!(matches!(
            parse_zone_config(br#"{"CFG":"{broken"}"#),
            Err(DecodeError::Json(_))
        ));
    }
}
