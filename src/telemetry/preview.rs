// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Log-friendly payload previews.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};

const STATUS_PREVIEW_CHARS: usize = 250;
const TEXT_PREVIEW_CHARS: usize = 200;

/// Short printable preview of a payload and its full base64 encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadPreview {
    /// Compact preview for log lines.
    pub preview: String,
    /// The complete payload, base64 encoded.
    pub full_base64: String,
}

impl PayloadPreview {
    /// Builds the preview of `raw`.
    ///
    /// Status payloads are reduced to `Z_sts` plus the `PRM`, `CI` and `hA`
    /// metadata; anything else is shown as escaped text.
    #[must_use]
    pub fn of(raw: &[u8]) -> Self {
        let preview = status_preview(raw).unwrap_or_else(|| {
            let text = String::from_utf8_lossy(raw);
            truncate(&format!("{text:?}"), TEXT_PREVIEW_CHARS)
        });
        Self {
            preview,
            full_base64: STANDARD.encode(raw),
        }
    }
}

fn status_preview(raw: &[u8]) -> Option<String> {
    let parsed: Value = serde_json::from_slice(raw).ok()?;
    let object = parsed.as_object()?;
    let zone_status = object.get("Z_sts")?;

    let mut preview = Map::new();
    preview.insert("Z_sts".to_string(), zone_status.clone());
    if let Some(flags) = object.get("PRM") {
        preview.insert("PRM".to_string(), flags.clone());
    }
    if let Some(ci) = object.get("CI").filter(|v| !v.is_null()) {
        preview.insert("CI".to_string(), ci.clone());
    }
    if let Some(ha) = object
        .get("hA")
        .or_else(|| object.get("HA"))
        .filter(|v| !v.is_null())
    {
        preview.insert("hA".to_string(), ha.clone());
    }

    let compact = Value::Object(preview).to_string();
    Some(truncate(&compact, STATUS_PREVIEW_CHARS))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
