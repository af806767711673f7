// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Canonical device state and its publication.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::capabilities::ZoneConfig;
use crate::error::DecodeError;
use crate::subscription::CallbackRegistry;
use crate::telemetry::{PayloadPreview, try_decode_status};
use crate::types::ZoneId;

use super::DeviceState;

/// Holds the current [`DeviceState`] snapshot and notifies listeners when
/// it is replaced.
///
/// Readers get an `Arc` to an immutable snapshot; a writer swaps in a new
/// snapshot under the lock and dispatches after releasing it.
#[derive(Debug)]
pub struct StateStore {
    current: RwLock<Arc<DeviceState>>,
    callbacks: Arc<CallbackRegistry>,
}

impl StateStore {
    /// Creates a store holding the placeholder state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(DeviceState::default())),
            callbacks: Arc::new(CallbackRegistry::new()),
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<DeviceState> {
        Arc::clone(&self.current.read())
    }

    /// Returns the listener registry.
    #[must_use]
    pub fn callbacks(&self) -> &Arc<CallbackRegistry> {
        &self.callbacks
    }

    /// Decodes a status payload and publishes it.
    ///
    /// Zone configurations of the current snapshot are carried into the new
    /// one. An unusable payload leaves the current snapshot in place.
    ///
    /// # Errors
    ///
    /// Returns the [`DecodeError`] when the payload cannot be decoded.
    pub fn apply_status(&self, raw: &[u8]) -> Result<Arc<DeviceState>, DecodeError> {
        let preview = PayloadPreview::of(raw);
        tracing::debug!(
            preview = %preview.preview,
            payload_b64 = %preview.full_base64,
            "Status payload received"
        );

        let decoded = match try_decode_status(raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(error = %e, preview = %preview.preview, "Status payload rejected");
                return Err(e);
            }
        };

        let published = {
            let mut current = self.current.write();
            let next = Arc::new(decoded.with_zone_configs(current.zone_configs.clone()));
            *current = Arc::clone(&next);
            next
        };
        self.callbacks.dispatch(&published);
        Ok(published)
    }

    /// Stores the configuration of `zone` and publishes the result.
    pub fn store_zone_config(&self, zone: ZoneId, config: ZoneConfig) -> Arc<DeviceState> {
        tracing::debug!(
            zone,
            mav = config.mode_availability,
            "Storing zone configuration"
        );
        let published = {
            let mut current = self.current.write();
            let next = Arc::new((**current).clone().with_zone_config(zone, config));
            *current = Arc::clone(&next);
            next
        };
        self.callbacks.dispatch(&published);
        published
    }

    /// Re-publishes the current snapshot without changing it.
    pub fn notify_current(&self) {
        let current = self.snapshot();
        self.callbacks.dispatch(&current);
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const STATUS: &[u8] =
        br#"{"Z_sts":{"0":[70,75,72,70,0,0,1,2,5,128,5,0,68,0,0,4]},"PRM":[0,8]}"#;

    #[test]
    fn apply_replaces_and_notifies() {
        let store = StateStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        store.callbacks().subscribe(move |state| {
            assert_eq!(state.zone(0).unwrap().faceplate_temperature, 68);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let before = store.snapshot();
        let after = store.apply_status(STATUS).unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert!(Arc::ptr_eq(&after, &store.snapshot()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejected_payload_keeps_snapshot_and_is_silent() {
        let store = StateStore::new();
        store.apply_status(STATUS).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        store.callbacks().subscribe_bare(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(store.apply_status(b"{}").is_err());
        assert_eq!(store.snapshot().zone(0).unwrap().faceplate_temperature, 68);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zone_configs_survive_status_updates() {
        let store = StateStore::new();
        let config = ZoneConfig {
            mode_availability: 0x0104,
            ..ZoneConfig::default()
        };
        store.store_zone_config(1, config.clone());
        store.apply_status(STATUS).unwrap();
        store.apply_status(STATUS).unwrap();

        assert_eq!(store.snapshot().zone_configs.get(&1), Some(&config));
    }

    #[test]
    fn notify_current_dispatches_snapshot() {
        let store = StateStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        store.callbacks().subscribe_bare(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        store.notify_current();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
