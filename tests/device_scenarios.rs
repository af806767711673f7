// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios against the scripted thermostat.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{ADDRESS, MockConnector, MockDevice, TWO_ZONES, ZONE_1_CONFIG, ZONE_2_CONFIG, config};
use easytouch_lib::manager::PollingConfig;
use easytouch_lib::protocol::{DeviceHandle, DeviceRef};
use easytouch_lib::types::{DeviceMode, FanModeName, HeatPreset, HvacMode};
use easytouch_lib::{Command, SetpointRequest, Subscribable, Thermostat};
use serde_json::json;

fn thermostat(device: &Arc<MockDevice>) -> Thermostat<MockConnector> {
    Thermostat::builder(config(), device.connector()).build()
}

fn last_changes(device: &MockDevice) -> serde_json::Value {
    device
        .commands_of("Change")
        .last()
        .map(|command| command["Changes"].clone())
        .unwrap()
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

// ============================================================================
// Status
// ============================================================================

mod status {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn request_status_publishes_snapshot() {
        let device = MockDevice::new(TWO_ZONES);
        let thermostat = thermostat(&device);
        let seen = counter();
        let listener = Arc::clone(&seen);
        let _subscription = thermostat.subscribe_updates(move |state| {
            assert_eq!(state.available_zones, vec![1, 2]);
            listener.fetch_add(1, Ordering::SeqCst);
        });

        assert!(thermostat.request_status(1).await);

        let state = thermostat.device_data();
        assert_eq!(state.serial.as_deref(), Some("ET-1234"));
        assert!(state.is_on());
        assert_eq!(state.zone(1).unwrap().cool_sp, 72);
        assert_eq!(state.zone(2).unwrap().heat_preset, Some(HeatPreset::GasFurnace));
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        let request = &device.commands_of("Get Status")[0];
        assert_eq!(request["Zone"], 1);
        assert_eq!(request["EM"], "me@example.com");
        assert!(request["TM"].is_i64());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_payload_keeps_snapshot() {
        let device = MockDevice::new(TWO_ZONES);
        let thermostat = thermostat(&device);
        assert!(thermostat.request_status(1).await);

        device.set_status(b"<html>not a status</html>");
        assert!(!thermostat.request_status(1).await);

        assert_eq!(thermostat.device_data().available_zones, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn bare_listener_until_unsubscribed() {
        let device = MockDevice::new(TWO_ZONES);
        let thermostat = thermostat(&device);
        let seen = counter();
        let listener = Arc::clone(&seen);
        let subscription = thermostat.on_update(move || {
            listener.fetch_add(1, Ordering::SeqCst);
        });

        assert!(thermostat.request_status(1).await);
        assert!(subscription.unsubscribe());
        assert!(thermostat.request_status(1).await);

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn advertisement_republishes_current_state() {
        let device = MockDevice::new(TWO_ZONES);
        let thermostat = thermostat(&device);
        let seen = counter();
        let listener = Arc::clone(&seen);
        let _subscription = thermostat.subscribe_updates(move |state| {
            assert_eq!(state.available_zones, vec![0]);
            listener.fetch_add(1, Ordering::SeqCst);
        });

        thermostat.handle_advertisement(DeviceHandle::new(ADDRESS).with_rssi(-60));

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(device.connects(), 0);
    }
}

// ============================================================================
// Zone Configuration
// ============================================================================

mod zone_config {
    use super::*;

    fn configured_device() -> Arc<MockDevice> {
        MockDevice::new(TWO_ZONES)
            .with_config(1, ZONE_1_CONFIG)
            .with_config(2, ZONE_2_CONFIG)
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_object_and_string_configs() {
        let device = configured_device();
        let thermostat = thermostat(&device);

        let zone1 = thermostat.get_zone_config(1).await.unwrap();
        let zone2 = thermostat.get_zone_config(2).await.unwrap();

        assert_eq!(zone1.mode_availability, 397);
        assert_eq!(zone2.mode_availability, 9);
        assert_eq!(zone2.setpoint_limits, vec![62, 80, 55, 78]);
        assert_eq!(device.commands_of("Get Config")[0], json!({"Type": "Get Config", "Zone": 1}));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_config_yields_none() {
        let device = MockDevice::new(TWO_ZONES);
        let thermostat = thermostat(&device);

        assert!(thermostat.get_zone_config(3).await.is_none());
        assert!(!thermostat.zone_config(3).is_fetched());
    }

    #[tokio::test(start_paused = true)]
    async fn configs_survive_status_updates() {
        let device = configured_device();
        let thermostat = thermostat(&device);

        assert!(thermostat.get_zone_config(1).await.is_some());
        assert!(thermostat.request_status(1).await);

        assert_eq!(thermostat.zone_config(1).mode_availability, 397);
        assert_eq!(thermostat.available_fan_speeds(1, DeviceMode::COOL), vec![0, 1, 2, 3, 128]);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_fetches_only_missing_configs() {
        let device = MockDevice::new(TWO_ZONES).with_config(1, ZONE_1_CONFIG);
        let thermostat = Thermostat::builder(
            config().with_detected_zones(vec![1, 2]),
            device.connector(),
        )
        .build();

        assert_eq!(thermostat.refresh_zone_configs_if_missing().await, 1);
        // Zone 2 is still missing and is the only one asked for again.
        assert_eq!(thermostat.refresh_zone_configs_if_missing().await, 0);

        let zones: Vec<_> = device
            .commands_of("Get Config")
            .iter()
            .map(|command| command["Zone"].as_u64().unwrap())
            .collect();
        assert_eq!(zones, vec![1, 2, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_is_noop_when_complete() {
        let device = configured_device();
        let thermostat = Thermostat::builder(
            config().with_detected_zones(vec![1, 2]),
            device.connector(),
        )
        .build();

        assert_eq!(thermostat.refresh_zone_configs_if_missing().await, 2);
        assert_eq!(thermostat.refresh_zone_configs_if_missing().await, 0);
        assert_eq!(device.commands_of("Get Config").len(), 2);
    }
}

// ============================================================================
// Zone Control
// ============================================================================

mod zone_control {
    use super::*;

    async fn ready(device: &Arc<MockDevice>) -> Thermostat<MockConnector> {
        let thermostat = thermostat(device);
        assert!(thermostat.get_zone_config(1).await.is_some());
        assert!(thermostat.get_zone_config(2).await.is_some());
        assert!(thermostat.request_status(1).await);
        thermostat
    }

    fn device() -> Arc<MockDevice> {
        MockDevice::new(TWO_ZONES)
            .with_config(1, ZONE_1_CONFIG)
            .with_config(2, ZONE_2_CONFIG)
    }

    #[tokio::test(start_paused = true)]
    async fn readings() {
        let device = device();
        let thermostat = ready(&device).await;
        let zone = thermostat.zone(1);

        assert_eq!(zone.hvac_mode(), HvacMode::Cool);
        assert_eq!(zone.current_temperature(), Some(71));
        assert_eq!(zone.target_temperature(), Some(72));
        assert_eq!(zone.fan_mode(), Some(FanModeName::Medium));
        assert_eq!(
            zone.hvac_modes(),
            vec![HvacMode::Off, HvacMode::Cool, HvacMode::Auto, HvacMode::Heat]
        );

        let zone = thermostat.zone(2);
        assert_eq!(zone.hvac_modes(), vec![HvacMode::Off, HvacMode::Heat]);
        assert_eq!(zone.fan_mode(), Some(FanModeName::High));
        assert_eq!(
            zone.fan_modes(),
            vec![FanModeName::Off, FanModeName::Low, FanModeName::High, FanModeName::Auto]
        );
        assert_eq!(zone.preset_modes(), vec![HeatPreset::GasFurnace]);
        assert_eq!(zone.preset_mode(), Some(HeatPreset::GasFurnace));
        assert_eq!(zone.min_temp(), 55);
        assert_eq!(zone.max_temp(), 80);
    }

    #[tokio::test(start_paused = true)]
    async fn heat_selects_available_variant() {
        let device = device();
        let thermostat = ready(&device).await;

        assert!(thermostat.zone(1).set_hvac_mode(HvacMode::Heat).await);
        assert_eq!(last_changes(&device), json!({"zone": 1, "power": 1, "mode": 3}));
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_mode_writes_nothing() {
        let device = device();
        let thermostat = ready(&device).await;

        assert!(!thermostat.zone(2).set_hvac_mode(HvacMode::Cool).await);
        assert!(device.commands_of("Change").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn setpoints() {
        let device = device();
        let thermostat = ready(&device).await;
        let zone = thermostat.zone(1);

        assert!(zone.set_temperature(SetpointRequest::Single(74)).await);
        assert_eq!(last_changes(&device), json!({"zone": 1, "power": 1, "cool_sp": 74}));

        assert!(zone.set_temperature(SetpointRequest::Range { low: 68, high: 76 }).await);
        assert_eq!(
            last_changes(&device),
            json!({"zone": 1, "power": 1, "autoHeat_sp": 68, "autoCool_sp": 76})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fan_modes_map_to_raw_speeds() {
        let device = device();
        let thermostat = ready(&device).await;

        assert!(thermostat.zone(1).set_fan_mode(FanModeName::Low).await);
        assert_eq!(last_changes(&device), json!({"zone": 1, "coolFan": 1}));

        assert!(thermostat.zone(2).set_fan_mode(FanModeName::Auto).await);
        assert_eq!(last_changes(&device), json!({"zone": 2, "gasFan": 128}));

        // Zone 2's furnace fan has no medium speed.
        assert!(!thermostat.zone(2).set_fan_mode(FanModeName::Medium).await);
        assert_eq!(device.commands_of("Change").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn presets_checked_against_config() {
        let device = device();
        let thermostat = ready(&device).await;

        assert!(!thermostat.zone(2).set_preset(HeatPreset::HeatStrip).await);
        assert!(thermostat.zone(1).set_preset(HeatPreset::HeatStrip).await);
        assert_eq!(last_changes(&device), json!({"zone": 1, "power": 1, "mode": 7}));
    }
}

// ============================================================================
// System Commands
// ============================================================================

mod system {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn all_zones_off_is_system_wide() {
        let device = MockDevice::new(TWO_ZONES);
        let thermostat = thermostat(&device);

        assert!(thermostat.all_zones_off().await);
        assert_eq!(last_changes(&device), json!({"power": 0}));
    }

    #[tokio::test(start_paused = true)]
    async fn location_rides_on_status_request() {
        let device = MockDevice::new(TWO_ZONES);
        let thermostat = thermostat(&device);

        assert!(thermostat.set_location(45.123_456, -73.5).await);

        let request = &device.commands_of("Get Status")[0];
        assert_eq!(request["Zone"], 0);
        assert_eq!(request["LAT"], "45.12346");
        assert_eq!(request["LON"], "-73.50000");
    }

    #[tokio::test(start_paused = true)]
    async fn reboot_link_drop_counts_as_success() {
        let device = MockDevice::new(TWO_ZONES);
        device.drop_link_on_reset();
        let thermostat = thermostat(&device);

        assert!(thermostat.reboot_device().await);
        assert_eq!(last_changes(&device), json!({"zone": 0, "reset": " OK"}));

        // The next command reconnects.
        assert!(thermostat.request_status(1).await);
        assert_eq!(device.connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reboot_acknowledged() {
        let device = MockDevice::new(TWO_ZONES);
        let thermostat = thermostat(&device);

        assert!(thermostat.reboot_device().await);
        assert_eq!(device.password_writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reboot_unreachable_fails() {
        let device = MockDevice::new(TWO_ZONES);
        device.refuse_connections();
        let thermostat = thermostat(&device);

        assert!(!thermostat.reboot_device().await);
        assert!(device.commands().is_empty());
    }
}

// ============================================================================
// Zone Discovery
// ============================================================================

mod discovery {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn probe_detects_zones() {
        let device = MockDevice::new(TWO_ZONES);
        let thermostat = Thermostat::builder(config(), device.connector())
            .build_with_probe()
            .await;

        assert_eq!(thermostat.detected_zones(), vec![1, 2]);
        assert_eq!(device.password_writes(), 1);
        let request = &device.commands_of("Get Status")[0];
        assert_eq!(request["Zone"], 0);
        assert_eq!(request["EM"], "me@example.com");
    }

    #[tokio::test(start_paused = true)]
    async fn probe_falls_back_to_zone_zero() {
        let device = MockDevice::new(TWO_ZONES);
        device.refuse_connections();
        let thermostat = thermostat(&device);

        assert_eq!(thermostat.get_available_zones().await, vec![0]);
        assert_eq!(thermostat.detected_zones(), vec![0]);
        assert_eq!(device.connects(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn configured_zones_skip_probe() {
        let device = MockDevice::new(TWO_ZONES);
        let thermostat = Thermostat::builder(config().with_detected_zones(vec![2]), device.connector())
            .build_with_probe()
            .await;

        assert_eq!(thermostat.detected_zones(), vec![2]);
        assert_eq!(device.connects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resolver_supplies_handle() {
        let device = MockDevice::new(TWO_ZONES);
        let lookups = counter();
        let calls = Arc::clone(&lookups);
        let thermostat = Thermostat::builder(config(), device.connector())
            .with_resolver(move |address: &str| {
                calls.fetch_add(1, Ordering::SeqCst);
                Some(DeviceHandle::new(address).with_name("EasyTouch"))
            })
            .build();

        assert_eq!(thermostat.get_available_zones().await, vec![1, 2]);
        assert_eq!(thermostat.get_available_zones().await, vec![1, 2]);
        // The first lookup is remembered.
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn operations_through_given_handle() {
        let device = MockDevice::new(TWO_ZONES);
        let thermostat = thermostat(&device);
        let handle = DeviceHandle::new(ADDRESS.to_lowercase()).with_name("EasyTouch");

        assert!(
            thermostat
                .send_command_via(handle.clone(), Command::get_status(1))
                .await
        );
        assert_eq!(thermostat.get_available_zones_via(handle.clone()).await, vec![1, 2]);
        assert!(thermostat.reboot_device_via(handle.clone()).await);

        let targets = device.targets();
        assert_eq!(targets.len(), 3);
        assert!(targets.iter().all(|target| *target == DeviceRef::Resolved(handle.clone())));
    }

    #[tokio::test(start_paused = true)]
    async fn handle_for_another_device_is_ignored() {
        let device = MockDevice::new(TWO_ZONES);
        let thermostat = thermostat(&device);
        let other = DeviceHandle::new("11:22:33:44:55:66");

        assert!(
            !thermostat
                .send_command_via(other.clone(), Command::get_status(1))
                .await
        );
        assert!(!thermostat.reboot_device_via(other.clone()).await);
        assert_eq!(thermostat.get_available_zones_via(other).await, vec![0]);
        assert_eq!(device.connects(), 0);
    }
}

// ============================================================================
// Polling
// ============================================================================

mod polling {
    use super::*;

    fn polling() -> PollingConfig {
        PollingConfig::default()
            .with_interval(Duration::from_secs(10))
            .with_startup_delay(Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn poller_publishes_status() {
        let device = MockDevice::new(TWO_ZONES);
        let thermostat =
            Thermostat::builder(config().with_polling(polling()), device.connector()).build();
        thermostat.handle_advertisement(DeviceHandle::new(ADDRESS));

        assert!(thermostat.start_polling());
        assert!(!thermostat.start_polling());
        assert!(thermostat.is_polling());

        tokio::time::sleep(Duration::from_secs(3)).await;

        let status = thermostat.poll_status();
        assert!(status.last_success);
        assert!(status.last_poll_time.is_some());
        assert!(!status.in_progress);
        assert_eq!(thermostat.device_data().available_zones, vec![1, 2]);

        thermostat.stop_polling().await;
        assert!(!thermostat.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_poll_is_recorded() {
        let device = MockDevice::new(TWO_ZONES);
        device.refuse_connections();
        let thermostat =
            Thermostat::builder(config().with_polling(polling()), device.connector()).build();
        thermostat.handle_advertisement(DeviceHandle::new(ADDRESS));

        assert!(thermostat.start_polling());
        tokio::time::sleep(Duration::from_secs(5)).await;

        let status = thermostat.poll_status();
        assert!(!status.last_success);
        assert!(status.last_poll_time.is_none());
        assert!(thermostat.is_polling());

        thermostat.shutdown().await;
        assert!(!thermostat.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_or_shut_down_does_not_poll() {
        let device = MockDevice::new(TWO_ZONES);
        let thermostat = thermostat(&device);
        assert!(!thermostat.start_polling());

        let thermostat =
            Thermostat::builder(config().with_polling(polling()), device.connector()).build();
        thermostat.shutdown().await;
        assert!(!thermostat.start_polling());
    }
}
