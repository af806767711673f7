// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripted in-memory thermostat shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use easytouch_lib::TransportError;
use easytouch_lib::manager::{DeviceConfig, PollingConfig};
use easytouch_lib::protocol::{DeviceRef, GattConnector, GattLink, uuids};
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

pub const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";

/// Two zones: zone 1 cooling at 72 with fan 2, zone 2 in gas furnace heat.
pub const TWO_ZONES: &[u8] = br#"{"SN":"ET-1234","Z_sts":{
    "1":[70,75,72,70,0,0,1,2,5,128,2,0,71,0,0,2],
    "2":[68,76,74,69,0,0,1,2,5,65,3,2,66,0,0,4]
},"PRM":[0,8]}"#;

/// Zone 1: off, cool, gas furnace, heat strip and auto. Cool fan offers off,
/// three speeds and full auto.
pub const ZONE_1_CONFIG: &[u8] = br#"{"Type":"Response","RT":"Config","CFG":{"MAV":397,"FA":[0,0,163,0,0,0,0,0,195],"SPL":[60,85,50,85]}}"#;

/// Zone 2: off and gas furnace only.
pub const ZONE_2_CONFIG: &[u8] = br#"{"Type":"Response","RT":"Config","CFG":"{\"MAV\":9,\"FA\":[0,0,0,162],\"SPL\":[62,80,55,78]}"}"#;

/// Device state and recorded traffic, shared by every link it hands out.
#[derive(Default)]
pub struct MockDevice {
    status: Mutex<Vec<u8>>,
    configs: Mutex<HashMap<u64, Vec<u8>>>,
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    last_command: Mutex<Option<Value>>,
    connects: AtomicU32,
    disconnects: AtomicU32,
    targets: Mutex<Vec<DeviceRef>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    failing_command_writes: AtomicU32,
    command_delay: Mutex<Duration>,
    drop_on_reset: AtomicBool,
    refuse_connections: AtomicBool,
}

impl MockDevice {
    pub fn new(status: &[u8]) -> Arc<Self> {
        let device = Self::default();
        *device.status.lock() = status.to_vec();
        Arc::new(device)
    }

    pub fn connector(self: &Arc<Self>) -> MockConnector {
        MockConnector(Arc::clone(self))
    }

    pub fn set_status(&self, status: &[u8]) {
        *self.status.lock() = status.to_vec();
    }

    pub fn with_config(self: Arc<Self>, zone: u64, raw: &[u8]) -> Arc<Self> {
        self.configs.lock().insert(zone, raw.to_vec());
        self
    }

    pub fn fail_next_command_writes(&self, count: u32) {
        self.failing_command_writes.store(count, Ordering::SeqCst);
    }

    pub fn set_command_delay(&self, delay: Duration) {
        *self.command_delay.lock() = delay;
    }

    /// Makes the reset write fail with GATT status 133, as a rebooting
    /// device does.
    pub fn drop_link_on_reset(&self) {
        self.drop_on_reset.store(true, Ordering::SeqCst);
    }

    pub fn refuse_connections(&self) {
        self.refuse_connections.store(true, Ordering::SeqCst);
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// What each connection attempt was aimed at.
    pub fn targets(&self) -> Vec<DeviceRef> {
        self.targets.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn password_writes(&self) -> usize {
        self.writes
            .lock()
            .iter()
            .filter(|(uuid, _)| *uuid == uuids::PASSWORD)
            .count()
    }

    /// Every command written, parsed.
    pub fn commands(&self) -> Vec<Value> {
        self.writes
            .lock()
            .iter()
            .filter(|(uuid, _)| *uuid == uuids::COMMAND)
            .map(|(_, data)| serde_json::from_slice(data).unwrap())
            .collect()
    }

    /// Commands written with the given `Type`.
    pub fn commands_of(&self, kind: &str) -> Vec<Value> {
        self.commands()
            .into_iter()
            .filter(|command| command["Type"] == kind)
            .collect()
    }

    fn response(&self) -> Result<Vec<u8>, TransportError> {
        let last = self.last_command.lock().clone();
        match last {
            Some(command) if command["Type"] == "Get Config" => {
                let zone = command["Zone"].as_u64().unwrap_or_default();
                self.configs
                    .lock()
                    .get(&zone)
                    .cloned()
                    .ok_or_else(|| TransportError::ReadFailed(format!("no config for zone {zone}")))
            }
            _ => Ok(self.status.lock().clone()),
        }
    }
}

pub struct MockConnector(Arc<MockDevice>);

pub struct MockLink {
    device: Arc<MockDevice>,
    connected: bool,
}

impl GattConnector for MockConnector {
    type Link = MockLink;

    async fn connect(&self, target: &DeviceRef, _: Duration) -> Result<MockLink, TransportError> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        self.0.targets.lock().push(target.clone());
        if self.0.refuse_connections.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectFailed("device out of range".to_string()));
        }
        Ok(MockLink {
            device: Arc::clone(&self.0),
            connected: true,
        })
    }
}

impl GattLink for MockLink {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn has_services(&self) -> bool {
        self.connected
    }

    async fn write(&mut self, characteristic: Uuid, data: &[u8]) -> Result<(), TransportError> {
        let device = &self.device;
        if characteristic != uuids::COMMAND {
            device.writes.lock().push((characteristic, data.to_vec()));
            return Ok(());
        }

        let command: Value = serde_json::from_slice(data).unwrap();
        assert!(
            command["Changes"].get("boom").is_none(),
            "scripted crash while writing"
        );

        let in_flight = device.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        device.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let delay = *device.command_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let remaining = device.failing_command_writes.load(Ordering::SeqCst);
        if remaining > 0 {
            device.failing_command_writes.store(remaining - 1, Ordering::SeqCst);
            device.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(TransportError::WriteFailed("GATT busy".to_string()));
        }

        device.writes.lock().push((characteristic, data.to_vec()));

        let reset = command["Changes"].get("reset").is_some();
        *device.last_command.lock() = Some(command);
        if reset && device.drop_on_reset.load(Ordering::SeqCst) {
            device.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.connected = false;
            return Err(TransportError::Disconnected("GATT error 133".to_string()));
        }
        Ok(())
    }

    async fn read(&mut self, _: Uuid) -> Result<Vec<u8>, TransportError> {
        let device = &self.device;
        let _ = device
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        device.response()
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.connected {
            self.device.disconnects.fetch_add(1, Ordering::SeqCst);
        }
        self.connected = false;
        Ok(())
    }
}

/// Configuration with credentials and polling disabled.
pub fn config() -> DeviceConfig {
    DeviceConfig::new(ADDRESS)
        .with_credentials("1234", "me@example.com")
        .with_polling(PollingConfig::disabled())
}
