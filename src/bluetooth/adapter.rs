// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Local adapter access and device discovery.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bluer::AdapterEvent;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::connector::Discovery;
use crate::error::ConnectError;
use crate::peer::{DiscoveredPeer, PeerId};

/// The default BlueZ adapter, powered on.
pub struct BluetoothAdapter {
    session: bluer::Session,
    adapter: bluer::Adapter,
    scan: Mutex<Option<JoinHandle<()>>>,
}

impl BluetoothAdapter {
    /// Open the default adapter, powering it on if needed.
    pub async fn open() -> Result<Self> {
        let session = bluer::Session::new().await?;
        info!("BlueZ session created");

        let adapter = session
            .default_adapter()
            .await
            .map_err(|e| anyhow!("Bluetooth is not supported: {}", e))?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        if !adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            adapter.set_powered(true).await?;
        }

        Ok(Self {
            session,
            adapter,
            scan: Mutex::new(None),
        })
    }

    pub fn session(&self) -> &bluer::Session {
        &self.session
    }

    pub fn adapter(&self) -> &bluer::Adapter {
        &self.adapter
    }

    /// Start a fresh scan, replacing any running one.
    ///
    /// Peers are reported on the returned channel until the scan is
    /// cancelled or the receiver is dropped.
    pub async fn start_discovery(&self) -> Result<mpsc::Receiver<DiscoveredPeer>> {
        self.stop_scan();

        let events = self.adapter.discover_devices().await?;
        let adapter = self.adapter.clone();
        let (peer_tx, peer_rx) = mpsc::channel(32);
        info!("Discovering devices...");

        let task = tokio::spawn(async move {
            futures::pin_mut!(events);
            while let Some(event) = events.next().await {
                let AdapterEvent::DeviceAdded(addr) = event else {
                    continue;
                };
                let name = match adapter.device(addr) {
                    Ok(device) => device.name().await.ok().flatten(),
                    Err(_) => None,
                };
                let Ok(id) = PeerId::new(addr.to_string()) else {
                    continue;
                };
                debug!("Found device {} ({:?})", id, name);
                if peer_tx.send(DiscoveredPeer::new(id, name)).await.is_err() {
                    break;
                }
            }
        });

        *self.scan.lock() = Some(task);
        Ok(peer_rx)
    }

    /// Dropping the event stream inside the task ends the BlueZ discovery.
    fn stop_scan(&self) -> bool {
        match self.scan.lock().take() {
            Some(task) => {
                let running = !task.is_finished();
                task.abort();
                running
            }
            None => false,
        }
    }
}

#[async_trait]
impl Discovery for BluetoothAdapter {
    async fn cancel_discovery(&self) -> Result<(), ConnectError> {
        if self.stop_scan() {
            info!("Discovery cancelled");
        }
        Ok(())
    }

    fn is_discovering(&self) -> bool {
        self.scan
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for BluetoothAdapter {
    fn drop(&mut self) {
        self.stop_scan();
    }
}
