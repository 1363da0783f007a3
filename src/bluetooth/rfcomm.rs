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

//! RFCOMM streams for the Serial Port Profile.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bluer::rfcomm::{Listener, Profile, ReqError, Role, SocketAddr, Stream};
use bluer::{Address, ErrorKind};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::adapter::BluetoothAdapter;
use crate::connector::Transport;
use crate::error::ConnectError;
use crate::peer::PeerId;

fn parse_address(peer: &PeerId) -> Result<Address, ConnectError> {
    peer.as_str()
        .parse()
        .map_err(|_| ConnectError::Unreachable(format!("not a Bluetooth address: {}", peer)))
}

/// Map a BlueZ error onto a connect failure.
pub fn map_bluer_error(err: bluer::Error) -> ConnectError {
    match err.kind {
        ErrorKind::NotReady => ConnectError::Unsupported(err.to_string()),
        ErrorKind::NotSupported => ConnectError::ServiceUnavailable(err.to_string()),
        ErrorKind::NotAuthorized | ErrorKind::AuthenticationRejected => {
            ConnectError::Refused(err.to_string())
        }
        ErrorKind::AuthenticationFailed => ConnectError::ProtocolMismatch(err.to_string()),
        ErrorKind::AuthenticationCanceled => ConnectError::Cancelled,
        _ => ConnectError::Unreachable(err.to_string()),
    }
}

/// Opens SPP streams to remote devices.
///
/// With a fixed channel the socket is connected directly. Otherwise a
/// client profile is registered for the service UUID and BlueZ resolves
/// the channel from the remote service record.
pub struct RfcommTransport {
    adapter: Arc<BluetoothAdapter>,
    channel: Option<u8>,
}

impl RfcommTransport {
    pub fn new(adapter: Arc<BluetoothAdapter>, channel: Option<u8>) -> Self {
        Self { adapter, channel }
    }

    async fn connect_channel(&self, addr: Address, channel: u8) -> Result<Stream, ConnectError> {
        debug!("Connecting to {} on RFCOMM channel {}", addr, channel);
        Stream::connect(SocketAddr::new(addr, channel))
            .await
            .map_err(ConnectError::from_io)
    }

    async fn connect_service(&self, addr: Address, service: Uuid) -> Result<Stream, ConnectError> {
        let profile = Profile {
            uuid: service,
            name: Some("sppchat client".to_string()),
            role: Some(Role::Client),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        let mut requests = self
            .adapter
            .session()
            .register_profile(profile)
            .await
            .map_err(map_bluer_error)?;

        let device = self.adapter.adapter().device(addr).map_err(map_bluer_error)?;
        let connect = async {
            if !device.is_connected().await.unwrap_or(false) {
                device.connect().await?;
            }
            device.connect_profile(&service).await
        };
        tokio::pin!(connect);
        let mut profile_connected = false;

        loop {
            tokio::select! {
                res = &mut connect, if !profile_connected => {
                    res.map_err(map_bluer_error)?;
                    profile_connected = true;
                }
                req = requests.next() => {
                    let req = req.ok_or(ConnectError::Cancelled)?;
                    if req.device() != addr {
                        warn!("Rejecting unexpected connection from {}", req.device());
                        req.reject(ReqError::Rejected);
                        continue;
                    }
                    return req
                        .accept()
                        .map_err(|e| ConnectError::Unreachable(e.to_string()));
                }
            }
        }
    }
}

#[async_trait]
impl Transport for RfcommTransport {
    type Stream = Stream;

    async fn open_stream(&self, peer: &PeerId, service: Uuid) -> Result<Stream, ConnectError> {
        let addr = parse_address(peer)?;
        match self.channel {
            Some(channel) => self.connect_channel(addr, channel).await,
            None => self.connect_service(addr, service).await,
        }
    }

    fn name(&self) -> &'static str {
        "RFCOMM"
    }
}

/// Accept one inbound SPP stream.
///
/// Binds the given channel directly when set, otherwise registers a server
/// profile for `service` and takes the first connection BlueZ hands over.
pub async fn accept_one(
    adapter: &BluetoothAdapter,
    service: Uuid,
    channel: Option<u8>,
) -> Result<(Stream, PeerId)> {
    let (stream, addr) = match channel {
        Some(channel) => {
            let listener = Listener::bind(SocketAddr::new(Address::any(), channel)).await?;
            info!("RFCOMM server listening on channel {}", channel);
            let (stream, remote) = listener.accept().await?;
            (stream, remote.addr)
        }
        None => {
            let profile = Profile {
                uuid: service,
                name: Some("sppchat".to_string()),
                role: Some(Role::Server),
                require_authentication: Some(false),
                require_authorization: Some(false),
                ..Default::default()
            };
            let mut requests = adapter.session().register_profile(profile).await?;
            info!("SPP service registered (UUID: {})", service);

            let req = requests
                .next()
                .await
                .ok_or_else(|| anyhow!("Profile registration ended"))?;
            let addr = req.device();
            (req.accept()?, addr)
        }
    };

    info!("Connection from: {}", addr);
    Ok((stream, PeerId::new(addr.to_string())?))
}
