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

//! Turning a peer identifier into an open stream.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ConnectError;
use crate::peer::PeerId;
use crate::session::{DuplexStream, SessionOptions, StreamSession};

/// Standard Serial Port Profile service class UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Opens streams to peers.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Stream: DuplexStream;

    /// Open a stream to `peer` for the given service, past any handshake.
    async fn open_stream(
        &self,
        peer: &PeerId,
        service: Uuid,
    ) -> Result<Self::Stream, ConnectError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Peer discovery that must be stopped before connecting.
#[async_trait]
pub trait Discovery: Send + Sync + 'static {
    /// Stop any in-flight scan. Succeeds when nothing is running.
    async fn cancel_discovery(&self) -> Result<(), ConnectError>;

    fn is_discovering(&self) -> bool;
}

/// Connects to peers through a transport, stopping discovery first.
///
/// Never retries; retry policy belongs to the caller.
pub struct Connector<T, D> {
    transport: Arc<T>,
    discovery: Arc<D>,
    service: Uuid,
    timeout: Option<Duration>,
}

impl<T: Transport, D: Discovery> Connector<T, D> {
    pub fn new(transport: Arc<T>, discovery: Arc<D>) -> Self {
        Self {
            transport,
            discovery,
            service: SPP_UUID,
            timeout: None,
        }
    }

    /// Use a service identifier other than SPP.
    pub fn with_service(mut self, service: Uuid) -> Self {
        self.service = service;
        self
    }

    /// Bound the time spent opening the stream.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn service(&self) -> Uuid {
        self.service
    }

    /// Open a stream to `peer`.
    pub async fn connect(&self, peer: &PeerId) -> Result<T::Stream, ConnectError> {
        if self.discovery.is_discovering() {
            info!("Cancelling discovery before connecting to {}", peer);
        }
        if let Err(e) = self.discovery.cancel_discovery().await {
            warn!("Failed to cancel discovery: {}", e);
        }

        info!("Connecting to {} via {}", peer, self.transport.name());
        let attempt = self.transport.open_stream(peer, self.service);
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .unwrap_or(Err(ConnectError::TimedOut(limit))),
            None => attempt.await,
        };

        match &result {
            Ok(_) => info!("Connected to {}", peer),
            Err(e) => warn!("Connection to {} failed: {}", peer, e),
        }
        result
    }

    /// Open a stream to `peer` and wrap it in an active session.
    pub async fn connect_session(
        &self,
        peer: &PeerId,
        options: SessionOptions,
    ) -> Result<StreamSession<T::Stream>, ConnectError> {
        let stream = self.connect(peer).await?;
        Ok(StreamSession::new(stream, peer.clone(), options))
    }
}

impl<T: Transport, D: Discovery> Connector<T, D> {
    /// Run [`connect`](Self::connect) on its own task.
    pub fn spawn_connect(
        self: &Arc<Self>,
        peer: PeerId,
    ) -> JoinHandle<Result<T::Stream, ConnectError>> {
        let connector = Arc::clone(self);
        tokio::spawn(async move { connector.connect(&peer).await })
    }
}
