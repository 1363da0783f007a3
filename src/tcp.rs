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

//! TCP as a stand-in byte-stream transport.
//!
//! Peer identifiers are socket addresses. There is no discovery phase.

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::info;
use uuid::Uuid;

use crate::connector::{Discovery, Transport};
use crate::error::ConnectError;
use crate::peer::PeerId;

/// Opens TCP connections; the service identifier is ignored.
#[derive(Debug, Default, Clone)]
pub struct TcpTransport;

#[async_trait]
impl Transport for TcpTransport {
    type Stream = TcpStream;

    async fn open_stream(
        &self,
        peer: &PeerId,
        _service: Uuid,
    ) -> Result<TcpStream, ConnectError> {
        let addr: SocketAddr = peer
            .as_str()
            .parse()
            .map_err(|_| ConnectError::Unreachable(format!("not a socket address: {}", peer)))?;

        let stream = TcpStream::connect(addr).await.map_err(ConnectError::from_io)?;
        stream.set_nodelay(true).map_err(ConnectError::from_io)?;
        Ok(stream)
    }

    fn name(&self) -> &'static str {
        "TCP"
    }
}

/// Discovery for transports that have none.
#[derive(Debug, Default, Clone)]
pub struct NoDiscovery;

#[async_trait]
impl Discovery for NoDiscovery {
    async fn cancel_discovery(&self) -> Result<(), ConnectError> {
        Ok(())
    }

    fn is_discovering(&self) -> bool {
        false
    }
}

/// Accept a single inbound TCP connection.
pub async fn accept_one(listener: &TcpListener) -> std::io::Result<(TcpStream, PeerId)> {
    let (stream, remote) = listener.accept().await?;
    info!("Connection from: {}", remote);
    stream.set_nodelay(true)?;

    let peer = PeerId::new(remote.to_string())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok((stream, peer))
}
