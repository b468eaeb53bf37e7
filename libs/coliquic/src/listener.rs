// Copyright 2026 Anapaya Systems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Listener accepting streams of persistent sessions.
//!
//! One task accepts new sessions and spawns one task per session that accepts its
//! streams. All streams are queued in a single bounded channel consumed by
//! [`Listener::accept`].

use std::{net::SocketAddr, sync::Arc};

use quinn::{Connection, Endpoint, Incoming, ServerConfig};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{PersistentQuicConfig, SetupError},
    conn::StreamConn,
};

/// Accepts streams from all sessions on an endpoint.
pub struct Listener {
    endpoint: Endpoint,
    local_addr: SocketAddr,
    streams: Mutex<mpsc::Receiver<StreamConn>>,
    cancel: CancellationToken,
}

impl Listener {
    /// Binds a server endpoint to `addr` and starts accepting sessions.
    pub fn bind(
        addr: SocketAddr,
        mut server_config: ServerConfig,
        config: &PersistentQuicConfig,
    ) -> Result<Self, SetupError> {
        server_config.transport_config(Arc::new(config.to_transport_config()?));
        let endpoint = Endpoint::server(server_config, addr)?;
        Self::from_endpoint(endpoint, config)
    }

    /// Starts accepting sessions on an existing server endpoint.
    ///
    /// Must be called within a tokio runtime.
    pub fn from_endpoint(
        endpoint: Endpoint,
        config: &PersistentQuicConfig,
    ) -> Result<Self, SetupError> {
        let local_addr = endpoint.local_addr()?;
        let (tx, rx) = mpsc::channel(config.accept_queue_len.max(1));
        let cancel = CancellationToken::new();

        tokio::spawn(accept_sessions(
            endpoint.clone(),
            local_addr,
            tx,
            cancel.clone(),
        ));
        tracing::info!(%local_addr, "Listening for persistent sessions");

        Ok(Self {
            endpoint,
            local_addr,
            streams: Mutex::new(rx),
            cancel,
        })
    }

    /// Waits for the next stream of any session.
    ///
    /// Fails once the listener is closed, either by [`Listener::close`] or because
    /// the endpoint stopped accepting sessions.
    pub async fn accept(&self) -> Result<StreamConn, ListenerError> {
        let mut streams = self.streams.lock().await;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ListenerError::Closed),
            stream = streams.recv() => stream.ok_or(ListenerError::Closed),
        }
    }

    /// Stops accepting sessions and streams and closes the endpoint. Blocked
    /// [`Listener::accept`] calls return [`ListenerError::Closed`].
    pub fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.endpoint.close(0u32.into(), b"listener closed");
        tracing::info!(local_addr = %self.local_addr, "Closed listener");
    }

    /// Local address of the endpoint.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn accept_sessions(
    endpoint: Endpoint,
    local_addr: SocketAddr,
    tx: mpsc::Sender<StreamConn>,
    cancel: CancellationToken,
) {
    loop {
        let incoming = tokio::select! {
            _ = cancel.cancelled() => break,
            incoming = endpoint.accept() => incoming,
        };
        let Some(incoming) = incoming else {
            tracing::info!(%local_addr, "Endpoint closed, no more sessions accepted");
            // Wakes consumers blocked in accept.
            cancel.cancel();
            break;
        };
        tokio::spawn(accept_streams(
            incoming,
            local_addr,
            tx.clone(),
            cancel.clone(),
        ));
    }
}

async fn accept_streams(
    incoming: Incoming,
    local_addr: SocketAddr,
    tx: mpsc::Sender<StreamConn>,
    cancel: CancellationToken,
) {
    let remote = incoming.remote_address();
    let connection: Connection = tokio::select! {
        _ = cancel.cancelled() => return,
        connection = incoming.into_future() => {
            match connection {
                Ok(connection) => connection,
                Err(e) => {
                    tracing::debug!(%remote, error = %e, "Session handshake failed");
                    return;
                }
            }
        }
    };
    tracing::debug!(%remote, id = connection.stable_id(), "Accepted persistent session");

    loop {
        let stream = tokio::select! {
            _ = cancel.cancelled() => break,
            stream = connection.accept_bi() => stream,
        };
        let (send, recv) = match stream {
            Ok(stream) => stream,
            Err(e) => {
                tracing::debug!(%remote, error = %e, "Session closed, no more streams accepted");
                break;
            }
        };
        let conn = StreamConn::new(send, recv, connection.clone(), local_addr);
        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = tx.send(conn) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

/// Listener errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    /// The listener is closed.
    #[error("listener closed")]
    Closed,
}
