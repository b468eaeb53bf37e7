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

//! Dialer reusing one QUIC session per destination.

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use quinn::{ClientConfig, Connection, ConnectionError, Endpoint, RecvStream, SendStream};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    addr::Destination,
    config::{PersistentQuicConfig, SetupError},
    conn::StreamConn,
};

/// Sessions are re-dialed at most once per dial.
const MAX_ATTEMPTS: usize = 2;

/// Dials streams over persistent sessions.
///
/// Every dial opens a new bidirectional stream. Sessions are keyed by
/// [`Destination::canonical_repr`] and created on first use. A session the peer
/// closed, or that cannot open another stream within the configured timeout, is
/// dropped and dialed again once.
pub struct PersistentQuic {
    endpoint: Endpoint,
    client_config: ClientConfig,
    stream_open_timeout: Duration,
    local_addr: SocketAddr,
    sessions: Mutex<HashMap<String, Connection>>,
}

impl PersistentQuic {
    /// Creates a dialer on `endpoint`. The transport parameters of `config` are
    /// applied to `client_config`.
    pub fn new(
        endpoint: Endpoint,
        mut client_config: ClientConfig,
        config: &PersistentQuicConfig,
    ) -> Result<Self, SetupError> {
        client_config.transport_config(Arc::new(config.to_transport_config()?));
        let local_addr = endpoint.local_addr()?;
        Ok(Self {
            endpoint,
            client_config,
            stream_open_timeout: config.stream_open_timeout,
            local_addr,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Opens a new stream to `dst`, reusing the session to `dst` if there is one.
    pub async fn dial(&self, dst: &Destination) -> Result<StreamConn, DialError> {
        let repr = dst.canonical_repr();
        // Held across the handshake so that concurrent dials share the new session.
        let mut sessions = self.sessions.lock().await;

        let mut last_error = None;
        for _ in 0..MAX_ATTEMPTS {
            let connection = match sessions.get(&repr) {
                Some(connection) => connection.clone(),
                None => {
                    let connection = self.connect(dst).await?;
                    sessions.insert(repr.clone(), connection.clone());
                    connection
                }
            };

            match self.open_stream(&connection).await {
                Ok((send, recv)) => {
                    return Ok(StreamConn::new(send, recv, connection, self.local_addr));
                }
                Err(e) if e.is_stale_session() => {
                    tracing::info!(%dst, error = %e, "Persistent session unusable, dialing again");
                    sessions.remove(&repr);
                    last_error = Some(e);
                }
                Err(e) => {
                    tracing::info!(%dst, error = %e, "Failed to open stream");
                    return Err(DialError::OpenStream(e));
                }
            }
        }
        Err(DialError::SessionUnavailable(
            last_error.unwrap_or(StreamOpenError::Exhausted(self.stream_open_timeout)),
        ))
    }

    /// Number of cached sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Closes all sessions.
    pub async fn close(&self) {
        let mut sessions = self.sessions.lock().await;
        for (_, connection) in sessions.drain() {
            connection.close(0u32.into(), b"dialer closed");
        }
    }

    async fn connect(&self, dst: &Destination) -> Result<Connection, DialError> {
        let connecting =
            self.endpoint
                .connect_with(self.client_config.clone(), dst.addr, &dst.server_name())?;
        let connection = connecting.await.map_err(DialError::Handshake)?;
        tracing::debug!(%dst, id = connection.stable_id(), "Established persistent session");
        Ok(connection)
    }

    async fn open_stream(
        &self,
        connection: &Connection,
    ) -> Result<(SendStream, RecvStream), StreamOpenError> {
        match tokio::time::timeout(self.stream_open_timeout, connection.open_bi()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StreamOpenError::Exhausted(self.stream_open_timeout)),
        }
    }
}

/// Errors opening a stream on a session.
#[derive(Debug, Clone, Error)]
pub enum StreamOpenError {
    /// The session is closed.
    #[error("session closed: {0}")]
    Closed(#[from] ConnectionError),
    /// No stream could be opened in time, the peer ran out of stream credit.
    #[error("no stream available within {0:?}")]
    Exhausted(Duration),
}

impl StreamOpenError {
    /// Returns true if the session is gone or exhausted and dialing a new one may
    /// succeed.
    pub fn is_stale_session(&self) -> bool {
        match self {
            StreamOpenError::Exhausted(_) => true,
            StreamOpenError::Closed(e) => {
                matches!(
                    e,
                    ConnectionError::ApplicationClosed(_)
                        | ConnectionError::ConnectionClosed(_)
                        | ConnectionError::Reset
                        | ConnectionError::TimedOut
                )
            }
        }
    }
}

/// Dial errors.
#[derive(Debug, Error)]
pub enum DialError {
    /// The connection attempt could not be started.
    #[error("cannot connect: {0}")]
    Connect(#[from] quinn::ConnectError),
    /// The handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(#[source] ConnectionError),
    /// Opening a stream failed with an error that a new session would not fix.
    #[error("cannot open stream: {0}")]
    OpenStream(#[source] StreamOpenError),
    /// Neither the existing session nor a fresh one could open a stream.
    #[error("could not reuse or create a session: {0}")]
    SessionUnavailable(#[source] StreamOpenError),
}
