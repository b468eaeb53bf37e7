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

//! A bidirectional QUIC stream used as a connection.

use std::{
    io,
    net::SocketAddr,
    pin::Pin,
    task::{Context, Poll},
};

use quinn::{ClosedStream, Connection, RecvStream, SendStream};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// One bidirectional stream of a persistent session.
///
/// Dropping the connection only ends the stream; the session stays open for other
/// streams.
#[derive(Debug)]
pub struct StreamConn {
    send: SendStream,
    recv: RecvStream,
    connection: Connection,
    local_addr: SocketAddr,
}

impl StreamConn {
    pub(crate) fn new(
        send: SendStream,
        recv: RecvStream,
        connection: Connection,
        local_addr: SocketAddr,
    ) -> Self {
        Self {
            send,
            recv,
            connection,
            local_addr,
        }
    }

    /// Local address of the session.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Remote address of the session.
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Identifier of the session, equal for all streams of one session.
    pub fn session_id(&self) -> usize {
        self.connection.stable_id()
    }

    /// The session carrying this stream.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Signals the end of the data sent on this stream.
    pub fn finish(&mut self) -> Result<(), ClosedStream> {
        self.send.finish()
    }
}

impl AsyncRead for StreamConn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        AsyncRead::poll_read(Pin::new(&mut self.get_mut().recv), cx, buf)
    }
}

impl AsyncWrite for StreamConn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        AsyncWrite::poll_write(Pin::new(&mut self.get_mut().send), cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncWrite::poll_flush(Pin::new(&mut self.get_mut().send), cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncWrite::poll_shutdown(Pin::new(&mut self.get_mut().send), cx)
    }
}
