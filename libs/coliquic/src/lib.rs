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

//! Persistent QUIC sessions for COLIBRI control-plane RPCs.
//!
//! COLIBRI services exchange many short RPCs with the same peers. Instead of a
//! handshake per RPC, [`dialer::PersistentQuic`] keeps one QUIC session per
//! destination and hands out a new bidirectional stream per dial.
//! [`listener::Listener`] accepts the streams of all sessions through a single
//! [`listener::Listener::accept`] call.
//!
//! Both sides expose streams as [`conn::StreamConn`], which implements tokio's
//! `AsyncRead` and `AsyncWrite`.

pub mod addr;
pub mod config;
pub mod conn;
pub mod dialer;
pub mod listener;

pub use addr::{DataplanePath, Destination};
pub use config::{PersistentQuicConfig, SetupError};
pub use conn::StreamConn;
pub use dialer::{DialError, PersistentQuic, StreamOpenError};
pub use listener::{Listener, ListenerError};
