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

//! Dial destinations and their session keys.

use std::{fmt, net::SocketAddr};

use bytes::Bytes;
use colibri_reservation::{
    dataplane::{ColibriPath, invariant_representation},
    encode::{EncodeError, WireEncode},
};

/// SCION dataplane path types.
pub mod path_type {
    /// Empty path.
    pub const EMPTY: u8 = 0;
    /// Standard SCION path.
    pub const SCION: u8 = 1;
    /// One-hop path.
    pub const ONE_HOP: u8 = 2;
    /// EPIC path.
    pub const EPIC: u8 = 3;
    /// COLIBRI path.
    pub const COLIBRI: u8 = 4;
}

/// The dataplane path packets to a destination travel on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataplanePath {
    /// Destination in the local AS.
    Empty,
    /// Encoded standard SCION path.
    Scion(Bytes),
    /// Encoded one-hop path.
    OneHop(Bytes),
    /// Encoded COLIBRI path.
    Colibri(Bytes),
    /// Encoded path of any type.
    Raw {
        /// Path type number.
        path_type: u8,
        /// The encoded path.
        raw: Bytes,
    },
}

impl DataplanePath {
    /// Encodes a COLIBRI path.
    pub fn colibri(path: &ColibriPath) -> Result<Self, EncodeError> {
        Ok(DataplanePath::Colibri(Bytes::from(path.encode_to_vec()?)))
    }

    /// The path type number.
    pub fn path_type(&self) -> u8 {
        match self {
            DataplanePath::Empty => path_type::EMPTY,
            DataplanePath::Scion(_) => path_type::SCION,
            DataplanePath::OneHop(_) => path_type::ONE_HOP,
            DataplanePath::Colibri(_) => path_type::COLIBRI,
            DataplanePath::Raw { path_type, .. } => *path_type,
        }
    }

    /// The encoded path, empty for [`DataplanePath::Empty`].
    pub fn raw(&self) -> &[u8] {
        match self {
            DataplanePath::Empty => &[],
            DataplanePath::Scion(raw)
            | DataplanePath::OneHop(raw)
            | DataplanePath::Colibri(raw)
            | DataplanePath::Raw { raw, .. } => raw,
        }
    }
}

/// Name of a path type number.
pub fn path_type_name(path_type: u8) -> String {
    match path_type {
        path_type::EMPTY => "Empty".into(),
        path_type::SCION => "SCION".into(),
        path_type::ONE_HOP => "OneHop".into(),
        path_type::EPIC => "EPIC".into(),
        path_type::COLIBRI => "Colibri".into(),
        other => format!("UNKNOWN ({other})"),
    }
}

/// Where to dial: a socket address and the path to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Address of the peer.
    pub addr: SocketAddr,
    /// Path to the peer.
    pub path: DataplanePath,
    /// TLS server name. Defaults to the IP address of the peer.
    pub server_name: Option<String>,
}

impl Destination {
    /// Creates a destination without an explicit server name.
    pub fn new(addr: SocketAddr, path: DataplanePath) -> Self {
        Self {
            addr,
            path,
            server_name: None,
        }
    }

    /// Sets the TLS server name.
    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    /// The TLS server name used for the handshake.
    pub fn server_name(&self) -> String {
        match &self.server_name {
            Some(name) => name.clone(),
            None => self.addr.ip().to_string(),
        }
    }

    /// Key of the session to this destination: `<path type name><suffix>`.
    ///
    /// The suffix is the socket address for empty paths and the hex encoded path
    /// otherwise. COLIBRI paths are reduced to their invariant representation first,
    /// so all packets of one reservation index share a session.
    pub fn canonical_repr(&self) -> String {
        let name = path_type_name(self.path.path_type());
        match &self.path {
            DataplanePath::Empty => format!("{name}{}", self.addr),
            DataplanePath::Colibri(raw) => {
                format!("{name}{}", hex::encode(invariant_representation(raw)))
            }
            path => format!("{name}{}", hex::encode(path.raw())),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} via {}",
            self.addr,
            path_type_name(self.path.path_type())
        )
    }
}
