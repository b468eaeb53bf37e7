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

//! Reservation tokens.
//!
//! A token binds an index to the hops that forward its traffic. The hop field
//! MACs are computed by the AS owning each hop; this crate only carries them.

use std::fmt::Debug;

use crate::types::{BwCls, IndexNumber, PathType, Rlc, Tick};

/// Token of a single reservation index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Index-wide part of the token.
    pub info_field: TokenInfoField,
    /// One hop field per AS on the reservation path, in path order.
    pub hop_fields: Vec<TokenHopField>,
}

impl Token {
    /// Creates a token without hop fields.
    pub fn new(info_field: TokenInfoField) -> Self {
        Self {
            info_field,
            hop_fields: Vec::new(),
        }
    }

    /// Appends the hop field of the next AS on the path.
    pub fn add_hop_field(&mut self, hop_field: TokenHopField) {
        self.hop_fields.push(hop_field);
    }
}

/// Index-wide information of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfoField {
    /// The index this token belongs to.
    pub idx: IndexNumber,
    /// Expiration of the index.
    pub expiration_tick: Tick,
    /// Allocated bandwidth.
    pub bw_cls: BwCls,
    /// Renewal lifetime class.
    pub rlc: Rlc,
    /// Kind of path of the reservation.
    pub path_type: PathType,
}

/// Per-hop part of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenHopField {
    /// Ingress interface of the hop.
    pub ingress: u16,
    /// Egress interface of the hop.
    pub egress: u16,
    /// Hop authenticator.
    pub mac: HopMac,
}

/// 4 byte hop authenticator used in COLIBRI hop fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HopMac(pub [u8; 4]);

impl HopMac {
    /// Length of a COLIBRI hop MAC.
    pub const LEN: usize = 4;

    /// Returns the byte array representation of the MAC.
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl From<[u8; 4]> for HopMac {
    fn from(bytes: [u8; 4]) -> Self {
        HopMac(bytes)
    }
}

impl Debug for HopMac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}
