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

//! COLIBRI dataplane path model.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       Packet Timestamp                        |
//! +                                                               +
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |C|R|S|  rsv    |      Ver      |    CurrHF     |    HFCount    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! +                 Reservation ID Suffix (12 B)                  +
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       Expiration Tick                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     BwCls     |      RLC      |         OrigPayLen            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          IngressId            |           EgressId            |  hop field 0
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                              MAC                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use std::ops::Range;

use thiserror::Error;

use crate::{
    encode::{InvalidStructureError, WireEncode},
    token::HopMac,
    types::{BwCls, Rlc, Tick, TypeError},
};

/// Byte layout of a COLIBRI path.
pub struct ColibriPathLayout;

impl ColibriPathLayout {
    /// Length of the packet timestamp.
    pub const TIMESTAMP_LEN: usize = 8;
    /// Length of the info field.
    pub const INFO_FIELD_LEN: usize = 24;
    /// Length of one hop field.
    pub const HOP_FIELD_LEN: usize = 8;
    /// Length of the reservation ID suffix in the info field.
    pub const SUFFIX_LEN: usize = 12;
    /// Length of the path without hop fields.
    pub const META_LEN: usize = Self::TIMESTAMP_LEN + Self::INFO_FIELD_LEN;

    // Offsets relative to the start of the info field.
    const FLAGS: usize = 0;
    const VER: usize = 1;
    const CURR_HF: usize = 2;
    const HF_COUNT: usize = 3;
    const SUFFIX: Range<usize> = 4..16;
    const EXP_TICK: Range<usize> = 16..20;
    const BW_CLS: usize = 20;
    const RLC: usize = 21;
    /// Range of the original payload length, relative to the info field.
    pub const ORIG_PAY_LEN: Range<usize> = 22..24;

    /// Total length of a path with `hop_fields` hop fields.
    pub const fn path_len(hop_fields: usize) -> usize {
        Self::META_LEN + hop_fields * Self::HOP_FIELD_LEN
    }
}

bitflags::bitflags! {
    /// COLIBRI info field flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ColibriFlags: u8 {
        /// Control plane packet.
        const C = 0x80;
        /// Reverse direction.
        const R = 0x40;
        /// Segment reservation (as opposed to E2E).
        const S = 0x20;
    }
}

/// A COLIBRI dataplane path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColibriPath {
    /// Per-packet timestamp, set by the source when sending.
    pub packet_timestamp: [u8; 8],
    /// The info field.
    pub info_field: ColibriInfoField,
    /// Hop fields in path order.
    pub hop_fields: Vec<ColibriHopField>,
}

/// COLIBRI info field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColibriInfoField {
    /// Info field flags.
    pub flags: ColibriFlags,
    /// Version, the index number of the reservation.
    pub ver: u8,
    /// Hop field currently being processed.
    pub curr_hf: u8,
    /// Number of hop fields.
    pub hf_count: u8,
    /// Reservation ID suffix, zero padded.
    pub res_id_suffix: [u8; ColibriPathLayout::SUFFIX_LEN],
    /// Expiration of the reservation index.
    pub exp_tick: Tick,
    /// Bandwidth class.
    pub bw_cls: BwCls,
    /// Renewal lifetime class.
    pub rlc: Rlc,
    /// Payload length at the source.
    pub orig_pay_len: u16,
}

/// COLIBRI hop field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColibriHopField {
    /// Ingress interface.
    pub ingress: u16,
    /// Egress interface.
    pub egress: u16,
    /// Hop authenticator.
    pub mac: HopMac,
}

impl ColibriPath {
    /// Decodes a COLIBRI path from `buf`, ignoring trailing bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, ColibriDecodeError> {
        use ColibriPathLayout as L;

        if buf.len() < L::META_LEN {
            return Err(ColibriDecodeError::Truncated {
                required: L::META_LEN,
                actual: buf.len(),
            });
        }
        let info = &buf[L::TIMESTAMP_LEN..L::META_LEN];
        let hf_count = info[L::HF_COUNT];
        let required = L::path_len(hf_count as usize);
        if buf.len() < required {
            return Err(ColibriDecodeError::Truncated {
                required,
                actual: buf.len(),
            });
        }

        let mut packet_timestamp = [0u8; L::TIMESTAMP_LEN];
        packet_timestamp.copy_from_slice(&buf[..L::TIMESTAMP_LEN]);
        let mut res_id_suffix = [0u8; L::SUFFIX_LEN];
        res_id_suffix.copy_from_slice(&info[L::SUFFIX]);
        let info_field = ColibriInfoField {
            flags: ColibriFlags::from_bits_truncate(info[L::FLAGS]),
            ver: info[L::VER],
            curr_hf: info[L::CURR_HF],
            hf_count,
            res_id_suffix,
            exp_tick: Tick(u32::from_be_bytes(read_array(&info[L::EXP_TICK]))),
            bw_cls: BwCls::new(info[L::BW_CLS])?,
            rlc: Rlc(info[L::RLC]),
            orig_pay_len: u16::from_be_bytes(read_array(&info[L::ORIG_PAY_LEN])),
        };

        let hop_fields = buf[L::META_LEN..required]
            .chunks_exact(L::HOP_FIELD_LEN)
            .map(|hf| {
                ColibriHopField {
                    ingress: u16::from_be_bytes([hf[0], hf[1]]),
                    egress: u16::from_be_bytes([hf[2], hf[3]]),
                    mac: HopMac([hf[4], hf[5], hf[6], hf[7]]),
                }
            })
            .collect();

        Ok(Self {
            packet_timestamp,
            info_field,
            hop_fields,
        })
    }
}

fn read_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}

impl WireEncode for ColibriPath {
    fn required_size(&self) -> usize {
        ColibriPathLayout::path_len(self.hop_fields.len())
    }

    fn wire_valid(&self) -> Result<(), InvalidStructureError> {
        if self.hop_fields.len() > u8::MAX as usize {
            return Err("COLIBRI path has more than 255 hop fields".into());
        }
        if self.info_field.hf_count as usize != self.hop_fields.len() {
            return Err("hf_count does not match the number of hop fields".into());
        }
        if self.info_field.curr_hf != 0 && self.info_field.curr_hf >= self.info_field.hf_count {
            return Err("curr_hf exceeds total number of hop fields".into());
        }
        Ok(())
    }

    unsafe fn encode_unchecked(&self, buf: &mut [u8]) -> usize {
        use ColibriPathLayout as L;

        buf[..L::TIMESTAMP_LEN].copy_from_slice(&self.packet_timestamp);

        let inf = &self.info_field;
        let info = &mut buf[L::TIMESTAMP_LEN..L::META_LEN];
        info[L::FLAGS] = inf.flags.bits();
        info[L::VER] = inf.ver;
        info[L::CURR_HF] = inf.curr_hf;
        info[L::HF_COUNT] = inf.hf_count;
        info[L::SUFFIX].copy_from_slice(&inf.res_id_suffix);
        info[L::EXP_TICK].copy_from_slice(&inf.exp_tick.value().to_be_bytes());
        info[L::BW_CLS] = inf.bw_cls.value();
        info[L::RLC] = inf.rlc.0;
        info[L::ORIG_PAY_LEN].copy_from_slice(&inf.orig_pay_len.to_be_bytes());

        for (i, hf) in self.hop_fields.iter().enumerate() {
            let start = L::META_LEN + i * L::HOP_FIELD_LEN;
            let hop = &mut buf[start..start + L::HOP_FIELD_LEN];
            hop[0..2].copy_from_slice(&hf.ingress.to_be_bytes());
            hop[2..4].copy_from_slice(&hf.egress.to_be_bytes());
            hop[4..8].copy_from_slice(hf.mac.as_bytes());
        }

        self.required_size()
    }
}

/// Returns a copy of an encoded COLIBRI path with the packet timestamp and the original
/// payload length zeroed.
///
/// Two packets of the same reservation index map to the same representation, no matter
/// when they were sent or how large they were. Buffers too short to hold a COLIBRI
/// path are copied unchanged.
pub fn invariant_representation(raw: &[u8]) -> Vec<u8> {
    use ColibriPathLayout as L;

    let mut out = raw.to_vec();
    if out.len() >= L::META_LEN {
        out[..L::TIMESTAMP_LEN].fill(0);
        let start = L::TIMESTAMP_LEN + L::ORIG_PAY_LEN.start;
        let end = L::TIMESTAMP_LEN + L::ORIG_PAY_LEN.end;
        out[start..end].fill(0);
    }
    out
}

/// Errors decoding a COLIBRI path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColibriDecodeError {
    /// The buffer is shorter than the path it announces.
    #[error("buffer too short for COLIBRI path: required {required}, got {actual}")]
    Truncated {
        /// Bytes required.
        required: usize,
        /// Bytes available.
        actual: usize,
    },
    /// A field holds an out-of-range value.
    #[error(transparent)]
    InvalidField(#[from] TypeError),
}
