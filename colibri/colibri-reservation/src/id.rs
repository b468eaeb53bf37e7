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

//! Reservation identities.

use std::fmt;

use thiserror::Error;

use crate::{
    address::Asn,
    encode::{InvalidStructureError, WireEncode},
};

/// Identifies a reservation within the whole network.
///
/// The suffix length is the class tag: segment reservations carry a
/// [`ReservationId::SEGMENT_SUFFIX_LEN`] byte suffix, E2E reservations a
/// [`ReservationId::E2E_SUFFIX_LEN`] byte suffix. The fields are public because
/// IDs are parsed from untrusted requests; [`ReservationId::validate`] must be
/// called before relying on the class.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReservationId {
    /// The AS that owns the reservation.
    pub asid: Asn,
    /// AS-local part of the identity.
    pub suffix: Vec<u8>,
}

impl ReservationId {
    /// Suffix length of segment reservation IDs.
    pub const SEGMENT_SUFFIX_LEN: usize = 4;
    /// Suffix length of E2E reservation IDs.
    pub const E2E_SUFFIX_LEN: usize = 12;
    /// Encoded length of a segment reservation ID.
    pub const SEGMENT_ENCODED_LEN: usize = Asn::ENCODED_LEN + Self::SEGMENT_SUFFIX_LEN;
    /// Encoded length of an E2E reservation ID.
    pub const E2E_ENCODED_LEN: usize = Asn::ENCODED_LEN + Self::E2E_SUFFIX_LEN;

    /// Creates a segment reservation ID.
    pub fn new_segment(asid: Asn, suffix: [u8; Self::SEGMENT_SUFFIX_LEN]) -> Self {
        Self {
            asid,
            suffix: suffix.to_vec(),
        }
    }

    /// Creates an E2E reservation ID.
    pub fn new_e2e(asid: Asn, suffix: [u8; Self::E2E_SUFFIX_LEN]) -> Self {
        Self {
            asid,
            suffix: suffix.to_vec(),
        }
    }

    /// Returns the length of the encoded ID.
    pub fn len(&self) -> usize {
        Asn::ENCODED_LEN + self.suffix.len()
    }

    /// Always false, an ID contains at least the AS number.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true if this is a segment reservation ID.
    pub fn is_segment_id(&self) -> bool {
        self.suffix.len() == Self::SEGMENT_SUFFIX_LEN
    }

    /// Returns true if this is an E2E reservation ID.
    pub fn is_e2e_id(&self) -> bool {
        self.suffix.len() == Self::E2E_SUFFIX_LEN
    }

    /// Checks that the ID is well formed.
    pub fn validate(&self) -> Result<(), IdError> {
        if self.asid.value() == 0 {
            return Err(IdError::UnsetAsid);
        }
        if !self.is_segment_id() && !self.is_e2e_id() {
            return Err(IdError::InvalidSuffixLength(self.suffix.len()));
        }
        Ok(())
    }
}

impl WireEncode for ReservationId {
    fn required_size(&self) -> usize {
        self.len()
    }

    fn wire_valid(&self) -> Result<(), InvalidStructureError> {
        if !self.is_segment_id() && !self.is_e2e_id() {
            return Err("reservation ID suffix has neither segment nor E2E length".into());
        }
        Ok(())
    }

    unsafe fn encode_unchecked(&self, buf: &mut [u8]) -> usize {
        buf[..Asn::ENCODED_LEN].copy_from_slice(&self.asid.to_be_bytes());
        buf[Asn::ENCODED_LEN..self.len()].copy_from_slice(&self.suffix);
        self.len()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.asid, hex::encode(&self.suffix))
    }
}

impl fmt::Debug for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReservationId({self})")
    }
}

/// Malformed reservation ID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The owning AS is zero.
    #[error("reservation ID not set")]
    UnsetAsid,
    /// Suffix length is neither the segment nor the E2E length.
    #[error(
        "invalid reservation ID suffix length {0}, expected {seg} or {e2e}",
        seg = ReservationId::SEGMENT_SUFFIX_LEN,
        e2e = ReservationId::E2E_SUFFIX_LEN
    )]
    InvalidSuffixLength(usize),
}
