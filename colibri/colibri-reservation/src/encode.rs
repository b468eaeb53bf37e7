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

//! Byte layouts of reservation IDs, COLIBRI paths and request fields.
//!
//! Callers size a buffer with [`WireEncode::required_size`] and fill it with
//! [`WireEncode::encode`], or use [`WireEncode::encode_to_vec`]. Before writing,
//! [`WireEncode::wire_valid`] rejects values whose bytes would not match the fixed
//! layout, e.g. an ID suffix that is neither 4 nor 12 bytes or a COLIBRI hop count
//! that disagrees with the hop fields. Reservation semantics are checked by the
//! `validate` methods of the owning types, not here.

/// A value with a fixed byte layout.
pub trait WireEncode {
    /// Exact number of bytes [`WireEncode::encode`] writes.
    ///
    /// ## Safety
    /// Implementations of `encode_unchecked` rely on this to index the buffer.
    fn required_size(&self) -> usize;

    /// Rejects values that cannot be laid out.
    fn wire_valid(&self) -> Result<(), InvalidStructureError>;

    /// Writes the layout to the front of `buf` and returns `required_size()`.
    ///
    /// ## SAFETY
    /// `buf` holds at least `required_size()` bytes and `wire_valid()` returned
    /// `Ok(())`.
    unsafe fn encode_unchecked(&self, buf: &mut [u8]) -> usize;

    /// Checks the value and the buffer length, then writes the layout. Returns the
    /// number of bytes written.
    fn encode(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        self.wire_valid()?;

        let required_size = self.required_size();
        if buf.len() < required_size {
            return Err(EncodeError::BufferTooSmall(required_size));
        }

        // SAFETY: both preconditions were checked
        unsafe { Ok(self.encode_unchecked(buf)) }
    }

    /// Encodes into a new buffer.
    fn encode_to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = vec![0u8; self.required_size()];
        let written = self.encode(&mut buf)?;
        buf.truncate(written);
        Ok(buf)
    }
}

/// Encoding failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// The value has no valid layout.
    #[error(transparent)]
    InvalidStructure(#[from] InvalidStructureError),
    /// The buffer is shorter than the layout; carries the required length.
    #[error("buffer too small: required {0}")]
    BufferTooSmall(usize),
}

/// Reason a value has no valid layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot encode structure: {0}")]
pub struct InvalidStructureError(&'static str);

impl From<&'static str> for InvalidStructureError {
    fn from(s: &'static str) -> Self {
        InvalidStructureError(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{address::Asn, id::ReservationId};

    #[test]
    fn encode_checks_buffer_length() {
        let id = ReservationId::new_segment(Asn::new(0xff00_0000_0110), [7; 4]);
        let mut short = [0u8; 9];
        assert_eq!(
            id.encode(&mut short),
            Err(EncodeError::BufferTooSmall(ReservationId::SEGMENT_ENCODED_LEN))
        );

        let mut long = [0xffu8; 16];
        assert_eq!(id.encode(&mut long), Ok(ReservationId::SEGMENT_ENCODED_LEN));
        assert_eq!(&long[10..], &[0xff; 6]);
        assert_eq!(id.encode_to_vec().unwrap(), long[..10].to_vec());
    }
}
