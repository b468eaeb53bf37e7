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

//! End-to-end setup and renewal requests.
//!
//! Requests arrive from the network and are validated with
//! [`E2eSetupRequest::validate`] before they are applied. The immutable part of a
//! request is serialized with [`E2eSetupRequest::serialize_immutable_fields`] so that
//! the authentication layer can compute or verify its integrity tag.
//!
//! Immutable fields layout:
//!
//! ```text
//! | ID (10 or 16) | idx (1) | timestamp secs (4) |
//! | src IA (8) | src host (16) | dst IA (8) | dst host (16) | bw cls (1) |
//! | segment ID 0 (10) | ... | segment ID n-1 (10) |
//! ```

use std::{
    fmt,
    net::IpAddr,
    time::{SystemTime, UNIX_EPOCH},
};

use thiserror::Error;

use crate::{
    encode::{EncodeError, InvalidStructureError, WireEncode},
    id::{IdError, ReservationId},
    path::{PathError, TransparentPath},
    types::{BwCls, IndexNumber},
};

/// Length of a host address in the immutable fields.
const HOST_LEN: usize = 16;
/// Length of an ISD-AS in the immutable fields.
const ISD_AS_LEN: usize = 8;
/// Maximum number of stitched segment reservations.
pub const MAX_SEGMENT_RSVS: usize = 3;
/// Maximum number of transfer points.
pub const MAX_TRANSFER_INDICES: usize = 2;

/// Part of every reservation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The reservation the request refers to.
    pub id: ReservationId,
    /// The index being set up or renewed.
    pub index: IndexNumber,
    /// Creation time of the request, serialized with second precision.
    pub timestamp: SystemTime,
    /// The path the reservation is negotiated over.
    pub path: TransparentPath,
}

impl Request {
    /// Checks the identity and the path of the request.
    pub fn validate(&self) -> Result<(), RequestError> {
        self.id.validate()?;
        self.path.validate()?;
        Ok(())
    }

    /// Timestamp as seconds since the Unix epoch, saturating at `u32::MAX`.
    pub fn timestamp_secs(&self) -> u32 {
        let secs = self
            .timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        u32::try_from(secs).unwrap_or(u32::MAX)
    }
}

impl WireEncode for Request {
    fn required_size(&self) -> usize {
        self.id.len() + 1 + 4
    }

    fn wire_valid(&self) -> Result<(), InvalidStructureError> {
        self.id.wire_valid()
    }

    unsafe fn encode_unchecked(&self, buf: &mut [u8]) -> usize {
        // SAFETY: the caller guarantees the buffer holds the whole request.
        let mut offset = unsafe { self.id.encode_unchecked(buf) };
        buf[offset] = self.index.value();
        offset += 1;
        buf[offset..offset + 4].copy_from_slice(&self.timestamp_secs().to_be_bytes());
        offset + 4
    }
}

/// Setup or renewal request of an E2E reservation, as accepted so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct E2eSetupRequest {
    /// The base request.
    pub request: Request,
    /// Source end host.
    pub src_host: Option<IpAddr>,
    /// Destination end host.
    pub dst_host: Option<IpAddr>,
    /// Requested bandwidth.
    pub requested_bw: BwCls,
    /// Segment reservations the E2E reservation is stitched over, in path order.
    pub segment_rsvs: Vec<ReservationId>,
    /// Position in `segment_rsvs` of the segment the processing AS is on. Transfer
    /// ASes use the first of their two segments.
    pub current_segment_rsv_index: usize,
    /// Bandwidth granted by each AS that processed the request so far.
    pub allocation_trail: Vec<BwCls>,
    /// Path steps at which the request transfers from one segment to the next.
    pub transfer_indices: Vec<usize>,
}

impl E2eSetupRequest {
    /// Checks the request for structural errors.
    pub fn validate(&self) -> Result<(), E2eRequestError> {
        self.request.validate()?;

        let id = &self.request.id;
        if !id.is_e2e_id() {
            return Err(E2eRequestError::NotE2eId(id.clone()));
        }
        let count = self.segment_rsvs.len();
        if count == 0 || count > MAX_SEGMENT_RSVS {
            return Err(E2eRequestError::InvalidSegmentCount(count));
        }
        if !is_specified(self.src_host) || !is_specified(self.dst_host) {
            return Err(E2eRequestError::EmptyHost {
                src: self.src_host,
                dst: self.dst_host,
            });
        }
        for (position, seg) in self.segment_rsvs.iter().enumerate() {
            if seg.validate().is_err() || !seg.is_segment_id() {
                return Err(E2eRequestError::NotSegmentId {
                    position,
                    id: seg.clone(),
                });
            }
        }
        if self.current_segment_rsv_index >= count {
            return Err(E2eRequestError::CurrentSegmentOutOfRange {
                current: self.current_segment_rsv_index,
                count,
            });
        }
        if self.transfer_indices.len() > MAX_TRANSFER_INDICES {
            return Err(E2eRequestError::TooManyTransferIndices(
                self.transfer_indices.len(),
            ));
        }
        let steps = self.request.path.steps.len();
        if let Some(&step) = self.transfer_indices.iter().find(|&&step| step >= steps) {
            return Err(E2eRequestError::TransferIndexOutOfRange { step, steps });
        }
        Ok(())
    }

    /// Length of the immutable fields serialization.
    pub fn immutable_fields_len(&self) -> usize {
        self.request.required_size()
            + 2 * ISD_AS_LEN
            + 2 * HOST_LEN
            + 1
            + self.segment_rsvs.len() * ReservationId::SEGMENT_ENCODED_LEN
    }

    /// Serializes the fields that no AS on the path may change.
    ///
    /// The output is deterministic. Must only be called on a validated request: a
    /// segment reservation ID that does not encode to the segment ID length is an
    /// internal fault and processing of the request has to stop.
    pub fn serialize_immutable_fields(&self) -> Result<Vec<u8>, SerializationFault> {
        let mut buf = vec![0u8; self.immutable_fields_len()];

        let mut offset = self.request.encode(&mut buf)?;

        let path = &self.request.path;
        buf[offset..offset + ISD_AS_LEN].copy_from_slice(&path.src_isd_asn().to_be_bytes());
        offset += ISD_AS_LEN;
        buf[offset..offset + HOST_LEN].copy_from_slice(&host_bytes(self.src_host));
        offset += HOST_LEN;
        buf[offset..offset + ISD_AS_LEN].copy_from_slice(&path.dst_isd_asn().to_be_bytes());
        offset += ISD_AS_LEN;
        buf[offset..offset + HOST_LEN].copy_from_slice(&host_bytes(self.dst_host));
        offset += HOST_LEN;
        buf[offset] = self.requested_bw.value();
        offset += 1;

        for (position, seg) in self.segment_rsvs.iter().enumerate() {
            if seg.len() != ReservationId::SEGMENT_ENCODED_LEN {
                let fault = SerializationFault::InconsistentSegmentIdLength {
                    position,
                    len: seg.len(),
                };
                tracing::error!(id = %self.request.id, %seg, error = %fault, "Cannot serialize E2E request");
                return Err(fault);
            }
            let end = offset + ReservationId::SEGMENT_ENCODED_LEN;
            offset += seg.encode(&mut buf[offset..end])?;
        }
        Ok(buf)
    }

    /// Describes a failure of this request at the processing AS.
    pub fn failure(&self, message: impl Into<String>) -> SetupFailureInfo {
        SetupFailureInfo {
            node_index: self.request.path.current_step,
            message: message.into(),
        }
    }
}

fn is_specified(host: Option<IpAddr>) -> bool {
    host.is_some_and(|ip| !ip.is_unspecified())
}

// 16 byte form of a host, IPv4 addresses are IPv6-mapped.
fn host_bytes(host: Option<IpAddr>) -> [u8; HOST_LEN] {
    match host {
        Some(IpAddr::V4(ip)) => ip.to_ipv6_mapped().octets(),
        Some(IpAddr::V6(ip)) => ip.octets(),
        None => [0; HOST_LEN],
    }
}

/// Where and why an E2E setup failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupFailureInfo {
    /// Path step of the AS that rejected the request.
    pub node_index: usize,
    /// Reason for the rejection.
    pub message: String,
}

impl fmt::Display for SetupFailureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "setup failed at step {}: {}", self.node_index, self.message)
    }
}

/// Malformed base request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Malformed reservation ID.
    #[error(transparent)]
    Id(#[from] IdError),
    /// Malformed path.
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Malformed E2E setup request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum E2eRequestError {
    /// The base request is malformed.
    #[error(transparent)]
    Request(#[from] RequestError),
    /// The request ID is not an E2E reservation ID.
    #[error("non e2e reservation id in request: {0}")]
    NotE2eId(ReservationId),
    /// Not between one and three segment reservations.
    #[error("invalid number of segment reservations for an e2e request: {0}")]
    InvalidSegmentCount(usize),
    /// A host is missing or unspecified.
    #[error("empty fields not allowed: src_host {src:?}, dst_host {dst:?}")]
    EmptyHost {
        /// Source host.
        src: Option<IpAddr>,
        /// Destination host.
        dst: Option<IpAddr>,
    },
    /// A referenced segment reservation ID is malformed or not of the segment class.
    #[error("invalid segment reservation id {id} at position {position}")]
    NotSegmentId {
        /// Position in the segment list.
        position: usize,
        /// The offending ID.
        id: ReservationId,
    },
    /// The current segment does not exist.
    #[error("current segment {current} out of range for {count} segments")]
    CurrentSegmentOutOfRange {
        /// Current segment position.
        current: usize,
        /// Number of segments.
        count: usize,
    },
    /// More than two transfer points.
    #[error("too many transfer indices: {0}")]
    TooManyTransferIndices(usize),
    /// A transfer point lies outside the path.
    #[error("transfer index {step} outside of path with {steps} steps")]
    TransferIndexOutOfRange {
        /// The transfer step.
        step: usize,
        /// Number of path steps.
        steps: usize,
    },
}

/// Internal inconsistency hit while serializing a request. Never the result of
/// validating untrusted input; processing of the request must be aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationFault {
    /// A segment reservation ID has the wrong length.
    #[error(
        "inconsistent segment reservation id length {len} at position {position}, expected {expected}",
        expected = ReservationId::SEGMENT_ENCODED_LEN
    )]
    InconsistentSegmentIdLength {
        /// Position in the segment list.
        position: usize,
        /// Encoded length of the ID.
        len: usize,
    },
    /// A field could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}
