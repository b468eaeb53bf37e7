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

//! Segment reservations and their index lifecycle.
//!
//! ```text
//! Temporary --confirm--> Pending --activate--> Active --remove--> (gone)
//! ```
//!
//! Activating an index discards every older index, so the active index is always
//! the first one in the sequence. Every mutation either succeeds completely or
//! leaves the reservation untouched.

use std::fmt;

use thiserror::Error;

use crate::{
    address::Asn,
    dataplane::{ColibriFlags, ColibriHopField, ColibriInfoField, ColibriPath, ColibriPathLayout},
    id::{IdError, ReservationId},
    index::{Index, IndexState, Indices, IndicesError},
    path::{PathError, TransparentPath},
    token::{Token, TokenInfoField},
    types::{BwCls, IndexNumber, PathEndProps, PathType, Rlc, SplitCls, Tick, TypeError},
};

/// A reservation over one path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentReservation {
    /// Identity of the reservation.
    pub id: ReservationId,
    /// Interface where reservation traffic enters this AS.
    pub ingress: u16,
    /// Interface where reservation traffic leaves this AS.
    pub egress: u16,
    /// Kind of segment.
    pub path_type: PathType,
    /// Stitching properties of the segment ends.
    pub path_end_props: PathEndProps,
    /// Split between control and data plane traffic.
    pub traffic_split: SplitCls,
    /// The full path, only known at the AS where the reservation starts.
    pub path_at_source: Option<TransparentPath>,
    indices: Indices,
    // Position of the active index, `None` or `Some(0)`.
    active: Option<usize>,
}

impl SegmentReservation {
    /// Creates an empty reservation owned by `asid` with a zeroed suffix.
    pub fn new(asid: Asn) -> Self {
        Self {
            id: ReservationId::new_segment(asid, [0; ReservationId::SEGMENT_SUFFIX_LEN]),
            ingress: 0,
            egress: 0,
            path_type: PathType::Unknown,
            path_end_props: PathEndProps::empty(),
            traffic_split: SplitCls::default(),
            path_at_source: None,
            indices: Indices::new(),
            active: None,
        }
    }

    /// Returns the indices, oldest first.
    pub fn indices(&self) -> &Indices {
        &self.indices
    }

    /// Returns the index with sequence number `idx`.
    pub fn index(&self, idx: IndexNumber) -> Option<&Index> {
        self.indices.find(idx)
    }

    /// Returns the active index, if any.
    pub fn active_index(&self) -> Option<&Index> {
        self.active.and_then(|pos| self.indices.get(pos))
    }

    /// Appends a new temporary index and returns its sequence number.
    ///
    /// The token of the index is built from the arguments. Fails without modifying
    /// the reservation if the new index would break the sequence invariants, e.g.
    /// if it expires before the current last index.
    #[allow(clippy::too_many_arguments)]
    pub fn new_index(
        &mut self,
        idx: IndexNumber,
        expiration: Tick,
        min_bw: BwCls,
        max_bw: BwCls,
        alloc_bw: BwCls,
        rlc: Rlc,
        path_type: PathType,
    ) -> Result<IndexNumber, ReservationError> {
        let token = Token::new(TokenInfoField {
            idx,
            expiration_tick: expiration,
            bw_cls: alloc_bw,
            rlc,
            path_type,
        });
        let index = Index::new(
            idx,
            expiration,
            IndexState::Temporary,
            min_bw,
            max_bw,
            alloc_bw,
            token,
        );
        self.push_index(index)
    }

    /// Appends an existing index in any state, e.g. when restoring a reservation from
    /// storage. The active pointer is not touched; replaying
    /// [`SegmentReservation::set_index_active`] restores it.
    pub fn push_index(&mut self, index: Index) -> Result<IndexNumber, ReservationError> {
        let idx = index.idx;
        let candidate = self.indices.iter().chain(std::iter::once(&index));
        crate::index::validate_indices(candidate)?;

        tracing::debug!(id = %self.id, %idx, expiration = %index.expiration, state = %index.state(), "Added index");
        self.indices.push_back(index);
        Ok(idx)
    }

    /// Returns the sequence number a renewal should use.
    pub fn next_index_to_renew(&self) -> IndexNumber {
        match self.indices.last() {
            Some(last) => last.idx.wrapping_add(1),
            None => IndexNumber::MIN,
        }
    }

    /// Returns the index that should be activated next: the one after the active
    /// index, or the newest index if none is active.
    pub fn next_index_to_activate(&self) -> Option<IndexNumber> {
        let position = match self.active {
            None => self.indices.len().checked_sub(1)?,
            Some(active) => active + 1,
        };
        self.indices.get(position).map(|index| index.idx)
    }

    /// Marks a temporary or pending index as confirmed.
    pub fn set_index_confirmed(&mut self, idx: IndexNumber) -> Result<(), ReservationError> {
        let position = self.position(idx)?;
        let Some(index) = self.indices.get_mut(position) else {
            return Err(ReservationError::NotFound(idx));
        };
        if index.state() == IndexState::Active {
            return Err(ReservationError::InvalidTransition {
                idx,
                from: IndexState::Active,
                to: IndexState::Pending,
            });
        }
        index.set_state(IndexState::Pending);
        tracing::debug!(id = %self.id, %idx, "Confirmed index");
        Ok(())
    }

    /// Activates a confirmed index and discards every older index.
    ///
    /// Activating the index that is already active is a no-op. An index whose state
    /// is already active but that is not pointed at (a reservation being restored
    /// from storage) is accepted as well.
    pub fn set_index_active(&mut self, idx: IndexNumber) -> Result<(), ReservationError> {
        let position = self.position(idx)?;
        if self.active == Some(position) {
            return Ok(());
        }
        let Some(index) = self.indices.get(position) else {
            return Err(ReservationError::NotFound(idx));
        };
        let state = index.state();
        if state != IndexState::Pending && state != IndexState::Active {
            return Err(ReservationError::InvalidTransition {
                idx,
                from: state,
                to: IndexState::Active,
            });
        }
        if let Some((active_position, active)) = self.current_active()
            && active_position > position
        {
            return Err(ReservationError::OutOfOrder {
                active,
                requested: idx,
            });
        }

        self.indices.discard_front(position);
        if let Some(first) = self.indices.get_mut(0) {
            first.set_state(IndexState::Active);
        }
        self.active = Some(0);
        tracing::debug!(id = %self.id, %idx, discarded = position, "Activated index");
        Ok(())
    }

    /// Removes every index up to and including `idx`.
    pub fn remove_index(&mut self, idx: IndexNumber) -> Result<(), ReservationError> {
        let position = self.position(idx)?;
        self.indices.discard_front(position + 1);
        self.active = match self.active {
            Some(active) if active > position => Some(active - position - 1),
            _ => None,
        };
        tracing::debug!(id = %self.id, %idx, remaining = self.indices.len(), "Removed indices");
        Ok(())
    }

    /// Largest allocated bandwidth over all indices, in kbps.
    pub fn max_blocked_bw(&self) -> u64 {
        self.indices
            .iter()
            .map(|index| index.alloc_bw)
            .max()
            .map(|cls| cls.to_kbps())
            .unwrap_or(0)
    }

    /// Largest requested bandwidth over all indices, in kbps.
    pub fn max_requested_bw(&self) -> u64 {
        self.indices
            .iter()
            .map(|index| index.max_bw)
            .max()
            .map(|cls| cls.to_kbps())
            .unwrap_or(0)
    }

    /// Checks every invariant of the reservation.
    pub fn validate(&self) -> Result<(), ReservationError> {
        self.id.validate()?;
        if !self.id.is_segment_id() {
            return Err(ReservationError::NotSegmentId(self.id.clone()));
        }
        self.indices.validate()?;
        if let Some(pointer) = self.active {
            if pointer > 0 || pointer >= self.indices.len() {
                return Err(ReservationError::InvalidActivePointer {
                    pointer,
                    len: self.indices.len(),
                });
            }
            if let Some(index) = self.indices.get(pointer)
                && index.state() != IndexState::Active
            {
                return Err(ReservationError::ActiveStateMismatch(index.idx));
            }
        }
        let at_source = self
            .path_at_source
            .as_ref()
            .is_some_and(TransparentPath::is_at_source);
        if (self.ingress == 0) != at_source {
            return Err(ReservationError::IngressPathMismatch {
                ingress: self.ingress,
                at_source,
            });
        }
        self.path_end_props.validate()?;
        if let Some(path) = &self.path_at_source {
            path.validate()?;
        }
        Ok(())
    }

    /// Builds the COLIBRI dataplane path of the active index, `None` if no index is
    /// active or its token has more hop fields than a COLIBRI path can carry.
    pub fn derive_colibri_path(&self) -> Option<ColibriPath> {
        let index = self.active_index()?;
        let token = &index.token;
        let Ok(hf_count) = u8::try_from(token.hop_fields.len()) else {
            tracing::warn!(
                id = %self.id,
                idx = %index.idx,
                hop_fields = token.hop_fields.len(),
                "Token has too many hop fields for a COLIBRI path"
            );
            return None;
        };

        let mut res_id_suffix = [0u8; ColibriPathLayout::SUFFIX_LEN];
        let n = self.id.suffix.len().min(res_id_suffix.len());
        res_id_suffix[..n].copy_from_slice(&self.id.suffix[..n]);

        let hop_fields: Vec<ColibriHopField> = token
            .hop_fields
            .iter()
            .map(|hf| {
                ColibriHopField {
                    ingress: hf.ingress,
                    egress: hf.egress,
                    mac: hf.mac,
                }
            })
            .collect();

        Some(ColibriPath {
            packet_timestamp: [0; ColibriPathLayout::TIMESTAMP_LEN],
            info_field: ColibriInfoField {
                flags: ColibriFlags::C | ColibriFlags::S,
                ver: index.idx.value(),
                curr_hf: 0,
                hf_count,
                res_id_suffix,
                exp_tick: token.info_field.expiration_tick,
                bw_cls: index.alloc_bw,
                rlc: token.info_field.rlc,
                orig_pay_len: 0,
            },
            hop_fields,
        })
    }

    fn position(&self, idx: IndexNumber) -> Result<usize, ReservationError> {
        self.indices
            .position(idx)
            .ok_or(ReservationError::NotFound(idx))
    }

    // The active index by pointer, or by state for a reservation under restoration.
    fn current_active(&self) -> Option<(usize, IndexNumber)> {
        if let Some(pos) = self.active {
            return self.indices.get(pos).map(|index| (pos, index.idx));
        }
        self.indices
            .iter()
            .enumerate()
            .find(|(_, index)| index.state() == IndexState::Active)
            .map(|(pos, index)| (pos, index.idx))
    }
}

impl fmt::Display for SegmentReservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Idxs: {}", self.id, self.indices)
    }
}

/// Errors of segment reservation operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReservationError {
    /// No index with this sequence number.
    #[error("index {0} not found")]
    NotFound(IndexNumber),
    /// The index is not in a state that allows the transition.
    #[error("invalid transition of index {idx} from {from} to {to}")]
    InvalidTransition {
        /// The index.
        idx: IndexNumber,
        /// Current state.
        from: IndexState,
        /// Requested state.
        to: IndexState,
    },
    /// Activation of an index older than the active one.
    #[error("cannot activate index {requested}, newer index {active} is active")]
    OutOfOrder {
        /// The active index.
        active: IndexNumber,
        /// The index requested to be activated.
        requested: IndexNumber,
    },
    /// Index sequence invariant violated.
    #[error(transparent)]
    Indices(#[from] IndicesError),
    /// Malformed reservation ID.
    #[error(transparent)]
    Id(#[from] IdError),
    /// The ID does not belong to a segment reservation.
    #[error("{0} is not a segment reservation ID")]
    NotSegmentId(ReservationId),
    /// The active pointer is neither unset nor the first index.
    #[error("invalid active index position {pointer} with {len} indices")]
    InvalidActivePointer {
        /// Pointer position.
        pointer: usize,
        /// Number of indices.
        len: usize,
    },
    /// The active pointer points at an index that is not active.
    #[error("active pointer at index {0} which is not active")]
    ActiveStateMismatch(IndexNumber),
    /// Ingress interface and source path disagree about where the reservation starts.
    #[error("ingress {ingress} inconsistent with reservation path (at source: {at_source})")]
    IngressPathMismatch {
        /// Ingress interface.
        ingress: u16,
        /// Whether the source path places this AS at the start.
        at_source: bool,
    },
    /// Malformed path end properties.
    #[error(transparent)]
    PathEndProps(#[from] TypeError),
    /// Malformed source path.
    #[error(transparent)]
    Path(#[from] PathError),
}
