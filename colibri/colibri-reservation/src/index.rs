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

//! Reservation indices and the invariants of an index sequence.

use std::{collections::VecDeque, fmt};

use thiserror::Error;

use crate::{
    token::Token,
    types::{BwCls, IndexNumber, Tick},
};

/// Lifecycle state of an index.
///
/// `Temporary --confirm--> Pending --activate--> Active --prune--> removed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexState {
    /// Requested but not yet confirmed by the whole path.
    Temporary,
    /// Confirmed, waiting to be activated.
    Pending,
    /// Currently authorizing traffic.
    Active,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexState::Temporary => "temporary",
            IndexState::Pending => "pending",
            IndexState::Active => "active",
        };
        f.write_str(s)
    }
}

/// One generation of a bandwidth grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    /// Sequence number, unique within the reservation.
    pub idx: IndexNumber,
    /// Expiration of the grant.
    pub expiration: Tick,
    /// Minimum bandwidth the requester accepts.
    pub min_bw: BwCls,
    /// Maximum bandwidth the requester asked for.
    pub max_bw: BwCls,
    /// Bandwidth granted.
    pub alloc_bw: BwCls,
    /// Token used to build dataplane paths for this index.
    pub token: Token,
    state: IndexState,
}

impl Index {
    /// Creates an index. Any state is accepted so that indices can be restored from
    /// durable storage.
    pub fn new(
        idx: IndexNumber,
        expiration: Tick,
        state: IndexState,
        min_bw: BwCls,
        max_bw: BwCls,
        alloc_bw: BwCls,
        token: Token,
    ) -> Self {
        Self {
            idx,
            expiration,
            min_bw,
            max_bw,
            alloc_bw,
            token,
            state,
        }
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> IndexState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: IndexState) {
        self.state = state;
    }
}

/// The ordered indices of one reservation, oldest first.
///
/// The front of the deque is the first live position. Truncating history pops from
/// the front, so positions are only meaningful until the next mutation; hold on to
/// [`IndexNumber`]s instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Indices(VecDeque<Index>);

impl Indices {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indices.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no indices.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the indices, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Index> + ExactSizeIterator {
        self.0.iter()
    }

    /// Returns the index at `position`.
    pub fn get(&self, position: usize) -> Option<&Index> {
        self.0.get(position)
    }

    /// Returns the newest index.
    pub fn last(&self) -> Option<&Index> {
        self.0.back()
    }

    /// Returns the position of the index with sequence number `idx`.
    pub fn position(&self, idx: IndexNumber) -> Option<usize> {
        self.0.iter().position(|index| index.idx == idx)
    }

    /// Returns the index with sequence number `idx`.
    pub fn find(&self, idx: IndexNumber) -> Option<&Index> {
        self.0.iter().find(|index| index.idx == idx)
    }

    /// Checks the sequence invariants, see [`validate_indices`].
    pub fn validate(&self) -> Result<(), IndicesError> {
        validate_indices(self.0.iter())
    }

    pub(crate) fn get_mut(&mut self, position: usize) -> Option<&mut Index> {
        self.0.get_mut(position)
    }

    pub(crate) fn push_back(&mut self, index: Index) {
        self.0.push_back(index);
    }

    /// Drops the first `count` indices.
    pub(crate) fn discard_front(&mut self, count: usize) {
        let count = count.min(self.0.len());
        self.0.drain(..count);
    }
}

impl FromIterator<Index> for Indices {
    fn from_iter<T: IntoIterator<Item = Index>>(iter: T) -> Self {
        Indices(iter.into_iter().collect())
    }
}

impl fmt::Display for Indices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{{idx: {}, exp: {}, state: {}}}",
                index.idx, index.expiration, index.state
            )?;
        }
        write!(f, "]")
    }
}

/// Checks the invariants of an index sequence:
///
/// - expirations never decrease from one index to the next,
/// - sequence numbers are unique,
/// - at most one index is active,
/// - the sequence does not hold more indices than there are sequence numbers.
pub fn validate_indices<'a>(indices: impl IntoIterator<Item = &'a Index>) -> Result<(), IndicesError> {
    let mut seen = [false; IndexNumber::MODULUS as usize];
    let mut last_expiration: Option<(IndexNumber, Tick)> = None;
    let mut active: Option<IndexNumber> = None;
    let mut count = 0usize;

    for index in indices {
        count += 1;
        if count > IndexNumber::MODULUS as usize {
            return Err(IndicesError::TooMany(count));
        }
        if let Some((previous_idx, previous)) = last_expiration
            && index.expiration < previous
        {
            return Err(IndicesError::NonMonotonicExpiration {
                previous_idx,
                previous,
                idx: index.idx,
                expiration: index.expiration,
            });
        }
        let slot = &mut seen[index.idx.value() as usize];
        if *slot {
            return Err(IndicesError::DuplicateIndex(index.idx));
        }
        *slot = true;
        if index.state == IndexState::Active {
            if let Some(first) = active {
                return Err(IndicesError::MultipleActive {
                    first,
                    second: index.idx,
                });
            }
            active = Some(index.idx);
        }
        last_expiration = Some((index.idx, index.expiration));
    }
    Ok(())
}

/// Violated index sequence invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicesError {
    /// An index expires before its predecessor.
    #[error(
        "index expiration not monotonic: index {idx} expires at {expiration}, before index {previous_idx} at {previous}"
    )]
    NonMonotonicExpiration {
        /// Preceding index.
        previous_idx: IndexNumber,
        /// Expiration of the preceding index.
        previous: Tick,
        /// Offending index.
        idx: IndexNumber,
        /// Expiration of the offending index.
        expiration: Tick,
    },
    /// Two indices share a sequence number.
    #[error("index number {0} already in use")]
    DuplicateIndex(IndexNumber),
    /// More than one index is active.
    #[error("more than one active index: {first} and {second}")]
    MultipleActive {
        /// First active index.
        first: IndexNumber,
        /// Second active index.
        second: IndexNumber,
    },
    /// More indices than sequence numbers.
    #[error("too many indices: {0}")]
    TooMany(usize),
}
