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

//! Owning store of segment reservations.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;

use crate::{
    id::ReservationId,
    segment::{ReservationError, SegmentReservation},
    types::IndexNumber,
};

/// Holds segment reservations by ID.
///
/// Every mutation runs on a copy of the reservation and is only committed if the
/// mutation succeeds and the result passes [`SegmentReservation::validate`]. Readers
/// therefore never observe a partially applied mutation.
#[derive(Debug, Default)]
pub struct ReservationStore {
    reservations: Mutex<HashMap<ReservationId, SegmentReservation>>,
}

impl ReservationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reservation after validating it.
    pub fn insert(&self, reservation: SegmentReservation) -> Result<(), StoreError> {
        reservation
            .validate()
            .map_err(|source| StoreError::reservation(&reservation.id, source))?;

        let mut reservations = self.lock();
        if reservations.contains_key(&reservation.id) {
            return Err(StoreError::AlreadyExists(reservation.id));
        }
        tracing::debug!(id = %reservation.id, "Stored reservation");
        reservations.insert(reservation.id.clone(), reservation);
        Ok(())
    }

    /// Returns a copy of the reservation with this ID.
    pub fn get(&self, id: &ReservationId) -> Option<SegmentReservation> {
        self.lock().get(id).cloned()
    }

    /// Returns true if a reservation with this ID is stored.
    pub fn contains(&self, id: &ReservationId) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of stored reservations.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no reservation is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Applies `f` to the reservation with this ID.
    ///
    /// `f` runs on a copy. The copy replaces the stored reservation only if `f`
    /// succeeds, the result is valid and its ID is unchanged; otherwise the stored
    /// reservation is left unchanged.
    pub fn with_reservation<T>(
        &self,
        id: &ReservationId,
        f: impl FnOnce(&mut SegmentReservation) -> Result<T, ReservationError>,
    ) -> Result<T, StoreError> {
        let mut reservations = self.lock();
        let stored = reservations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let mut scratch = stored.clone();
        let out = f(&mut scratch).map_err(|source| StoreError::reservation(id, source))?;
        scratch
            .validate()
            .map_err(|source| StoreError::reservation(id, source))?;
        if scratch.id != *id {
            return Err(StoreError::IdChanged {
                id: id.clone(),
                new_id: scratch.id,
            });
        }
        *stored = scratch;
        Ok(out)
    }

    /// Removes every index up to and including `idx` and drops the reservation once it
    /// has no indices left. Returns true if the reservation was dropped.
    pub fn remove_index(&self, id: &ReservationId, idx: IndexNumber) -> Result<bool, StoreError> {
        let mut reservations = self.lock();
        let stored = reservations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let mut scratch = stored.clone();
        scratch
            .remove_index(idx)
            .and_then(|_| scratch.validate())
            .map_err(|source| StoreError::reservation(id, source))?;

        if scratch.indices().is_empty() {
            reservations.remove(id);
            tracing::debug!(%id, "Dropped reservation without indices");
            return Ok(true);
        }
        *stored = scratch;
        Ok(false)
    }

    // Committed state is always valid, a panic inside a mutation only ever poisons
    // a discarded copy.
    fn lock(&self) -> MutexGuard<'_, HashMap<ReservationId, SegmentReservation>> {
        self.reservations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Errors of [`ReservationStore`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No reservation with this ID.
    #[error("reservation {0} not found")]
    NotFound(ReservationId),
    /// A reservation with this ID already exists.
    #[error("reservation {0} already exists")]
    AlreadyExists(ReservationId),
    /// A mutation changed the ID of the reservation, nothing was committed.
    #[error("reservation {id} cannot change its ID to {new_id}")]
    IdChanged {
        /// The ID the reservation is stored under.
        id: ReservationId,
        /// The ID set by the mutation.
        new_id: ReservationId,
    },
    /// The operation on the reservation failed, nothing was committed.
    #[error("reservation {id}: {source}")]
    Reservation {
        /// The reservation.
        id: ReservationId,
        /// The cause.
        #[source]
        source: ReservationError,
    },
}

impl StoreError {
    fn reservation(id: &ReservationId, source: ReservationError) -> Self {
        StoreError::Reservation {
            id: id.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::{
        address::Asn,
        index::{IndexState, IndicesError},
        types::{BwCls, PathType, Rlc, Tick},
    };

    fn idx(n: u8) -> IndexNumber {
        IndexNumber::new(n).unwrap()
    }

    fn reservation(suffix: u8) -> SegmentReservation {
        let mut rsv = SegmentReservation::new(Asn::new(0xff00_0000_0110));
        rsv.id.suffix = vec![0, 0, 0, suffix];
        rsv.ingress = 1;
        rsv.egress = 2;
        rsv
    }

    fn new_index(rsv: &mut SegmentReservation, n: u8, exp: u32) -> Result<IndexNumber, ReservationError> {
        rsv.new_index(
            idx(n),
            Tick(exp),
            BwCls::default(),
            BwCls::default(),
            BwCls::default(),
            Rlc(0),
            PathType::Up,
        )
    }

    #[test]
    fn insert_and_mutate() {
        let store = ReservationStore::new();
        let rsv = reservation(1);
        let id = rsv.id.clone();
        store.insert(rsv.clone()).unwrap();
        assert_eq!(store.insert(rsv), Err(StoreError::AlreadyExists(id.clone())));

        let added = store
            .with_reservation(&id, |rsv| new_index(rsv, 0, 10))
            .unwrap();
        assert_eq!(added, idx(0));
        store
            .with_reservation(&id, |rsv| {
                rsv.set_index_confirmed(idx(0))?;
                rsv.set_index_active(idx(0))
            })
            .unwrap();

        let stored = store.get(&id).unwrap();
        assert_eq!(stored.active_index().map(|i| i.state()), Some(IndexState::Active));
    }

    #[test]
    fn failed_mutation_rolls_back() {
        let store = ReservationStore::new();
        let rsv = reservation(1);
        let id = rsv.id.clone();
        store.insert(rsv).unwrap();
        store
            .with_reservation(&id, |rsv| new_index(rsv, 0, 10))
            .unwrap();
        let before = store.get(&id).unwrap();

        // The first step succeeds on the copy, the second fails.
        let result = store.with_reservation(&id, |rsv| {
            rsv.set_index_confirmed(idx(0))?;
            new_index(rsv, 1, 5)
        });
        assert_matches!(
            result,
            Err(StoreError::Reservation {
                source: ReservationError::Indices(IndicesError::NonMonotonicExpiration { .. }),
                ..
            })
        );
        assert_eq!(store.get(&id).unwrap(), before);

        // Mutations leaving an invalid reservation are not committed either.
        let result = store.with_reservation(&id, |rsv| {
            rsv.ingress = 0;
            Ok(())
        });
        assert_matches!(
            result,
            Err(StoreError::Reservation {
                source: ReservationError::IngressPathMismatch { .. },
                ..
            })
        );
        assert_eq!(store.get(&id).unwrap(), before);
    }

    #[test]
    fn mutation_cannot_change_id() {
        let store = ReservationStore::new();
        let rsv = reservation(1);
        let id = rsv.id.clone();
        store.insert(rsv).unwrap();
        let before = store.get(&id).unwrap();
        let other = reservation(9).id;

        let result = store.with_reservation(&id, |rsv| {
            rsv.id = other.clone();
            Ok(())
        });
        assert_eq!(
            result,
            Err(StoreError::IdChanged {
                id: id.clone(),
                new_id: other.clone(),
            })
        );
        assert_eq!(store.get(&id).unwrap(), before);

        // The other ID is still free.
        store.insert(reservation(9)).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&other).unwrap().id, other);
    }

    #[test]
    fn insert_rejects_invalid_reservation() {
        let store = ReservationStore::new();
        let mut rsv = reservation(1);
        rsv.ingress = 0;
        assert_matches!(store.insert(rsv), Err(StoreError::Reservation { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn removing_last_index_drops_reservation() {
        let store = ReservationStore::new();
        let rsv = reservation(2);
        let id = rsv.id.clone();
        store.insert(rsv).unwrap();
        store
            .with_reservation(&id, |rsv| {
                new_index(rsv, 0, 10)?;
                new_index(rsv, 1, 11)
            })
            .unwrap();

        assert_eq!(store.remove_index(&id, idx(0)), Ok(false));
        assert_eq!(store.get(&id).unwrap().indices().len(), 1);
        assert_matches!(
            store.remove_index(&id, idx(0)),
            Err(StoreError::Reservation {
                source: ReservationError::NotFound(_),
                ..
            })
        );
        assert_eq!(store.remove_index(&id, idx(1)), Ok(true));
        assert!(!store.contains(&id));
        assert_eq!(
            store.with_reservation(&id, |_| Ok(())),
            Err(StoreError::NotFound(id))
        );
    }
}
