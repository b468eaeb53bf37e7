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

//! COLIBRI bandwidth reservations.
//!
//! A reservation is a bandwidth grant over a SCION path. Grants are renewed by
//! adding new indices to the reservation; each index goes through
//! `Temporary -> Pending -> Active` before older indices are discarded.
//!
//! - [`segment::SegmentReservation`] owns the index lifecycle of a reservation over
//!   one path segment and derives the dataplane [`dataplane::ColibriPath`] of its
//!   active index.
//! - [`e2e::E2eSetupRequest`] validates end-to-end requests stitched over up to
//!   three segment reservations and serializes their immutable fields for
//!   authentication.
//! - [`store::ReservationStore`] holds segment reservations and commits mutations
//!   atomically.
//! - [`beacon::BeaconStore`] is the interface to the segments reservations are built
//!   on.

pub mod address;
pub mod beacon;
pub mod dataplane;
pub mod e2e;
pub mod encode;
pub mod id;
pub mod index;
pub mod path;
pub mod segment;
pub mod store;
pub mod token;
pub mod types;
