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
//! Reservation lifecycle test suite.

use std::{
    net::{IpAddr, Ipv4Addr},
    time::{Duration, UNIX_EPOCH},
};

use assert_matches::assert_matches;
use colibri_reservation::{
    address::Asn,
    dataplane::{ColibriPath, invariant_representation},
    e2e::{E2eSetupRequest, Request},
    encode::WireEncode,
    id::ReservationId,
    index::IndexState,
    path::{PathStep, TransparentPath},
    segment::{ReservationError, SegmentReservation},
    store::{ReservationStore, StoreError},
    token::{HopMac, TokenHopField},
    types::{BwCls, IndexNumber, PathEndProps, PathType, Rlc, Tick},
};

fn source_path() -> TransparentPath {
    TransparentPath::new(vec![
        PathStep {
            isd_asn: "1-ff00:0:111".parse().unwrap(),
            ingress: 0,
            egress: 1,
        },
        PathStep {
            isd_asn: "1-ff00:0:110".parse().unwrap(),
            ingress: 2,
            egress: 0,
        },
    ])
}

fn source_reservation() -> SegmentReservation {
    let mut rsv = SegmentReservation::new(Asn::new(0xff00_0000_0111));
    rsv.id.suffix = vec![0, 0, 0, 1];
    rsv.egress = 1;
    rsv.path_type = PathType::Up;
    rsv.path_end_props = PathEndProps::START_LOCAL | PathEndProps::END_TRANSFER;
    rsv.path_at_source = Some(source_path());
    rsv
}

/// Renewal rolls a reservation from one index to the next through the store.
#[test_log::test]
fn renewal_through_store() {
    let store = ReservationStore::new();
    let rsv = source_reservation();
    let id = rsv.id.clone();
    store.insert(rsv).unwrap();

    for round in 0..20u32 {
        let idx = store
            .with_reservation(&id, |rsv| {
                let next = rsv.next_index_to_renew();
                let idx = rsv.new_index(
                    next,
                    Tick(1000 + round),
                    BwCls::new(1).unwrap(),
                    BwCls::new(10).unwrap(),
                    BwCls::new(8).unwrap(),
                    Rlc(1),
                    PathType::Up,
                )?;
                rsv.set_index_confirmed(idx)?;
                Ok(idx)
            })
            .unwrap();
        assert_eq!(idx, IndexNumber::new_truncate(round as u8));

        store
            .with_reservation(&id, |rsv| {
                let next = rsv
                    .next_index_to_activate()
                    .ok_or(ReservationError::NotFound(idx))?;
                rsv.set_index_active(next)
            })
            .unwrap();

        let rsv = store.get(&id).unwrap();
        assert_eq!(rsv.indices().len(), 1);
        assert_eq!(rsv.active_index().map(|i| i.idx), Some(idx));
    }

    // Removing the only index drops the reservation.
    let last = store.get(&id).unwrap().active_index().unwrap().idx;
    assert_eq!(store.remove_index(&id, last), Ok(true));
    assert_matches!(store.get(&id), None);
    assert_matches!(
        store.remove_index(&id, last),
        Err(StoreError::NotFound(_))
    );
}

/// The active index of a segment reservation yields a reproducible dataplane path.
#[test_log::test]
fn active_index_to_dataplane_path() {
    let mut rsv = source_reservation();
    let idx = rsv
        .new_index(
            IndexNumber::new(4).unwrap(),
            Tick(77),
            BwCls::new(1).unwrap(),
            BwCls::new(10).unwrap(),
            BwCls::new(6).unwrap(),
            Rlc(3),
            PathType::Up,
        )
        .unwrap();
    rsv.set_index_confirmed(idx).unwrap();
    rsv.set_index_active(idx).unwrap();
    assert_eq!(rsv.active_index().unwrap().state(), IndexState::Active);
    assert!(rsv.validate().is_ok());

    // Hop fields are added once the setup succeeded; restoring the reservation with
    // the completed token replays the activation.
    let mut index = rsv.active_index().unwrap().clone();
    index.token.add_hop_field(TokenHopField {
        ingress: 0,
        egress: 1,
        mac: HopMac([0xa, 0xb, 0xc, 0xd]),
    });
    let mut with_hops = source_reservation();
    with_hops.push_index(index).unwrap();
    assert!(with_hops.active_index().is_none());
    with_hops.set_index_active(idx).unwrap();

    let path = with_hops.derive_colibri_path().unwrap();
    assert_eq!(path.info_field.hf_count, 1);
    assert_eq!(path.info_field.ver, 4);

    let raw = path.encode_to_vec().unwrap();
    assert_eq!(ColibriPath::decode(&raw).unwrap(), path);
    assert_eq!(invariant_representation(&raw), raw);
}

/// An E2E request stitched over segment reservations serializes their IDs in order.
#[test_log::test]
fn e2e_request_over_segments() {
    let segments: Vec<ReservationId> = (1..=3u8)
        .map(|n| ReservationId::new_segment(Asn::new(0xff00_0000_0110 + n as u64), [n; 4]))
        .collect();
    let request = E2eSetupRequest {
        request: Request {
            id: ReservationId::new_e2e(Asn::new(0xff00_0000_0111), [5; 12]),
            index: IndexNumber::MIN,
            timestamp: UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            path: source_path(),
        },
        src_host: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
        dst_host: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
        requested_bw: BwCls::new(12).unwrap(),
        segment_rsvs: segments.clone(),
        current_segment_rsv_index: 0,
        allocation_trail: vec![BwCls::new(12).unwrap()],
        transfer_indices: vec![1],
    };
    request.validate().unwrap();

    let buf = request.serialize_immutable_fields().unwrap();
    let seg_start = buf.len() - 3 * ReservationId::SEGMENT_ENCODED_LEN;
    for (i, seg) in segments.iter().enumerate() {
        let start = seg_start + i * ReservationId::SEGMENT_ENCODED_LEN;
        assert_eq!(
            &buf[start..start + ReservationId::SEGMENT_ENCODED_LEN],
            seg.encode_to_vec().unwrap().as_slice()
        );
    }
}
