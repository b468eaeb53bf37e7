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

//! Beacon store interface.
//!
//! Beacons are the path segments discovered by beaconing. Reservations are set up
//! over the segments a [`BeaconStore`] selects for propagation and registration.
//! [`MemoryBeaconStore`] keeps everything in memory and applies the configured
//! [`Policy`] filters.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    address::{Isd, IsdAsn},
    types::ResFut,
};

/// A verified path segment received through beaconing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    /// ASes on the segment, originator first.
    pub hops: Vec<IsdAsn>,
    /// Interface of the local AS the beacon was received on.
    pub ingress: u16,
    /// The encoded path segment.
    pub segment: Bytes,
}

impl Beacon {
    /// The AS that originated the beacon.
    pub fn start_isd_asn(&self) -> IsdAsn {
        self.hops.first().copied().unwrap_or(IsdAsn::WILDCARD)
    }

    // Two beacons with the same key describe the same segment.
    fn key(&self) -> (u16, &[IsdAsn]) {
        (self.ingress, &self.hops)
    }
}

/// Kind of segment to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    /// Up segment.
    Up,
    /// Down segment.
    Down,
    /// Core segment.
    Core,
}

/// What a [`Policy`] is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    /// Selection of beacons to propagate.
    #[default]
    Propagation,
    /// Selection of up segments to register.
    UpRegistration,
    /// Selection of down segments to register.
    DownRegistration,
    /// Selection of core segments to register.
    CoreRegistration,
}

impl From<SegmentType> for PolicyType {
    fn from(value: SegmentType) -> Self {
        match value {
            SegmentType::Up => PolicyType::UpRegistration,
            SegmentType::Down => PolicyType::DownRegistration,
            SegmentType::Core => PolicyType::CoreRegistration,
        }
    }
}

/// Beacon selection policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// The selection this policy governs.
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    /// Number of beacons selected.
    pub best_set_size: usize,
    /// Maximum expiration time of segments created under this policy, as an 8 bit
    /// relative expiration.
    pub max_exp_time: u8,
    /// Beacons rejected by this filter are never selected.
    pub filter: Filter,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            policy_type: PolicyType::Propagation,
            best_set_size: 20,
            max_exp_time: u8::MAX,
            filter: Filter::default(),
        }
    }
}

impl Policy {
    /// Default policy of the given type.
    pub fn with_type(policy_type: PolicyType) -> Self {
        Self {
            policy_type,
            ..Default::default()
        }
    }
}

/// Beacon filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    /// Maximum number of ASes on a beacon.
    pub max_hops_length: usize,
    /// ISDs a beacon must not traverse.
    pub isd_blocklist: Vec<u16>,
    /// Accept beacons that leave an ISD and enter it again.
    pub allow_isd_loop: bool,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            max_hops_length: 10,
            isd_blocklist: Vec::new(),
            allow_isd_loop: true,
        }
    }
}

impl Filter {
    /// Returns the reason the beacon is rejected, if any.
    pub fn apply(&self, beacon: &Beacon) -> Result<(), FilterError> {
        if beacon.hops.len() > self.max_hops_length {
            return Err(FilterError::TooManyHops {
                hops: beacon.hops.len(),
                max: self.max_hops_length,
            });
        }
        if let Some(hop) = beacon
            .hops
            .iter()
            .find(|hop| self.isd_blocklist.contains(&hop.isd().value()))
        {
            return Err(FilterError::BlockedIsd(hop.isd()));
        }
        if !self.allow_isd_loop {
            let mut left: HashSet<Isd> = HashSet::new();
            let mut current: Option<Isd> = None;
            for isd in beacon.hops.iter().map(IsdAsn::isd) {
                if current == Some(isd) {
                    continue;
                }
                if left.contains(&isd) {
                    return Err(FilterError::IsdLoop(isd));
                }
                if let Some(previous) = current {
                    left.insert(previous);
                }
                current = Some(isd);
            }
        }
        Ok(())
    }
}

/// Counters of a beacon insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertStats {
    /// New beacons stored.
    pub inserted: usize,
    /// Known beacons replaced by a newer copy.
    pub updated: usize,
    /// Beacons dropped by the policy filters.
    pub filtered: usize,
}

/// Access to the beacons of the local AS.
pub trait BeaconStore: Send + Sync + 'static {
    /// Checks whether the beacon would be filtered on insertion. Callers use this to
    /// drop beacons early.
    fn pre_filter(&self, beacon: &Beacon) -> Result<(), FilterError>;

    /// Beacons selected by the propagation policy. Empty if nothing is selected.
    fn beacons_to_propagate(&self) -> impl ResFut<'_, Vec<Beacon>, BeaconStoreError>;

    /// Segments selected by the registration policy of `segment_type`.
    fn segments_to_register(
        &self,
        segment_type: SegmentType,
    ) -> impl ResFut<'_, Vec<Beacon>, BeaconStoreError>;

    /// Adds a verified beacon.
    fn insert_beacon(&self, beacon: Beacon) -> impl ResFut<'_, InsertStats, BeaconStoreError>;

    /// Replaces the policy of the policy's type. Beacons rejected by every policy
    /// after the update are removed.
    fn update_policy(&self, policy: Policy) -> impl ResFut<'_, (), BeaconStoreError>;

    /// Maximum segment expiration time of the given policy.
    fn max_exp_time(&self, policy_type: PolicyType) -> u8;
}

/// Reason a beacon is filtered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The beacon is longer than allowed.
    #[error("beacon has {hops} hops, maximum is {max}")]
    TooManyHops {
        /// Beacon length.
        hops: usize,
        /// Allowed length.
        max: usize,
    },
    /// The beacon traverses a blocked ISD.
    #[error("beacon traverses blocked ISD {0}")]
    BlockedIsd(Isd),
    /// The beacon enters an ISD it already left.
    #[error("beacon re-enters ISD {0}")]
    IsdLoop(Isd),
    /// No policy accepts the beacon.
    #[error("beacon rejected by all policies: {0}")]
    AllPolicies(Box<FilterError>),
}

/// Errors of beacon store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BeaconStoreError {
    /// No policy of the requested type is configured.
    #[error("no policy of type {0:?} configured")]
    MissingPolicy(PolicyType),
}

/// In-memory [`BeaconStore`].
#[derive(Debug)]
pub struct MemoryBeaconStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug)]
struct MemoryState {
    policies: HashMap<PolicyType, Policy>,
    beacons: Vec<Beacon>,
}

impl MemoryBeaconStore {
    /// Creates a store with the given policies. Missing policy types get the default
    /// policy.
    pub fn new(policies: impl IntoIterator<Item = Policy>) -> Self {
        let mut map: HashMap<PolicyType, Policy> = [
            PolicyType::Propagation,
            PolicyType::UpRegistration,
            PolicyType::DownRegistration,
            PolicyType::CoreRegistration,
        ]
        .into_iter()
        .map(|t| (t, Policy::with_type(t)))
        .collect();
        for policy in policies {
            map.insert(policy.policy_type, policy);
        }
        Self {
            state: Mutex::new(MemoryState {
                policies: map,
                beacons: Vec::new(),
            }),
        }
    }

    /// Number of stored beacons.
    pub fn len(&self) -> usize {
        self.lock().beacons.len()
    }

    /// Returns true if no beacon is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().beacons.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryBeaconStore {
    fn default() -> Self {
        Self::new([])
    }
}

impl MemoryState {
    // Accepted if at least one policy accepts the beacon; the last rejection otherwise.
    fn filter(&self, beacon: &Beacon) -> Result<(), FilterError> {
        let mut rejection = None;
        for policy in self.policies.values() {
            match policy.filter.apply(beacon) {
                Ok(()) => return Ok(()),
                Err(e) => rejection = Some(e),
            }
        }
        match rejection {
            Some(e) => Err(FilterError::AllPolicies(Box::new(e))),
            None => Ok(()),
        }
    }

    // Shortest accepted beacons first, ties keep insertion order.
    fn select(&self, policy_type: PolicyType) -> Result<Vec<Beacon>, BeaconStoreError> {
        let policy = self
            .policies
            .get(&policy_type)
            .ok_or(BeaconStoreError::MissingPolicy(policy_type))?;
        let mut selected: Vec<Beacon> = self
            .beacons
            .iter()
            .filter(|b| policy.filter.apply(b).is_ok())
            .cloned()
            .collect();
        selected.sort_by_key(|b| b.hops.len());
        selected.truncate(policy.best_set_size);
        Ok(selected)
    }
}

impl BeaconStore for MemoryBeaconStore {
    fn pre_filter(&self, beacon: &Beacon) -> Result<(), FilterError> {
        self.lock().filter(beacon)
    }

    async fn beacons_to_propagate(&self) -> Result<Vec<Beacon>, BeaconStoreError> {
        self.lock().select(PolicyType::Propagation)
    }

    async fn segments_to_register(
        &self,
        segment_type: SegmentType,
    ) -> Result<Vec<Beacon>, BeaconStoreError> {
        self.lock().select(segment_type.into())
    }

    async fn insert_beacon(&self, beacon: Beacon) -> Result<InsertStats, BeaconStoreError> {
        let mut state = self.lock();
        let mut stats = InsertStats::default();
        if let Err(e) = state.filter(&beacon) {
            tracing::debug!(start = %beacon.start_isd_asn(), error = %e, "Beacon filtered");
            stats.filtered = 1;
            return Ok(stats);
        }
        match state.beacons.iter().position(|b| b.key() == beacon.key()) {
            Some(pos) => {
                state.beacons[pos] = beacon;
                stats.updated = 1;
            }
            None => {
                state.beacons.push(beacon);
                stats.inserted = 1;
            }
        }
        Ok(stats)
    }

    async fn update_policy(&self, policy: Policy) -> Result<(), BeaconStoreError> {
        let mut state = self.lock();
        tracing::info!(policy_type = ?policy.policy_type, "Updating beacon policy");
        state.policies.insert(policy.policy_type, policy);

        let beacons = std::mem::take(&mut state.beacons);
        let before = beacons.len();
        let kept: Vec<Beacon> = beacons
            .into_iter()
            .filter(|b| state.filter(b).is_ok())
            .collect();
        if kept.len() < before {
            tracing::debug!(removed = before - kept.len(), "Removed beacons rejected by all policies");
        }
        state.beacons = kept;
        Ok(())
    }

    fn max_exp_time(&self, policy_type: PolicyType) -> u8 {
        self.lock()
            .policies
            .get(&policy_type)
            .map(|p| p.max_exp_time)
            .unwrap_or(u8::MAX)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn beacon(hops: &[&str], ingress: u16) -> Beacon {
        Beacon {
            hops: hops.iter().map(|h| h.parse().unwrap()).collect(),
            ingress,
            segment: Bytes::from_static(b"segment"),
        }
    }

    fn restrictive(policy_type: PolicyType, max_hops_length: usize) -> Policy {
        Policy {
            policy_type,
            filter: Filter {
                max_hops_length,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn filter_rejects_isd_loops() {
        let filter = Filter {
            allow_isd_loop: false,
            ..Default::default()
        };
        let looping = beacon(&["1-ff00:0:110", "2-ff00:0:210", "1-ff00:0:111"], 1);
        assert_eq!(filter.apply(&looping), Err(FilterError::IsdLoop(Isd(1))));

        let straight = beacon(&["1-ff00:0:110", "1-ff00:0:111", "2-ff00:0:210"], 1);
        assert!(filter.apply(&straight).is_ok());

        let blocked = Filter {
            isd_blocklist: vec![2],
            ..Default::default()
        };
        assert_eq!(blocked.apply(&straight), Err(FilterError::BlockedIsd(Isd(2))));
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let policy: Policy =
            serde_json::from_str(r#"{"type": "up_registration", "filter": {"max_hops_length": 4}}"#)
                .unwrap();
        assert_eq!(policy.policy_type, PolicyType::UpRegistration);
        assert_eq!(policy.best_set_size, 20);
        assert_eq!(policy.filter.max_hops_length, 4);
        assert!(policy.filter.allow_isd_loop);
    }

    #[test_log::test(tokio::test)]
    async fn insert_and_select() {
        let store = MemoryBeaconStore::new([Policy {
            best_set_size: 1,
            ..Policy::with_type(PolicyType::UpRegistration)
        }]);

        let long = beacon(&["1-ff00:0:110", "1-ff00:0:111", "1-ff00:0:112"], 1);
        let short = beacon(&["1-ff00:0:110", "1-ff00:0:112"], 2);
        let stats = store.insert_beacon(long.clone()).await.unwrap();
        assert_eq!(stats.inserted, 1);
        store.insert_beacon(short.clone()).await.unwrap();
        let stats = store.insert_beacon(long.clone()).await.unwrap();
        assert_eq!(stats.updated, 1);
        assert_eq!(store.len(), 2);

        let propagate = store.beacons_to_propagate().await.unwrap();
        assert_eq!(propagate, vec![short.clone(), long]);
        let up = store.segments_to_register(SegmentType::Up).await.unwrap();
        assert_eq!(up, vec![short]);
    }

    #[test_log::test(tokio::test)]
    async fn beacons_rejected_by_all_policies_are_filtered() {
        let store = MemoryBeaconStore::new([
            restrictive(PolicyType::Propagation, 2),
            restrictive(PolicyType::UpRegistration, 2),
            restrictive(PolicyType::DownRegistration, 2),
            restrictive(PolicyType::CoreRegistration, 3),
        ]);
        let three = beacon(&["1-ff00:0:110", "1-ff00:0:111", "1-ff00:0:112"], 1);
        assert!(store.pre_filter(&three).is_ok());
        store.insert_beacon(three.clone()).await.unwrap();

        // Tightening the last accepting policy removes the beacon.
        store
            .update_policy(restrictive(PolicyType::CoreRegistration, 2))
            .await
            .unwrap();
        assert!(store.is_empty());
        assert_matches!(store.pre_filter(&three), Err(FilterError::AllPolicies(_)));

        let stats = store.insert_beacon(three).await.unwrap();
        assert_eq!(stats.filtered, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn max_exp_time_per_policy() {
        let store = MemoryBeaconStore::new([Policy {
            max_exp_time: 63,
            ..Policy::with_type(PolicyType::CoreRegistration)
        }]);
        assert_eq!(store.max_exp_time(PolicyType::CoreRegistration), 63);
        assert_eq!(store.max_exp_time(PolicyType::Propagation), u8::MAX);
    }
}
