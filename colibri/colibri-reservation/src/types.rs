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

//! Primitive COLIBRI reservation types.

use std::{
    fmt,
    future::Future,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A future that resolves to a Result.
pub trait ResFut<'a, R, E>: Future<Output = Result<R, E>> + Send + 'a {}
impl<'a, R, E, T: Future<Output = Result<R, E>> + Send + 'a> ResFut<'a, R, E> for T {}

/// Errors constructing primitive reservation values from raw integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Index numbers are 4 bit values.
    #[error("invalid index number {0}, must be < {m}", m = IndexNumber::MODULUS)]
    InvalidIndexNumber(u8),
    /// Bandwidth classes are 6 bit values.
    #[error("invalid bandwidth class {0}, maximum is {m}", m = BwCls::MAX.0)]
    InvalidBwCls(u8),
    /// Unknown reservation path type.
    #[error("invalid path type {0}")]
    InvalidPathType(u8),
    /// Reserved bits are set in the path end properties.
    #[error("invalid path end properties {0:#04x}")]
    InvalidPathEndProps(u8),
}

/// Sequence number of an index within a reservation.
///
/// Index numbers live in a 4 bit space and wrap around: `15 + 1 == 0` and
/// `0 - 1 == 15`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct IndexNumber(u8);

impl IndexNumber {
    /// Size of the index number space.
    pub const MODULUS: u8 = 16;
    /// The first valid index number.
    pub const MIN: IndexNumber = IndexNumber(0);
    /// The last valid index number.
    pub const MAX: IndexNumber = IndexNumber(Self::MODULUS - 1);

    /// Creates an index number, failing if the value is outside the 4 bit space.
    pub fn new(value: u8) -> Result<Self, TypeError> {
        if value >= Self::MODULUS {
            return Err(TypeError::InvalidIndexNumber(value));
        }
        Ok(IndexNumber(value))
    }

    /// Creates an index number, reducing the value modulo 16.
    pub const fn new_truncate(value: u8) -> Self {
        IndexNumber(value % Self::MODULUS)
    }

    /// Returns the raw value.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Adds `n` modulo 16.
    pub fn wrapping_add(self, n: u8) -> Self {
        let sum = self.0 as u16 + (n % Self::MODULUS) as u16;
        IndexNumber((sum % Self::MODULUS as u16) as u8)
    }

    /// Subtracts `n` modulo 16.
    pub fn wrapping_sub(self, n: u8) -> Self {
        let diff = self.0 as u16 + Self::MODULUS as u16 - (n % Self::MODULUS) as u16;
        IndexNumber((diff % Self::MODULUS as u16) as u8)
    }
}

impl fmt::Debug for IndexNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for IndexNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for IndexNumber {
    type Error = TypeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        IndexNumber::new(value)
    }
}

/// Coarse expiration time, in units of [`Tick::DURATION`] since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tick(pub u32);

impl Tick {
    /// Duration of one tick.
    pub const DURATION: Duration = Duration::from_secs(4);

    /// Creates a tick from its raw value.
    pub const fn new(value: u32) -> Self {
        Tick(value)
    }

    /// Returns the tick containing `time`. Times before the epoch map to tick zero,
    /// times beyond the representable range saturate.
    pub fn from_time(time: SystemTime) -> Self {
        let secs = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let ticks = secs / Self::DURATION.as_secs();
        Tick(u32::try_from(ticks).unwrap_or(u32::MAX))
    }

    /// Returns the start of this tick.
    pub fn to_time(self) -> SystemTime {
        UNIX_EPOCH + Self::DURATION * self.0
    }

    /// Returns the raw value.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bandwidth class. Class `c > 0` stands for `16 * sqrt(2^(c - 1))` kbps, class 0 for no
/// bandwidth at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BwCls(u8);

impl BwCls {
    /// The largest bandwidth class.
    pub const MAX: BwCls = BwCls(63);

    /// Creates a bandwidth class, failing for classes above [`BwCls::MAX`].
    pub fn new(value: u8) -> Result<Self, TypeError> {
        if value > Self::MAX.0 {
            return Err(TypeError::InvalidBwCls(value));
        }
        Ok(BwCls(value))
    }

    /// Returns the raw value.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Returns the bandwidth of this class in kbps.
    pub fn to_kbps(&self) -> u64 {
        if self.0 == 0 {
            return 0;
        }
        let exponent = (self.0 - 1) as f64 / 2.0;
        (16.0 * 2f64.powf(exponent)) as u64
    }

    /// Returns the smallest class whose bandwidth is at least `kbps`, saturating at
    /// [`BwCls::MAX`].
    pub fn from_kbps(kbps: u64) -> Self {
        (0..=Self::MAX.0)
            .map(BwCls)
            .find(|cls| cls.to_kbps() >= kbps)
            .unwrap_or(Self::MAX)
    }
}

impl TryFrom<u8> for BwCls {
    type Error = TypeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        BwCls::new(value)
    }
}

impl From<BwCls> for u8 {
    fn from(value: BwCls) -> Self {
        value.0
    }
}

/// Renewal lifetime class, bounding how long a grant may be renewed without re-negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rlc(pub u8);

/// Traffic split class between control and data plane traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplitCls(pub u8);

/// The kind of path a reservation is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PathType {
    /// Not yet known.
    #[default]
    Unknown = 0,
    /// Down segment.
    Down = 1,
    /// Up segment.
    Up = 2,
    /// Down segment ending in a peering link.
    PeeringDown = 3,
    /// Up segment starting in a peering link.
    PeeringUp = 4,
    /// End-to-end path.
    E2E = 5,
    /// Core segment.
    Core = 6,
}

impl TryFrom<u8> for PathType {
    type Error = TypeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let path_type = match value {
            0 => PathType::Unknown,
            1 => PathType::Down,
            2 => PathType::Up,
            3 => PathType::PeeringDown,
            4 => PathType::PeeringUp,
            5 => PathType::E2E,
            6 => PathType::Core,
            other => return Err(TypeError::InvalidPathType(other)),
        };
        Ok(path_type)
    }
}

impl From<PathType> for u8 {
    fn from(value: PathType) -> Self {
        value as u8
    }
}

bitflags::bitflags! {
    /// Stitching properties of the two ends of a segment reservation.
    ///
    /// The high nibble describes the start of the path, the low nibble its end.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PathEndProps: u8 {
        /// The path ends in this AS; end hosts may use it directly.
        const END_LOCAL = 0x01;
        /// The path end may be stitched to another segment.
        const END_TRANSFER = 0x02;
        /// The path starts in this AS; end hosts may use it directly.
        const START_LOCAL = 0x10;
        /// The path start may be stitched to another segment.
        const START_TRANSFER = 0x20;
    }
}

impl PathEndProps {
    /// Fails if any reserved bit is set.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.bits() & !Self::all().bits() != 0 {
            return Err(TypeError::InvalidPathEndProps(self.bits()));
        }
        Ok(())
    }
}
