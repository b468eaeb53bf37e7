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

//! SCION domain identifiers used by reservations.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// ISD (Isolation Domain) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Isd(pub u16);

impl Isd {
    /// Creates a new ISD from the given u16 value.
    pub fn new(value: u16) -> Self {
        Isd(value)
    }

    /// Returns the u16 value of the ISD.
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Isd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ASN (Autonomous System Number) identifier.
/// Maximum size is 48 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Asn(u64);

impl Asn {
    /// Number of bits of an ASN.
    pub const BITS: u32 = 48;
    /// Largest valid ASN.
    pub const MAX: Asn = Asn((1 << Self::BITS) - 1);
    /// Number of bytes used to encode an ASN on the wire.
    pub const ENCODED_LEN: usize = 6;

    // ASNs up to this value are BGP ASNs and rendered in decimal.
    const MAX_BGP: u64 = u32::MAX as u64;

    /// Creates a new ASN from the given u64 value.
    ///
    /// Will truncate to 48 bits.
    pub const fn new(value: u64) -> Self {
        Asn(value & Self::MAX.0)
    }

    /// Returns the value of the ASN as u64.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns the 6 byte big-endian encoding of the ASN.
    pub fn to_be_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let full = self.0.to_be_bytes();
        let mut out = [0u8; Self::ENCODED_LEN];
        out.copy_from_slice(&full[2..]);
        out
    }

    /// Reads an ASN from its 6 byte big-endian encoding.
    pub fn from_be_bytes(bytes: [u8; Self::ENCODED_LEN]) -> Self {
        let mut full = [0u8; 8];
        full[2..].copy_from_slice(&bytes);
        Asn(u64::from_be_bytes(full))
    }
}

impl fmt::Display for Asn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 <= Self::MAX_BGP {
            return write!(f, "{}", self.0);
        }
        write!(
            f,
            "{:x}:{:x}:{:x}",
            (self.0 >> 32) & 0xffff,
            (self.0 >> 16) & 0xffff,
            self.0 & 0xffff
        )
    }
}

impl FromStr for Asn {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.contains(':') {
            let value: u64 = s
                .parse()
                .map_err(|_| AddressParseError::InvalidAsn(s.to_string()))?;
            if value > Self::MAX_BGP {
                return Err(AddressParseError::InvalidAsn(s.to_string()));
            }
            return Ok(Asn(value));
        }

        let groups: Vec<&str> = s.split(':').collect();
        if groups.len() != 3 {
            return Err(AddressParseError::InvalidAsn(s.to_string()));
        }
        let mut value = 0u64;
        for group in groups {
            let part = u16::from_str_radix(group, 16)
                .map_err(|_| AddressParseError::InvalidAsn(s.to_string()))?;
            value = (value << 16) | part as u64;
        }
        Ok(Asn(value))
    }
}

/// ISD-AS identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct IsdAsn(pub u64);

impl IsdAsn {
    /// The wildcard ISD-AS, used where no domain is known.
    pub const WILDCARD: IsdAsn = IsdAsn(0);

    /// Creates a new ISD-AS identifier from the given ISD and ASN.
    pub fn new(isd: Isd, asn: Asn) -> Self {
        IsdAsn(((isd.0 as u64) << Asn::BITS) | asn.0)
    }

    /// Returns the value of the ISD-AS identifier as u64.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns the ISD part of the ISD-AS identifier.
    pub fn isd(&self) -> Isd {
        Isd((self.0 >> Asn::BITS) as u16)
    }

    /// Returns the ASN part of the ISD-AS identifier.
    pub fn asn(&self) -> Asn {
        Asn::new(self.0)
    }

    /// Returns the 8 byte big-endian encoding.
    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Debug for IsdAsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for IsdAsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.isd(), self.asn())
    }
}

impl FromStr for IsdAsn {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (isd, asn) = s
            .split_once('-')
            .ok_or_else(|| AddressParseError::InvalidIsdAsn(s.to_string()))?;
        let isd: u16 = isd
            .parse()
            .map_err(|_| AddressParseError::InvalidIsdAsn(s.to_string()))?;
        Ok(IsdAsn::new(Isd(isd), asn.parse()?))
    }
}

/// Errors parsing textual domain identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    /// The ASN is not in decimal or `ffff:ffff:ffff` notation.
    #[error("invalid AS number: {0}")]
    InvalidAsn(String),
    /// The ISD-AS is not in `<isd>-<asn>` notation.
    #[error("invalid ISD-AS: {0}")]
    InvalidIsdAsn(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_and_display_scion_asn() {
        let ia: IsdAsn = "1-ff00:0:110".parse().unwrap();
        assert_eq!(ia.isd(), Isd(1));
        assert_eq!(ia.asn().value(), 0xff00_0000_0110);
        assert_eq!(ia.to_string(), "1-ff00:0:110");
    }

    #[test]
    fn should_parse_and_display_bgp_asn() {
        let ia: IsdAsn = "64-559".parse().unwrap();
        assert_eq!(ia.asn().value(), 559);
        assert_eq!(ia.to_string(), "64-559");
    }

    #[test]
    fn should_reject_malformed_asn() {
        assert!("ff00:0".parse::<Asn>().is_err());
        assert!("4294967296".parse::<Asn>().is_err());
        assert!("1_ff00:0:110".parse::<IsdAsn>().is_err());
    }

    #[test]
    fn asn_bytes_roundtrip() {
        let asn = Asn::new(0xff00_0000_0110);
        assert_eq!(asn.to_be_bytes(), [0xff, 0x00, 0x00, 0x00, 0x01, 0x10]);
        assert_eq!(Asn::from_be_bytes(asn.to_be_bytes()), asn);
    }
}
