use std::fmt;
use std::net::{AddrParseError, Ipv4Addr};
use std::num::ParseIntError;
use std::str::FromStr;

#[derive(Debug)]
pub struct PrefixError {
    pub reason: String,
}

impl PrefixError {
    pub fn new(reason: String) -> Self {
        Self { reason }
    }
}

impl fmt::Display for PrefixError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PrefixError: {}", self.reason)
    }
}

impl std::error::Error for PrefixError {}

fn mask(length: u8) -> u32 {
    // Shifting a u32 by 32 is undefined, so /0 short-circuits
    if length == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(length))
    }
}

/// An IPv4 network plus mask length. The network is stored masked, so bits
/// beyond the mask length are always zero.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Prefix {
    network: u32,
    length: u8,
}

impl Prefix {
    pub fn new(network: Ipv4Addr, length: u8) -> Result<Self, PrefixError> {
        if length > 32 {
            return Err(PrefixError::new(format!(
                "Mask length out of range: {}",
                length
            )));
        }
        Ok(Self {
            network: u32::from(network) & mask(length),
            length,
        })
    }

    /// Build a prefix from the wire form, a network plus dotted-quad netmask.
    pub fn with_netmask(network: Ipv4Addr, netmask: Ipv4Addr) -> Result<Self, PrefixError> {
        let bits = u32::from(netmask);
        let length = bits.count_ones() as u8;
        if mask(length) != bits {
            return Err(PrefixError::new(format!(
                "Not a contiguous netmask: '{}'",
                netmask
            )));
        }
        Prefix::new(network, length)
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(mask(self.length))
    }

    pub fn length(&self) -> u8 {
        self.length
    }

    /// True when the address falls inside this prefix.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & mask(self.length) == self.network
    }

    /// CIDR pair merge: two prefixes of equal length that differ only in
    /// their lowest masked bit collapse into the one-bit-shorter prefix
    /// covering both. Anything else is not mergeable.
    pub fn merge_with(&self, other: &Prefix) -> Option<Prefix> {
        if self.length == 0 || self.length != other.length {
            return None;
        }
        if self.network ^ other.network != 1 << (32 - u32::from(self.length)) {
            return None;
        }
        Some(Prefix {
            network: self.network & mask(self.length - 1),
            length: self.length - 1,
        })
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.length)
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for Prefix {
    type Err = PrefixError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (addr, length) = match value.find('/') {
            Some(i) => (&value[..i], &value[i + 1..]),
            None => {
                return Err(PrefixError::new(format!("Not a valid prefix: '{}'", value)));
            }
        };
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|err: AddrParseError| PrefixError::new(format!("{} '{}'", err, value)))?;
        let length: u8 = length
            .parse()
            .map_err(|err: ParseIntError| PrefixError::new(format!("{} '{}'", err, value)))?;
        Prefix::new(addr, length)
    }
}
