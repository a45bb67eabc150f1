use std::fmt;
use std::net::{AddrParseError, Ipv4Addr};
use std::num::ParseIntError;
use std::str::FromStr;

use crate::rib::Relationship;

#[derive(Debug)]
pub struct ConfigError {
    pub reason: String,
}

impl ConfigError {
    pub fn new(reason: String) -> Self {
        Self { reason }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConfigError: {}", self.reason)
    }
}

impl std::error::Error for ConfigError {}

/// One neighbor as given on the command line: the localhost UDP port its
/// endpoint listens on, its address in the shared fabric, and our economic
/// relationship with it.
#[derive(Clone, Debug)]
pub struct NeighborSpec {
    pub port: u16,
    pub addr: Ipv4Addr,
    pub relation: Relationship,
}

impl FromStr for NeighborSpec {
    type Err = ConfigError;

    /// Parse the `<port>-<address>-<relation>` form, e.g. `7001-192.168.0.2-cust`
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.splitn(3, '-').collect();
        if parts.len() != 3 {
            return Err(ConfigError::new(format!(
                "Not a valid neighbor definition: '{}'",
                value
            )));
        }
        let port: u16 = parts[0]
            .parse()
            .map_err(|err: ParseIntError| ConfigError::new(format!("{} '{}'", err, parts[0])))?;
        let addr: Ipv4Addr = parts[1]
            .parse()
            .map_err(|err: AddrParseError| ConfigError::new(format!("{} '{}'", err, parts[1])))?;
        let relation = match parts[2] {
            "cust" => Relationship::Customer,
            "peer" => Relationship::Peer,
            "prov" => Relationship::Provider,
            other => {
                return Err(ConfigError::new(format!(
                    "Unsupported relationship: '{}'",
                    other
                )));
            }
        };
        Ok(Self {
            port,
            addr,
            relation,
        })
    }
}

#[derive(Clone, Debug)]
pub struct RouterConfig {
    pub asn: u32,
    pub neighbors: Vec<NeighborSpec>,
}

impl RouterConfig {
    pub fn new(asn: u32, neighbors: Vec<NeighborSpec>) -> Self {
        Self { asn, neighbors }
    }
}
