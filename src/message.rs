use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One protocol message as carried in a single datagram.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Envelope {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    #[serde(flatten)]
    pub payload: Payload,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", content = "msg", rename_all = "lowercase")]
pub enum Payload {
    Update(RouteAdvertisement),
    Withdraw(Vec<PrefixSpec>),
    Data(Value),
    Dump(Value),
    Table(Vec<TableEntry>),
    #[serde(rename = "no route")]
    NoRoute(Value),
    Handshake(Value),
    #[serde(other, deserialize_with = "ignore_contents")]
    Unknown,
}

/// Discards the `msg` body of an unrecognized message type; without this the
/// unit `Unknown` variant only accepts a missing or null body, and any other
/// content turns the datagram into a parse error instead of `Unknown`.
fn ignore_contents<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde::de::IgnoredAny::deserialize(deserializer).map(|_| ())
}

impl Payload {
    /// Wire tag for this payload, as spelled in the "type" field.
    pub fn kind(&self) -> &'static str {
        use Payload::*;
        match self {
            Update(_) => "update",
            Withdraw(_) => "withdraw",
            Data(_) => "data",
            Dump(_) => "dump",
            Table(_) => "table",
            NoRoute(_) => "no route",
            Handshake(_) => "handshake",
            Unknown => "unknown",
        }
    }
}

/// Update payload. Private attributes are optional on the wire since
/// re-advertised updates carry only the network, netmask, and AS path.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RouteAdvertisement {
    pub network: Ipv4Addr,
    pub netmask: Ipv4Addr,
    #[serde(rename = "ASPath")]
    pub as_path: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localpref: Option<u32>,
    #[serde(rename = "selfOrigin", default, skip_serializing_if = "Option::is_none")]
    pub self_origin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

/// A single network/netmask pair from a withdraw payload.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PrefixSpec {
    pub network: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

/// One row of a table payload, the answer to a dump.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TableEntry {
    pub network: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub peer: Ipv4Addr,
    pub localpref: u32,
    #[serde(rename = "ASPath")]
    pub as_path: Vec<u32>,
    #[serde(rename = "selfOrigin")]
    pub self_origin: bool,
    pub origin: Origin,
}

/// Route origin. Declaration order is preference order, IGP first.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Origin {
    #[serde(rename = "IGP")]
    Igp,
    #[serde(rename = "EGP")]
    Egp,
    #[serde(rename = "UNK")]
    Unk,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Origin::Igp => "IGP",
            Origin::Egp => "EGP",
            Origin::Unk => "UNK",
        };
        write!(f, "{}", s)
    }
}
