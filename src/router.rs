use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use log::{debug, info, trace, warn};
use serde_json::json;

use crate::config::RouterConfig;
use crate::message::{Envelope, Payload, PrefixSpec, RouteAdvertisement, TableEntry};
use crate::prefix::{Prefix, PrefixError};
use crate::rib::{best_route, should_propagate, PathAttributes, Relationship, Rib, Route};
use crate::session::Endpoints;

#[derive(Debug)]
pub enum RouterError {
    /// A message payload failed validation. [reason]
    Format(String),
    /// The message type is not part of the protocol.
    UnknownMessage,
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use RouterError::*;
        match self {
            Format(reason) => write!(f, "Malformed message [{}]", reason),
            UnknownMessage => write!(f, "Unknown message type"),
        }
    }
}

impl From<PrefixError> for RouterError {
    fn from(error: PrefixError) -> Self {
        RouterError::Format(error.reason)
    }
}

impl std::error::Error for RouterError {}

/// A message ready to leave through the endpoint facing `to`.
#[derive(Clone, Debug, PartialEq)]
pub struct Outbound {
    pub to: Ipv4Addr,
    pub message: Envelope,
}

/// Our own address on the link toward a neighbor: the neighbor's network
/// with a host part of .1.
fn local_addr(neighbor: Ipv4Addr) -> Ipv4Addr {
    let [a, b, c, _] = neighbor.octets();
    Ipv4Addr::new(a, b, c, 1)
}

/// The protocol engine. Consumes inbound messages one at a time and answers
/// with the messages to send, so every behavior is testable without sockets.
pub struct Router {
    asn: u32,
    neighbors: BTreeMap<Ipv4Addr, Relationship>,
    rib: Rib,
}

impl Router {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            asn: config.asn,
            neighbors: config
                .neighbors
                .iter()
                .map(|neighbor| (neighbor.addr, neighbor.relation))
                .collect(),
            rib: Rib::new(),
        }
    }

    fn relation(&self, addr: Ipv4Addr) -> Option<Relationship> {
        self.neighbors.get(&addr).copied()
    }

    /// Startup burst greeting every neighbor so they learn our address.
    pub fn handshakes(&self) -> Vec<Outbound> {
        self.neighbors
            .keys()
            .map(|&addr| Outbound {
                to: addr,
                message: Envelope {
                    src: local_addr(addr),
                    dst: addr,
                    payload: Payload::Handshake(json!({})),
                },
            })
            .collect()
    }

    /// Process one message received through the endpoint facing `from`. The
    /// claimed src field is never trusted for identifying the sender.
    pub fn handle(
        &mut self,
        from: Ipv4Addr,
        envelope: Envelope,
    ) -> Result<Vec<Outbound>, RouterError> {
        match envelope.payload {
            Payload::Update(advertisement) => self.handle_update(from, advertisement),
            Payload::Withdraw(withdrawn) => self.handle_withdraw(from, withdrawn),
            Payload::Data(_) => self.handle_data(from, envelope),
            Payload::Dump(_) => Ok(self.handle_dump(from, envelope)),
            Payload::Table(_) | Payload::NoRoute(_) | Payload::Handshake(_) => {
                debug!("[{}] Ignoring {} message", from, envelope.payload.kind());
                Ok(Vec::new())
            }
            Payload::Unknown => Err(RouterError::UnknownMessage),
        }
    }

    fn handle_update(
        &mut self,
        from: Ipv4Addr,
        advertisement: RouteAdvertisement,
    ) -> Result<Vec<Outbound>, RouterError> {
        let prefix = Prefix::with_netmask(advertisement.network, advertisement.netmask)?;
        debug!("[{}] Update for {}", from, prefix);
        let attributes = PathAttributes::from_advertisement(&advertisement);
        self.rib.insert(Route::new(prefix, from, attributes));

        // Re-advertisements carry only the network, netmask, and AS path
        // with our own ASN prepended; the other attributes stay local.
        let mut as_path = Vec::with_capacity(advertisement.as_path.len() + 1);
        as_path.push(self.asn);
        as_path.extend(&advertisement.as_path);
        let stripped = RouteAdvertisement {
            network: advertisement.network,
            netmask: advertisement.netmask,
            as_path,
            localpref: None,
            self_origin: None,
            origin: None,
        };
        Ok(self.fan_out(from, Payload::Update(stripped)))
    }

    fn handle_withdraw(
        &mut self,
        from: Ipv4Addr,
        withdrawn: Vec<PrefixSpec>,
    ) -> Result<Vec<Outbound>, RouterError> {
        // Validate the whole list before touching the table
        let mut prefixes = Vec::with_capacity(withdrawn.len());
        for spec in &withdrawn {
            prefixes.push(Prefix::with_netmask(spec.network, spec.netmask)?);
        }
        for prefix in prefixes {
            if self.rib.withdraw(from, prefix) {
                debug!("[{}] Withdrew {}", from, prefix);
            } else {
                debug!("[{}] Withdraw for unknown route {}", from, prefix);
            }
        }
        Ok(self.fan_out(from, Payload::Withdraw(withdrawn)))
    }

    fn handle_data(
        &self,
        from: Ipv4Addr,
        envelope: Envelope,
    ) -> Result<Vec<Outbound>, RouterError> {
        let next_hop = match best_route(self.rib.routes(), envelope.dst) {
            Some(route) => {
                let allowed = match (self.relation(from), self.relation(route.peer)) {
                    (Some(source), Some(learned)) => should_propagate(source, learned),
                    _ => false,
                };
                if allowed {
                    Some(route.peer)
                } else {
                    debug!(
                        "[{}] Transit toward {} via {} not permitted",
                        from, envelope.dst, route.peer
                    );
                    None
                }
            }
            None => {
                debug!("[{}] No route toward {}", from, envelope.dst);
                None
            }
        };
        let outbound = match next_hop {
            // Data is forwarded untouched, claimed src and dst included
            Some(next_hop) => Outbound {
                to: next_hop,
                message: envelope,
            },
            None => Outbound {
                to: from,
                message: Envelope {
                    src: local_addr(from),
                    dst: envelope.src,
                    payload: Payload::NoRoute(json!({})),
                },
            },
        };
        Ok(vec![outbound])
    }

    fn handle_dump(&self, from: Ipv4Addr, envelope: Envelope) -> Vec<Outbound> {
        let table: Vec<TableEntry> = self
            .rib
            .routes()
            .map(|route| route.table_entry())
            .collect();
        debug!("[{}] Table dump with {} entries", from, table.len());
        vec![Outbound {
            to: from,
            message: Envelope {
                // The reply mirrors the request with src and dst swapped
                src: envelope.dst,
                dst: envelope.src,
                payload: Payload::Table(table),
            },
        }]
    }

    /// Relay a payload to every neighbor the relationship economics allow:
    /// customer-learned news goes to everyone, peer- and provider-learned
    /// news only to customers. The sender itself is always excluded.
    fn fan_out(&self, from: Ipv4Addr, payload: Payload) -> Vec<Outbound> {
        let source = match self.relation(from) {
            Some(relation) => relation,
            None => return Vec::new(),
        };
        self.neighbors
            .iter()
            .filter(|&(&addr, _)| addr != from)
            .filter(|&(_, &target)| should_propagate(source, target))
            .map(|(&addr, _)| Outbound {
                to: addr,
                message: Envelope {
                    src: local_addr(addr),
                    dst: addr,
                    payload: payload.clone(),
                },
            })
            .collect()
    }

    /// Serve messages until every neighbor endpoint is gone.
    pub async fn run(&mut self, endpoints: &mut Endpoints) {
        for outbound in self.handshakes() {
            endpoints.send(outbound.to, outbound.message).await;
        }
        while let Some((from, envelope)) = endpoints.recv().await {
            trace!("[{}] Incoming: {}", from, envelope.payload.kind());
            match self.handle(from, envelope) {
                Ok(replies) => {
                    for outbound in replies {
                        endpoints.send(outbound.to, outbound.message).await;
                    }
                }
                Err(err) => warn!("[{}] {}", from, err),
            }
        }
        info!("All neighbor endpoints unreachable, shutting down");
    }
}
