use std::fmt;

/// Economic relationship with a neighbor, from this router's point of view.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Relationship {
    Customer,
    Peer,
    Provider,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Relationship::Customer => "cust",
            Relationship::Peer => "peer",
            Relationship::Provider => "prov",
        };
        write!(f, "{}", s)
    }
}

/// Whether traffic (or an advertisement) learned from `source` may be sent
/// toward `target`. Customers pay for full reachability, so anything they
/// send or anything destined to them goes through. Peer and provider
/// traffic only transits when a customer is on one end.
pub fn should_propagate(source: Relationship, target: Relationship) -> bool {
    source == Relationship::Customer || target == Relationship::Customer
}
