mod bestpath;
mod policy;

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use log::trace;

pub use bestpath::best_route;
pub use policy::{should_propagate, Relationship};

use crate::message::{Origin, RouteAdvertisement, TableEntry};
use crate::prefix::Prefix;

pub const DEFAULT_LOCAL_PREF: u32 = 100;

/// Attributes carried with an advertisement. Two routes only aggregate when
/// every one of these is equal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathAttributes {
    pub local_pref: u32,
    pub self_origin: bool,
    pub as_path: Vec<u32>,
    pub origin: Origin,
}

impl PathAttributes {
    /// Fill in the defaults for attributes a stripped update leaves out.
    pub fn from_advertisement(advertisement: &RouteAdvertisement) -> Self {
        Self {
            local_pref: advertisement.localpref.unwrap_or(DEFAULT_LOCAL_PREF),
            self_origin: advertisement.self_origin.unwrap_or(false),
            as_path: advertisement.as_path.clone(),
            origin: advertisement.origin.unwrap_or(Origin::Unk),
        }
    }
}

/// A prefix learned from (and forwarded through) a single neighbor.
/// Aggregates keep the neighbor of the leaves they cover, so the next hop
/// never mixes neighbors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Route {
    pub prefix: Prefix,
    pub peer: Ipv4Addr,
    pub attributes: PathAttributes,
}

impl Route {
    pub fn new(prefix: Prefix, peer: Ipv4Addr, attributes: PathAttributes) -> Self {
        Self {
            prefix,
            peer,
            attributes,
        }
    }

    pub fn table_entry(&self) -> TableEntry {
        TableEntry {
            network: self.prefix.network(),
            netmask: self.prefix.netmask(),
            peer: self.peer,
            localpref: self.attributes.local_pref,
            as_path: self.attributes.as_path.clone(),
            self_origin: self.attributes.self_origin,
            origin: self.attributes.origin,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<Route {} via {} localpref={} path={:?} origin={} selfOrigin={}>",
            self.prefix,
            self.peer,
            self.attributes.local_pref,
            self.attributes.as_path,
            self.attributes.origin,
            self.attributes.self_origin,
        )
    }
}

/// Routing table. Announced routes are retained as-is in `learned`, one per
/// (prefix, peer); `aggregated` is the view derived from them and is what
/// forwarding and dumps operate on. Rebuilding a peer's slice of the view
/// from its retained leaves is also how withdraws disaggregate.
#[derive(Debug, Default)]
pub struct Rib {
    learned: BTreeMap<(Prefix, Ipv4Addr), Route>,
    aggregated: BTreeMap<(Prefix, Ipv4Addr), Route>,
}

impl Rib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregated routes, ordered by (prefix, peer).
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.aggregated.values()
    }

    /// Add a route, replacing any previous one for the same (prefix, peer).
    pub fn insert(&mut self, route: Route) {
        let peer = route.peer;
        trace!("Learned {}", route);
        if let Some(replaced) = self.learned.insert((route.prefix, route.peer), route) {
            trace!("Replaced previous {}", replaced);
        }
        self.rebuild_peer(peer);
    }

    /// Remove the exact (prefix, peer) route if present. Returns whether
    /// anything was removed; withdrawing an unknown route is a no-op.
    pub fn withdraw(&mut self, peer: Ipv4Addr, prefix: Prefix) -> bool {
        match self.learned.remove(&(prefix, peer)) {
            Some(route) => {
                trace!("Withdrew {}", route);
                self.rebuild_peer(peer);
                true
            }
            None => false,
        }
    }

    fn rebuild_peer(&mut self, peer: Ipv4Addr) {
        self.aggregated
            .retain(|&(_, entry_peer), _| entry_peer != peer);
        let leaves: Vec<Route> = self
            .learned
            .values()
            .filter(|route| route.peer == peer)
            .cloned()
            .collect();
        for route in aggregate(leaves) {
            self.aggregated.insert((route.prefix, route.peer), route);
        }
    }
}

/// Collapse sibling prefixes with identical attributes until no pair is
/// left, e.g. four adjacent /24s become one /22. Merge candidates carry
/// equal attributes, so the fixpoint is the same whatever the visit order.
/// Routes from different peers never merge.
fn aggregate(mut routes: Vec<Route>) -> Vec<Route> {
    'scan: loop {
        for i in 0..routes.len() {
            for j in (i + 1)..routes.len() {
                if routes[i].peer != routes[j].peer
                    || routes[i].attributes != routes[j].attributes
                {
                    continue;
                }
                if let Some(prefix) = routes[i].prefix.merge_with(&routes[j].prefix) {
                    // j > i, remove j first so i stays in place
                    let absorbed = routes.swap_remove(j);
                    let mut merged = routes.swap_remove(i);
                    trace!(
                        "Aggregated {} and {} into {}",
                        merged.prefix,
                        absorbed.prefix,
                        prefix
                    );
                    merged.prefix = prefix;
                    routes.push(merged);
                    continue 'scan;
                }
            }
        }
        return routes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    fn attributes() -> PathAttributes {
        PathAttributes {
            local_pref: DEFAULT_LOCAL_PREF,
            self_origin: false,
            as_path: vec![2],
            origin: Origin::Unk,
        }
    }

    fn route(prefix: &str, peer: &str) -> Route {
        Route::new(prefix.parse().unwrap(), peer.parse().unwrap(), attributes())
    }

    fn prefixes(rib: &Rib) -> Vec<Prefix> {
        rib.routes().map(|route| route.prefix).collect()
    }

    fn parsed(values: &[&str]) -> Vec<Prefix> {
        values.iter().map(|value| value.parse().unwrap()).collect()
    }

    #[test]
    fn test_insert_replaces_same_prefix_and_peer() {
        let mut rib = Rib::new();
        rib.insert(route("10.0.0.0/8", "192.168.0.2"));

        let mut updated = route("10.0.0.0/8", "192.168.0.2");
        updated.attributes.local_pref = 200;
        rib.insert(updated);

        let routes: Vec<&Route> = rib.routes().collect();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].attributes.local_pref, 200);
    }

    #[test]
    fn test_same_prefix_from_two_peers_coexists() {
        let mut rib = Rib::new();
        rib.insert(route("10.0.0.0/8", "192.168.0.2"));
        rib.insert(route("10.0.0.0/8", "172.16.0.2"));
        assert_eq!(rib.routes().count(), 2);
    }

    #[test]
    fn test_sibling_pair_aggregates() {
        let mut rib = Rib::new();
        rib.insert(route("192.168.2.0/24", "192.168.0.2"));
        rib.insert(route("192.168.3.0/24", "192.168.0.2"));

        let routes: Vec<&Route> = rib.routes().collect();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].prefix, "192.168.2.0/23".parse().unwrap());
        // The aggregate still points at the advertising neighbor
        assert_eq!(routes[0].peer, "192.168.0.2".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn test_aggregation_cascades_to_fixpoint() {
        let mut rib = Rib::new();
        for prefix in ["10.0.0.0/24", "10.0.1.0/24", "10.0.2.0/24", "10.0.3.0/24"] {
            rib.insert(route(prefix, "192.168.0.2"));
        }
        assert_eq!(prefixes(&rib), parsed(&["10.0.0.0/22"]));
    }

    #[test]
    fn test_differing_attributes_do_not_aggregate() {
        let mut rib = Rib::new();
        rib.insert(route("10.0.0.0/24", "192.168.0.2"));
        let mut other = route("10.0.1.0/24", "192.168.0.2");
        other.attributes.as_path = vec![2, 7];
        rib.insert(other);
        assert_eq!(rib.routes().count(), 2);
    }

    #[test]
    fn test_different_peers_do_not_aggregate() {
        let mut rib = Rib::new();
        rib.insert(route("10.0.0.0/24", "192.168.0.2"));
        rib.insert(route("10.0.1.0/24", "172.16.0.2"));
        assert_eq!(prefixes(&rib), parsed(&["10.0.0.0/24", "10.0.1.0/24"]));
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let routes = vec![
            route("10.0.0.0/24", "192.168.0.2"),
            route("10.0.1.0/24", "192.168.0.2"),
            route("10.0.2.0/24", "192.168.0.2"),
        ];
        let once = aggregate(routes);
        let twice = aggregate(once.clone());
        let sort = |mut v: Vec<Route>| {
            v.sort_by_key(|route| route.prefix);
            v
        };
        assert_eq!(sort(once), sort(twice));
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let routes = vec![
            route("10.0.0.0/24", "192.168.0.2"),
            route("10.0.1.0/24", "192.168.0.2"),
            route("10.0.2.0/24", "192.168.0.2"),
            route("10.0.3.0/24", "192.168.0.2"),
            route("192.168.2.0/24", "192.168.0.2"),
        ];
        let expected: Vec<Prefix> = {
            let mut result: Vec<Prefix> = aggregate(routes.clone())
                .into_iter()
                .map(|route| route.prefix)
                .collect();
            result.sort();
            result
        };
        assert_eq!(expected, parsed(&["10.0.0.0/22", "192.168.2.0/24"]));

        for permutation in routes.iter().cloned().permutations(routes.len()) {
            let mut result: Vec<Prefix> = aggregate(permutation)
                .into_iter()
                .map(|route| route.prefix)
                .collect();
            result.sort();
            assert_eq!(result, expected);
        }
    }

    #[test]
    fn test_withdraw_disaggregates_from_retained_leaves() {
        let advertised = ["10.0.0.0/24", "10.0.1.0/24", "10.0.2.0/24", "10.0.3.0/24"];
        let mut rib = Rib::new();
        for prefix in advertised {
            rib.insert(route(prefix, "192.168.0.2"));
        }
        assert_eq!(prefixes(&rib), parsed(&["10.0.0.0/22"]));

        assert!(rib.withdraw(
            "192.168.0.2".parse().unwrap(),
            "10.0.1.0/24".parse().unwrap()
        ));

        // Equivalent to never having heard the withdrawn leaf at all
        let mut replayed = Rib::new();
        for prefix in advertised.iter().copied().filter(|p| *p != "10.0.1.0/24") {
            replayed.insert(route(prefix, "192.168.0.2"));
        }
        assert_eq!(
            rib.routes().collect::<Vec<_>>(),
            replayed.routes().collect::<Vec<_>>()
        );
        assert_eq!(prefixes(&rib), parsed(&["10.0.0.0/24", "10.0.2.0/23"]));
    }

    #[test]
    fn test_withdraw_unknown_route_is_a_noop() {
        let mut rib = Rib::new();
        rib.insert(route("10.0.0.0/8", "192.168.0.2"));

        // Wrong peer
        assert!(!rib.withdraw(
            "172.16.0.2".parse().unwrap(),
            "10.0.0.0/8".parse().unwrap()
        ));
        // Never announced, only covered by the /8
        assert!(!rib.withdraw(
            "192.168.0.2".parse().unwrap(),
            "10.1.0.0/16".parse().unwrap()
        ));
        assert_eq!(rib.routes().count(), 1);
    }

    #[test]
    fn test_withdraw_of_aggregate_prefix_is_a_noop() {
        let mut rib = Rib::new();
        rib.insert(route("10.0.0.0/24", "192.168.0.2"));
        rib.insert(route("10.0.1.0/24", "192.168.0.2"));
        assert_eq!(prefixes(&rib), parsed(&["10.0.0.0/23"]));

        // The /23 only exists as an aggregate, never announced as a leaf
        assert!(!rib.withdraw(
            "192.168.0.2".parse().unwrap(),
            "10.0.0.0/23".parse().unwrap()
        ));
        assert_eq!(prefixes(&rib), parsed(&["10.0.0.0/23"]));
    }

    #[test]
    fn test_update_replacing_leaf_splits_aggregate() {
        let mut rib = Rib::new();
        rib.insert(route("10.0.0.0/24", "192.168.0.2"));
        rib.insert(route("10.0.1.0/24", "192.168.0.2"));
        assert_eq!(prefixes(&rib), parsed(&["10.0.0.0/23"]));

        // Re-announcing one leaf with new attributes breaks the pair apart
        let mut changed = route("10.0.1.0/24", "192.168.0.2");
        changed.attributes.local_pref = 200;
        rib.insert(changed);
        assert_eq!(prefixes(&rib), parsed(&["10.0.0.0/24", "10.0.1.0/24"]));
    }
}
