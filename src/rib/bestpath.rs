use std::net::Ipv4Addr;

use itertools::Itertools;
use log::error;

use super::Route;

/// Select the route used to forward toward `dest`, or None if no prefix
/// covers it. Longest prefix match first, then ties fall through a fixed
/// ladder of attribute comparisons.
pub fn best_route<'a, I>(routes: I, dest: Ipv4Addr) -> Option<&'a Route>
where
    I: IntoIterator<Item = &'a Route>,
{
    let matching: Vec<&Route> = routes
        .into_iter()
        .filter(|route| route.prefix.contains(dest))
        .collect();

    // Only the most specific prefixes are candidates.
    let candidates = matching.into_iter().max_set_by_key(|r| r.prefix.length());

    // Highest local preference wins.
    let candidates = candidates
        .into_iter()
        .max_set_by_key(|r| r.attributes.local_pref);

    // Prefer routes the neighbor itself originated.
    let candidates = candidates
        .into_iter()
        .max_set_by_key(|r| r.attributes.self_origin);

    // Prefer the shortest AS path.
    let candidates = candidates
        .into_iter()
        .min_set_by_key(|r| r.attributes.as_path.len());

    // Prefer IGP origins over EGP over unknown.
    let candidates = candidates.into_iter().min_set_by_key(|r| r.attributes.origin);

    // Final tie break, the lowest neighbor address.
    let candidates = candidates.into_iter().min_set_by_key(|r| u32::from(r.peer));

    if candidates.len() > 1 {
        // One route per (prefix, peer) means the ladder cannot leave two
        // candidates standing; seeing this means the table is corrupt.
        debug_assert!(false, "ambiguous best route for {}", dest);
        error!(
            "Ambiguous best route for {}, falling back to first candidate",
            dest
        );
    }
    candidates.into_iter().next()
}
