//! `GET /api/locations` boundary support (spec §6.1, SPEC_FULL "Library
//! entry points"): the static coordinate table, exposed read-only.

use crate::domain::location::{find_by_name, static_locations};
use crate::domain::Location;

/// All locations known to this deployment, in table order.
#[must_use]
pub fn all() -> &'static [Location] {
    static_locations()
}

/// Case-insensitive lookup by display name, as used by the Input node.
#[must_use]
pub fn find(name: &str) -> Option<&'static Location> {
    find_by_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_non_empty_and_find_round_trips_a_name() {
        let locations = all();
        assert!(!locations.is_empty());
        let first = &locations[0];
        let found = find(&first.name).expect("name should resolve");
        assert_eq!(found.id, first.id);
    }

    #[test]
    fn find_is_case_insensitive() {
        assert!(find("tokyo").is_some());
        assert!(find("TOKYO").is_some());
    }

    #[test]
    fn find_returns_none_for_unknown_name() {
        assert!(find("Nowhereville").is_none());
    }
}
