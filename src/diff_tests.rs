// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the diff engine.

#[cfg(test)]
mod tests {
    use crate::diff::*;
    use crate::records::{
        parse_zone_name, DesiredState, ManagedRecord, NetworkServer, ObservedState,
    };
    use hickory_proto::rr::Name;
    use std::str::FromStr;

    fn zone() -> Name {
        parse_zone_name("internal.example.com").unwrap()
    }

    fn record(host: &str, ip: &str) -> ManagedRecord {
        record_ttl(host, ip, 600)
    }

    fn record_ttl(host: &str, ip: &str, ttl: u32) -> ManagedRecord {
        let name = if host.ends_with('.') {
            Name::from_str(host).unwrap()
        } else {
            Name::from_str(&format!("{host}.internal.example.com.")).unwrap()
        };
        ManagedRecord::new(name, ip.parse().unwrap(), ttl)
    }

    fn desired(records: &[ManagedRecord]) -> DesiredState {
        records.iter().cloned().collect()
    }

    fn observed(records: &[ManagedRecord]) -> ObservedState {
        ObservedState::new(&zone(), records.iter().cloned())
    }

    /// Apply a change set to an observed state the way the server would.
    fn apply(state: &ObservedState, change_set: &ChangeSet) -> ObservedState {
        let mut records: Vec<ManagedRecord> = state
            .rrsets()
            .flat_map(|(_, values)| values.iter().cloned())
            .collect();
        for change in change_set.operations() {
            match change {
                Change::Remove(r) => records.retain(|existing| existing != r),
                Change::Add(r) => records.push(r.clone()),
            }
        }
        observed(&records)
    }

    #[test]
    fn test_identical_states_produce_no_changes() {
        let records = [record("web1", "10.0.0.5"), record("db1", "fd00::7")];
        let change_set = diff(&desired(&records), &observed(&records));
        assert!(change_set.is_empty());
        assert_eq!(change_set.unchanged(), 2);
    }

    #[test]
    fn test_first_run_on_empty_zone_adds_everything() {
        let change_set = diff(
            &desired(&[record("web1", "10.0.0.5"), record("web2", "10.0.0.6")]),
            &observed(&[]),
        );
        assert_eq!(change_set.additions().count(), 2);
        assert_eq!(change_set.removals().count(), 0);
        assert_eq!(
            change_set.operations(),
            &[
                Change::Add(record("web1", "10.0.0.5")),
                Change::Add(record("web2", "10.0.0.6")),
            ]
        );
    }

    #[test]
    fn test_removed_server_is_deleted() {
        let change_set = diff(
            &desired(&[record("web1", "10.0.0.5")]),
            &observed(&[record("web1", "10.0.0.5"), record("web2", "10.0.0.6")]),
        );
        assert_eq!(
            change_set.operations(),
            &[Change::Remove(record("web2", "10.0.0.6"))]
        );
        assert_eq!(change_set.unchanged(), 1);
    }

    #[test]
    fn test_address_change_removes_then_adds() {
        let change_set = diff(
            &desired(&[record("web1", "10.0.0.9")]),
            &observed(&[record("web1", "10.0.0.5")]),
        );
        assert_eq!(
            change_set.operations(),
            &[
                Change::Remove(record("web1", "10.0.0.5")),
                Change::Add(record("web1", "10.0.0.9")),
            ]
        );
    }

    #[test]
    fn test_ttl_change_is_a_value_change() {
        let change_set = diff(
            &desired(&[record_ttl("web1", "10.0.0.5", 600)]),
            &observed(&[record_ttl("web1", "10.0.0.5", 300)]),
        );
        assert_eq!(
            change_set.operations(),
            &[
                Change::Remove(record_ttl("web1", "10.0.0.5", 300)),
                Change::Add(record_ttl("web1", "10.0.0.5", 600)),
            ]
        );
    }

    #[test]
    fn test_extra_values_are_removed_and_correct_value_kept() {
        let change_set = diff(
            &desired(&[record("web1", "10.0.0.5")]),
            &observed(&[record("web1", "10.0.0.5"), record("web1", "10.0.0.99")]),
        );
        assert_eq!(
            change_set.operations(),
            &[Change::Remove(record("web1", "10.0.0.99"))]
        );
        assert_eq!(change_set.unchanged(), 1);
    }

    #[test]
    fn test_removals_precede_additions_for_every_name() {
        let change_set = diff(
            &desired(&[
                record("web1", "10.0.0.9"),
                record("web1", "fd00::9"),
                record("web2", "10.0.0.8"),
            ]),
            &observed(&[
                record("web1", "10.0.0.5"),
                record("web1", "fd00::5"),
                record("web2", "10.0.0.6"),
            ]),
        );

        for group in change_set.name_groups() {
            let first_add = group.iter().position(Change::is_addition);
            let last_remove = group.iter().rposition(|c| !c.is_addition());
            if let (Some(add), Some(remove)) = (first_add, last_remove) {
                assert!(remove < add, "removal after addition in {group:?}");
            }
        }
        assert_eq!(change_set.name_groups().len(), 2);
    }

    #[test]
    fn test_applying_the_diff_converges() {
        let wanted = desired(&[
            record("web1", "10.0.0.9"),
            record("web3", "10.0.0.7"),
            record("db1", "fd00::1"),
        ]);
        let current = observed(&[
            record("web1", "10.0.0.5"),
            record("web2", "10.0.0.6"),
            record("db1", "fd00::1"),
            record("db1", "fd00::2"),
        ]);

        let change_set = diff(&wanted, &current);
        assert!(!change_set.is_empty());

        let after = apply(&current, &change_set);
        let second = diff(&wanted, &after);
        assert!(second.is_empty(), "second diff not empty: {second:?}");
        assert_eq!(second.unchanged(), wanted.len());
    }

    #[test]
    fn test_records_outside_owned_space_never_appear() {
        let apex = record_ttl("internal.example.com.", "10.0.0.1", 600);
        let foreign = record_ttl("web1.other.example.", "10.0.0.2", 600);
        let change_set = diff(
            &desired(&[record("web1", "10.0.0.5")]),
            &observed(&[apex.clone(), foreign.clone()]),
        );

        assert!(change_set
            .operations()
            .iter()
            .all(|c| c.record() != &apex && c.record() != &foreign));
        assert_eq!(change_set.len(), 1);
    }

    #[test]
    fn test_input_order_does_not_affect_output() {
        let servers = vec![
            NetworkServer {
                hostname: "web2".to_string(),
                private_address: "10.0.0.6".parse().unwrap(),
            },
            NetworkServer {
                hostname: "app".to_string(),
                private_address: "10.0.0.4".parse().unwrap(),
            },
            NetworkServer {
                hostname: "web1".to_string(),
                private_address: "10.0.0.5".parse().unwrap(),
            },
        ];
        let mut reversed = servers.clone();
        reversed.reverse();

        let observed_records = vec![record("old", "10.0.0.3"), record("web1", "10.0.0.50")];
        let mut observed_reversed = observed_records.clone();
        observed_reversed.reverse();

        let first = diff(
            &DesiredState::from_servers(&zone(), &servers, 600).unwrap(),
            &observed(&observed_records),
        );
        let second = diff(
            &DesiredState::from_servers(&zone(), &reversed, 600).unwrap(),
            &observed(&observed_reversed),
        );

        assert_eq!(first, second);
    }

    #[test]
    fn test_name_groups_keep_operations_of_a_name_together() {
        let change_set = diff(
            &desired(&[record("web1", "10.0.0.9"), record("web2", "10.0.0.8")]),
            &observed(&[record("web1", "10.0.0.5")]),
        );
        let groups = change_set.name_groups();
        assert_eq!(groups.len(), 2);
        assert!(groups
            .iter()
            .all(|g| g.iter().all(|c| c.name() == g[0].name())));
        assert_eq!(groups.iter().map(Vec::len).sum::<usize>(), change_set.len());
    }

    #[test]
    fn test_change_display() {
        let add = Change::Add(record("web1", "10.0.0.5"));
        assert_eq!(add.to_string(), "add web1.internal.example.com. 600 A 10.0.0.5");
        let remove = Change::Remove(record("web1", "fd00::5"));
        assert_eq!(
            remove.to_string(),
            "delete web1.internal.example.com. 600 AAAA fd00::5"
        );
    }
}
