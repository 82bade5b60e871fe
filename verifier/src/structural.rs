//! Structural consistency checks across a keyset's records.
//!
//! Purely arithmetic and identity-based; these run before any cryptographic
//! material is exercised so a malformed keyset is reported by its most
//! fundamental defect first.

use crate::Fault;
use commonware_cryptography::Signer;
use keycheck_keyset::{Keyset, ReplicaId};

pub(crate) fn validate<C: Signer>(keyset: &Keyset<C>) -> Result<(), Fault> {
    let records = keyset.records();
    if records.is_empty() {
        return Err(Fault::StructuralInconsistency {
            replica: 0,
            reason: "keyset contains no replica records".into(),
        });
    }
    let n = records.len();

    // An invalid f is more fundamental than disagreement with the replica
    // count, so it is reported first.
    for (index, record) in records.iter().enumerate() {
        if record.parameters.f_val < 1 {
            return Err(Fault::StructuralInconsistency {
                replica: index as ReplicaId,
                reason: format!("invalid f value: {}", record.parameters.f_val),
            });
        }
    }

    let parameters = records[0].parameters;
    let expected = parameters.expected_replicas();
    if expected != n as u64 {
        return Err(Fault::StructuralInconsistency {
            replica: 0,
            reason: format!(
                "f ({}) and c ({}) call for {} replicas, but the keyset has {}",
                parameters.f_val, parameters.c_val, expected, n
            ),
        });
    }

    for (index, record) in records.iter().enumerate() {
        if record.replica_id != index as ReplicaId {
            return Err(Fault::StructuralInconsistency {
                replica: index as ReplicaId,
                reason: format!(
                    "record at position {} declares replica id {}",
                    index, record.replica_id
                ),
            });
        }
    }

    for (index, record) in records.iter().enumerate() {
        if record.parameters != parameters {
            return Err(Fault::StructuralInconsistency {
                replica: index as ReplicaId,
                reason: format!(
                    "f ({}) or c ({}) disagrees with replica 0's values ({}, {})",
                    record.parameters.f_val,
                    record.parameters.c_val,
                    parameters.f_val,
                    parameters.c_val
                ),
            });
        }
    }

    for (index, record) in records.iter().enumerate() {
        if record.auth_public_keys.len() != n {
            return Err(Fault::StructuralInconsistency {
                replica: index as ReplicaId,
                reason: format!(
                    "published public key set has {} entries, expected {}",
                    record.auth_public_keys.len(),
                    n
                ),
            });
        }
        // Exactly n entries with every id below n covers [0, n) without
        // duplicates, since ids are map keys.
        for id in record.auth_public_keys.keys() {
            if *id as usize >= n {
                return Err(Fault::StructuralInconsistency {
                    replica: index as ReplicaId,
                    reason: format!("published public key set names invalid replica {}", id),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keycheck_keyset::mocks::Fixture;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_valid_keyset_passes() {
        let mut rng = StdRng::seed_from_u64(0);
        let keyset = Fixture::generate(&mut rng, 1, 0).build();
        assert!(validate(&keyset).is_ok());
    }

    #[test]
    fn test_empty_keyset_fails() {
        let keyset: Keyset<commonware_cryptography::ed25519::PrivateKey> = Keyset::new(vec![]);
        assert!(matches!(
            validate(&keyset),
            Err(Fault::StructuralInconsistency { replica: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_f_reported_before_count_disagreement() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut records = Fixture::generate(&mut rng, 1, 0).records();
        // Zeroing one record's f also breaks the count arithmetic; the f
        // complaint must win.
        records[1].parameters.f_val = 0;
        match validate(&Keyset::new(records)) {
            Err(Fault::StructuralInconsistency { replica, reason }) => {
                assert_eq!(replica, 1);
                assert!(reason.contains("invalid f value"));
            }
            result => panic!("unexpected result: {:?}", result),
        }
    }

    #[test]
    fn test_count_disagreement_reported() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut records = Fixture::generate(&mut rng, 1, 0).records();
        records.pop();
        match validate(&Keyset::new(records)) {
            Err(Fault::StructuralInconsistency { replica, reason }) => {
                assert_eq!(replica, 0);
                assert!(reason.contains("call for 4 replicas"));
            }
            result => panic!("unexpected result: {:?}", result),
        }
    }

    #[test]
    fn test_flipped_f_names_offending_replica() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut records = Fixture::generate(&mut rng, 1, 0).records();
        records[2].parameters.f_val = 2;
        match validate(&Keyset::new(records)) {
            Err(Fault::StructuralInconsistency { replica, reason }) => {
                assert_eq!(replica, 2);
                assert!(reason.contains("disagrees with replica 0"));
            }
            result => panic!("unexpected result: {:?}", result),
        }
    }

    #[test]
    fn test_replica_id_must_match_position() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut records = Fixture::generate(&mut rng, 1, 0).records();
        records[3].replica_id = 5;
        match validate(&Keyset::new(records)) {
            Err(Fault::StructuralInconsistency { replica, reason }) => {
                assert_eq!(replica, 3);
                assert!(reason.contains("declares replica id 5"));
            }
            result => panic!("unexpected result: {:?}", result),
        }
    }

    #[test]
    fn test_incomplete_public_key_set_reported() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut records = Fixture::generate(&mut rng, 1, 0).records();
        records[1].auth_public_keys.remove(&2);
        match validate(&Keyset::new(records)) {
            Err(Fault::StructuralInconsistency { replica, reason }) => {
                assert_eq!(replica, 1);
                assert!(reason.contains("3 entries, expected 4"));
            }
            result => panic!("unexpected result: {:?}", result),
        }
    }

    #[test]
    fn test_out_of_range_public_key_entry_reported() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut records = Fixture::generate(&mut rng, 1, 0).records();
        let stray = records[1].auth_public_keys[&2].clone();
        records[1].auth_public_keys.remove(&2);
        records[1].auth_public_keys.insert(7, stray);
        match validate(&Keyset::new(records)) {
            Err(Fault::StructuralInconsistency { replica, reason }) => {
                assert_eq!(replica, 1);
                assert!(reason.contains("invalid replica 7"));
            }
            result => panic!("unexpected result: {:?}", result),
        }
    }
}
