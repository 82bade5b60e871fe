//! Pairwise-authentication key checks.
//!
//! Every replica must hold a working keypair, no two replicas may publish
//! the same public key, and every record must agree on what every other
//! replica's public key is.

use crate::{Fault, PROGRESS_INTERVAL};
use commonware_cryptography::{Signer, Verifier};
use keycheck_keyset::{Keyset, ReplicaId};
use std::collections::BTreeMap;
use tracing::debug;

pub(crate) fn validate<C: Signer>(keyset: &Keyset<C>, digests: &[Vec<u8>]) -> Result<(), Fault> {
    let records = keyset.records();
    let n = records.len();
    debug!(replicas = n, "testing authentication key pairs");

    // Self test: a signature under each replica's private key must verify
    // under the public key that replica publishes for itself.
    for (index, record) in records.iter().enumerate() {
        let id = index as ReplicaId;
        let public_key =
            record
                .auth_public_keys
                .get(&id)
                .ok_or_else(|| Fault::InvalidAuthKey {
                    replica: id,
                    reason: "record does not publish the replica's own public key".into(),
                })?;
        for digest in digests {
            let signature = record.auth_key.sign(None, digest);
            if !public_key.verify(None, digest, &signature) {
                return Err(Fault::InvalidAuthKey {
                    replica: id,
                    reason: "signature over a test digest failed to verify".into(),
                });
            }
        }
        if (index + 1) % PROGRESS_INTERVAL == 0 {
            debug!(
                tested = index + 1,
                total = n,
                "tested authentication key pairs"
            );
        }
    }

    // No two replicas may publish the same key.
    let mut seen: BTreeMap<&C::PublicKey, ReplicaId> = BTreeMap::new();
    for (index, record) in records.iter().enumerate() {
        let id = index as ReplicaId;
        let public_key = record
            .auth_public_keys
            .get(&id)
            .expect("self entries verified above");
        if let Some(holder) = seen.get(public_key) {
            return Err(Fault::KeyUniquenessViolation {
                first: *holder,
                second: id,
                reason: "identical authentication public keys".into(),
            });
        }
        seen.insert(public_key, id);
    }

    // Every record must agree on every replica's public key.
    debug!("verifying replicas agree on authentication public keys");
    for (index, record) in records.iter().enumerate() {
        for (subject, published) in &record.auth_public_keys {
            let reference = records[*subject as usize]
                .auth_public_keys
                .get(subject)
                .expect("self entries verified above");
            if published != reference {
                return Err(Fault::KeyAgreementViolation {
                    replica: index as ReplicaId,
                    reason: format!(
                        "wrong authentication public key for replica {}",
                        subject
                    ),
                });
            }
        }
    }

    Ok(())
}
