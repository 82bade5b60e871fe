//! Threshold cryptosystem checks, run once per commit path.
//!
//! Exhaustively testing every signer subset is combinatorial in the number
//! of replicas, so the validator samples instead: subsets of sizes 1, T-1,
//! and T establish that the threshold sits exactly where the parameters say
//! it does, and consecutive wraparound blocks of size T guarantee every
//! replica's share is exercised at least once. Each sampled subset is fed
//! through a fresh accumulator and held to the acceptance law: the combined
//! signature verifies exactly when at least T distinct signers contributed,
//! regardless of which signers they are.

use crate::{Fault, PROGRESS_INTERVAL};
use commonware_cryptography::Signer;
use keycheck_keyset::{
    scheme::{ShareAccumulator, ShareSigner, ThresholdVerifier},
    CommitPath, Keyset, ReplicaId,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Signer subsets to test for a cryptosystem with `n` signers and
/// threshold `t`.
///
/// Emits prefix subsets of sizes 1, `t - 1`, and `t` (skipping sizes that
/// do not strictly grow), then consecutive blocks of exactly `t` signer
/// ids, wrapping around `0..n` until every id has appeared in at least one
/// block. The total is `O(n / t)` subsets rather than `C(n, t)`.
///
/// `t` must be in `[1, n]`.
pub fn signer_subsets(n: u32, t: u32) -> Vec<Vec<ReplicaId>> {
    let mut subsets = Vec::new();

    let mut sizes = vec![1u32];
    for size in [t - 1, t] {
        if size > sizes[sizes.len() - 1] {
            sizes.push(size);
        }
    }
    for size in sizes {
        subsets.push((0..size).collect());
    }

    // The cursor is wider than the id type because it keeps counting past
    // `n` while the final block wraps around to the front.
    let mut cursor: u64 = 0;
    while cursor < n as u64 {
        let block = (0..t)
            .map(|_| {
                let id = (cursor % n as u64) as ReplicaId;
                cursor += 1;
                id
            })
            .collect();
        subsets.push(block);
    }

    subsets
}

pub(crate) fn validate<C: Signer>(
    keyset: &Keyset<C>,
    path: CommitPath,
    digests: &[Vec<u8>],
) -> Result<(), Fault> {
    let records = keyset.records();
    let n = records.len() as u32;
    // Structural validation already confirmed n = 3f + 2c + 1, so the
    // 64-bit threshold fits the id width.
    let threshold = path.threshold(&records[0].parameters) as u32;
    debug!(path = %path, threshold, signers = n, "testing threshold cryptosystem");

    let subsets = signer_subsets(n, threshold);
    let total = subsets.len();
    for (tested, subset) in subsets.iter().enumerate() {
        test_subset(keyset, path, threshold, subset, digests)?;
        if (tested + 1) % PROGRESS_INTERVAL == 0 {
            debug!(path = %path, tested = tested + 1, total, "tested signer combinations");
        }
    }

    verify_key_agreement(keyset, path, n)?;
    verify_share_uniqueness(keyset, path)?;

    debug!(path = %path, "threshold cryptosystem is consistent");
    Ok(())
}

/// Exercise one signer subset against the acceptance law, once per corpus
/// digest.
fn test_subset<C: Signer>(
    keyset: &Keyset<C>,
    path: CommitPath,
    threshold: u32,
    subset: &[ReplicaId],
    digests: &[Vec<u8>],
) -> Result<(), Fault> {
    // All signatures are judged against the reference record's view of the
    // cryptosystem; agreement with every other record is checked separately.
    let verifier = keyset.records()[0].path_keys(path).verifier.as_ref();

    for digest in digests {
        // Prefer verifying each share as it arrives; not every scheme
        // supports it.
        let mut accumulator = match verifier.new_accumulator(true) {
            Ok(accumulator) => accumulator,
            Err(_) => {
                verifier
                    .new_accumulator(false)
                    .map_err(|err| Fault::InvalidThresholdKey {
                        path,
                        reason: format!("cannot create a share accumulator: {}", err),
                    })?
            }
        };

        let outcome = exercise_accumulator(
            keyset,
            path,
            threshold,
            subset,
            digest,
            verifier,
            accumulator.as_mut(),
        );

        // Release is best-effort: a failure is reported but never replaces
        // the outcome already computed.
        if let Err(err) = accumulator.release() {
            warn!(path = %path, error = %err, "failed to release share accumulator");
        }

        outcome?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn exercise_accumulator<C: Signer>(
    keyset: &Keyset<C>,
    path: CommitPath,
    threshold: u32,
    subset: &[ReplicaId],
    digest: &[u8],
    verifier: &dyn ThresholdVerifier,
    accumulator: &mut dyn ShareAccumulator,
) -> Result<(), Fault> {
    let records = keyset.records();
    let n = records.len() as u32;
    let verification = accumulator.share_verification_enabled();

    if verification {
        accumulator
            .set_expected_digest(digest)
            .map_err(|err| Fault::InvalidThresholdKey {
                path,
                reason: format!("cannot set the expected digest: {}", err),
            })?;
        let preexisting =
            accumulator
                .valid_shares()
                .map_err(|err| Fault::InvalidThresholdKey {
                    path,
                    reason: format!("cannot query accumulated shares: {}", err),
                })?;
        if preexisting != 0 {
            return Err(Fault::InvalidThresholdKey {
                path,
                reason: format!("a fresh accumulator reports {} valid shares", preexisting),
            });
        }
    }

    let mut accumulated = 0;
    for signer in subset {
        let keys = records[*signer as usize].path_keys(path);
        let share = sign_share(path, *signer, keys.signer.as_ref(), digest)?;
        let count =
            accumulator
                .add_share(&share)
                .map_err(|err| Fault::InvalidThresholdKey {
                    path,
                    reason: format!("cannot add signer {}'s share: {}", signer, err),
                })?;
        if verification {
            // Below the threshold each verified share must be counted
            // exactly once; past it, extra shares may or may not be, so the
            // reported count simply becomes the new baseline.
            if accumulated + 1 <= threshold && count != accumulated + 1 {
                return Err(Fault::ThresholdLawViolation {
                    path,
                    threshold,
                    signers: n,
                    reason: format!(
                        "accumulator counted {} valid shares after signer {} contributed, expected {}",
                        count,
                        signer,
                        accumulated + 1
                    ),
                });
            }
            accumulated = count;
        }
    }

    let verified = match accumulator.full_signature() {
        Ok(signature) => {
            verifier
                .verify(digest, &signature)
                .map_err(|err| Fault::InvalidThresholdKey {
                    path,
                    reason: format!("cannot verify the combined signature: {}", err),
                })?
        }
        // Below the threshold a scheme may refuse to combine at all; that
        // satisfies the law the same way an unverifiable signature does.
        Err(_) if (subset.len() as u32) < threshold => false,
        Err(err) => {
            return Err(Fault::InvalidThresholdKey {
                path,
                reason: format!("cannot combine {} shares: {}", subset.len(), err),
            })
        }
    };

    let expected = subset.len() as u32 >= threshold;
    if verified != expected {
        return Err(Fault::ThresholdLawViolation {
            path,
            threshold,
            signers: n,
            reason: format!(
                "{} signers were unexpectedly {}",
                subset.len(),
                if verified { "accepted" } else { "rejected" }
            ),
        });
    }

    Ok(())
}

/// Produce one signer's share over `digest`, classifying any scheme failure
/// as an invalid private key for that signer.
fn sign_share(
    path: CommitPath,
    id: ReplicaId,
    signer: &dyn ShareSigner,
    digest: &[u8],
) -> Result<Vec<u8>, Fault> {
    let expected_len = signer
        .share_len()
        .map_err(|err| Fault::InvalidThresholdKey {
            path,
            reason: format!("invalid private key for signer {}: {}", id, err),
        })?;
    let share = signer
        .sign_share(digest)
        .map_err(|err| Fault::InvalidThresholdKey {
            path,
            reason: format!("invalid private key for signer {}: {}", id, err),
        })?;
    if share.len() != expected_len {
        return Err(Fault::InvalidThresholdKey {
            path,
            reason: format!(
                "signer {} produced a {}-byte share, expected {}",
                id,
                share.len(),
                expected_len
            ),
        });
    }
    Ok(share)
}

/// Every record must publish the same combined public key and the same
/// share verification keys as the reference record.
fn verify_key_agreement<C: Signer>(
    keyset: &Keyset<C>,
    path: CommitPath,
    n: u32,
) -> Result<(), Fault> {
    let records = keyset.records();
    let reference = records[0].path_keys(path).verifier.as_ref();
    let reference_key = read_public_key(path, 0, reference)?;
    let reference_share_keys: Vec<Vec<u8>> = (0..n)
        .map(|signer| read_share_key(path, 0, signer, reference))
        .collect::<Result<_, _>>()?;

    for (index, record) in records.iter().enumerate().skip(1) {
        let id = index as ReplicaId;
        let verifier = record.path_keys(path).verifier.as_ref();
        if read_public_key(path, id, verifier)? != reference_key {
            return Err(Fault::KeyAgreementViolation {
                replica: id,
                reason: format!(
                    "wrong combined public key for the {} cryptosystem (reference replica 0)",
                    path
                ),
            });
        }
        for signer in 0..n {
            if read_share_key(path, id, signer, verifier)? != reference_share_keys[signer as usize]
            {
                return Err(Fault::KeyAgreementViolation {
                    replica: id,
                    reason: format!(
                        "wrong share verification key for signer {} under the {} cryptosystem (reference replica 0)",
                        signer, path
                    ),
                });
            }
        }
    }

    Ok(())
}

fn read_public_key(
    path: CommitPath,
    holder: ReplicaId,
    verifier: &dyn ThresholdVerifier,
) -> Result<Vec<u8>, Fault> {
    verifier
        .public_key()
        .map_err(|err| Fault::InvalidThresholdKey {
            path,
            reason: format!("cannot read replica {}'s combined public key: {}", holder, err),
        })
}

fn read_share_key(
    path: CommitPath,
    holder: ReplicaId,
    signer: ReplicaId,
    verifier: &dyn ThresholdVerifier,
) -> Result<Vec<u8>, Fault> {
    verifier
        .share_verification_key(signer)
        .map_err(|err| Fault::InvalidThresholdKey {
            path,
            reason: format!(
                "cannot read signer {}'s share verification key from replica {}'s record: {}",
                signer, holder, err
            ),
        })
}

/// No two replicas may hold the same private share.
fn verify_share_uniqueness<C: Signer>(keyset: &Keyset<C>, path: CommitPath) -> Result<(), Fault> {
    let mut seen: BTreeMap<Vec<u8>, ReplicaId> = BTreeMap::new();
    for (index, record) in keyset.records().iter().enumerate() {
        let id = index as ReplicaId;
        let fingerprint = record
            .path_keys(path)
            .signer
            .share_fingerprint()
            .map_err(|err| Fault::InvalidThresholdKey {
                path,
                reason: format!("cannot fingerprint signer {}'s private share: {}", id, err),
            })?;
        if let Some(holder) = seen.get(&fingerprint) {
            return Err(Fault::KeyUniquenessViolation {
                first: *holder,
                second: id,
                reason: format!("identical private shares under the {} cryptosystem", path),
            });
        }
        seen.insert(fingerprint, id);
    }
    Ok(())
}
