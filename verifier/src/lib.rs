//! Validate the key material generated for a BFT deployment.
//!
//! A deployment of `n = 3f + 2c + 1` replicas requires every replica to
//! hold a pairwise-authentication keypair and a share in four independent
//! threshold cryptosystems, one per consensus commit path. The tool that
//! generates that material is untrusted until proven: this crate checks,
//! offline and before deployment, that a loaded
//! [Keyset](keycheck_keyset::Keyset) is internally consistent and
//! functionally correct, without enumerating every possible signer subset.
//!
//! Validation proceeds fail-fast through a fixed sequence of phases:
//! structural invariants, pairwise-authentication keys, then each commit
//! path's threshold cryptosystem. The first failing check aborts the run
//! with one diagnostic naming the offending replica(s), cryptosystem, and
//! invariant; a clean run reports success. The engine only reads the
//! keyset, so re-running it on unchanged material yields the same result.
//!
//! # Example
//!
//! ```rust
//! use keycheck_keyset::mocks::Fixture;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let keyset = Fixture::generate(&mut rng, 1, 0).build();
//! assert!(keycheck_verifier::verify(&keyset).is_ok());
//! ```

mod auth;
mod corpus;
mod structural;
mod threshold;

pub use threshold::signer_subsets;

use commonware_cryptography::Signer;
use keycheck_keyset::{CommitPath, Keyset, ReplicaId};
use thiserror::Error;
use tracing::{debug, info};

/// How often to log progress while exercising keys, measured in tested
/// items (key pairs or signer combinations).
pub(crate) const PROGRESS_INTERVAL: usize = 128;

/// Everything that can be wrong with a keyset, classified.
///
/// Scheme failures of unpredictable shape are caught where they occur and
/// mapped into these kinds; the first fault aborts the run.
#[derive(Debug, Error)]
pub enum Fault {
    /// Arithmetic or identity invariants do not hold across the records.
    #[error("replica {replica}: {reason}")]
    StructuralInconsistency { replica: ReplicaId, reason: String },

    /// A pairwise-authentication keypair failed to sign and verify.
    #[error("invalid authentication key for replica {replica}: {reason}")]
    InvalidAuthKey { replica: ReplicaId, reason: String },

    /// A threshold signer, verifier, or accumulator operation failed.
    #[error("{path} cryptosystem: {reason}")]
    InvalidThresholdKey { path: CommitPath, reason: String },

    /// A tested signer subset was accepted or rejected against the
    /// cryptosystem's threshold.
    #[error("{path} cryptosystem (threshold {threshold} of {signers}): {reason}")]
    ThresholdLawViolation {
        path: CommitPath,
        threshold: u32,
        signers: u32,
        reason: String,
    },

    /// Two records disagree on published public material.
    #[error("replica {replica}: {reason}")]
    KeyAgreementViolation { replica: ReplicaId, reason: String },

    /// Two replicas hold key material that must be pairwise distinct.
    #[error("replicas {first} and {second}: {reason}")]
    KeyUniquenessViolation {
        first: ReplicaId,
        second: ReplicaId,
        reason: String,
    },
}

/// The validation phases, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Structural,
    PairwiseAuth,
    Threshold(CommitPath),
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structural => write!(f, "structural"),
            Self::PairwiseAuth => write!(f, "pairwise auth"),
            Self::Threshold(path) => write!(f, "threshold ({})", path),
        }
    }
}

/// A failed validation run: the phase that aborted it and the first fault.
#[derive(Debug, Error)]
#[error("{phase} validation failed: {fault}")]
pub struct Failure {
    pub phase: Phase,
    pub fault: Fault,
}

/// Validate a keyset.
///
/// Runs the structural, pairwise-auth, and per-path threshold phases in
/// order, halting at the first fault. Every accumulator created along the
/// way is released before the run returns, whether it passes or not.
pub fn verify<C: Signer>(keyset: &Keyset<C>) -> Result<(), Failure> {
    let digests = corpus::digests();
    info!(replicas = keyset.len(), "validating keyset");

    structural::validate(keyset).map_err(|fault| Failure {
        phase: Phase::Structural,
        fault,
    })?;
    debug!("structural checks passed");

    auth::validate(keyset, &digests).map_err(|fault| Failure {
        phase: Phase::PairwiseAuth,
        fault,
    })?;
    debug!("pairwise-auth checks passed");

    for path in CommitPath::ALL {
        threshold::validate(keyset, path, &digests).map_err(|fault| Failure {
            phase: Phase::Threshold(path),
            fault,
        })?;
    }

    info!("keyset is valid");
    Ok(())
}
