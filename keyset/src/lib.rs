//! Model the key material generated for a BFT deployment.
//!
//! A deployment of `n = 3f + 2c + 1` replicas equips every replica with a
//! pairwise-authentication keypair and a share in four independent threshold
//! cryptosystems, one per consensus commit path. [Keyset] is the in-memory
//! aggregate of all `n` per-replica records, as produced by an external
//! loader: it exposes read accessors only and carries the signing and
//! verification capabilities (defined in [scheme]) that a validation engine
//! exercises before the material is deployed.
//!
//! Concrete threshold cryptosystems are selected when the keyset is loaded
//! and passed in as trait objects; [bls12381] provides a backing over the
//! BLS12-381 threshold primitives. [mocks] provides deterministic fixtures
//! for tests.

use commonware_cryptography::Signer;
use std::collections::BTreeMap;

pub mod bls12381;
pub mod mocks;
pub mod scheme;

pub use scheme::{ShareAccumulator, ShareSigner, ThresholdVerifier};

/// Identifies a replica: an index in `[0, n)` that doubles as the signer
/// index in every threshold cryptosystem.
pub type ReplicaId = u32;

/// Fault-tolerance parameters shared by every record in a keyset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeysetParameters {
    /// Maximum tolerated Byzantine replicas.
    pub f_val: u32,
    /// Maximum tolerated slow replicas.
    pub c_val: u32,
}

impl KeysetParameters {
    /// Number of replicas the parameters call for.
    ///
    /// Computed in 64 bits so `3f + 2c + 1` cannot overflow the declared
    /// parameter width.
    pub fn expected_replicas(&self) -> u64 {
        3 * self.f_val as u64 + 2 * self.c_val as u64 + 1
    }
}

/// The four consensus commit paths, each backed by its own threshold
/// cryptosystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommitPath {
    Execution,
    SlowPathCommit,
    Commit,
    OptimisticFastPathCommit,
}

impl CommitPath {
    /// All commit paths, in validation order.
    pub const ALL: [Self; 4] = [
        Self::Execution,
        Self::SlowPathCommit,
        Self::Commit,
        Self::OptimisticFastPathCommit,
    ];

    /// Number of signers required to produce a quorum certificate on this
    /// path.
    ///
    /// Computed in 64 bits for the same reason as
    /// [KeysetParameters::expected_replicas]. For any parameters the result
    /// is at least 1 and at most [KeysetParameters::expected_replicas].
    pub fn threshold(&self, parameters: &KeysetParameters) -> u64 {
        let f = parameters.f_val as u64;
        let c = parameters.c_val as u64;
        match self {
            Self::Execution => f + 1,
            Self::SlowPathCommit => 2 * f + c + 1,
            Self::Commit => 3 * f + c + 1,
            Self::OptimisticFastPathCommit => 3 * f + 2 * c + 1,
        }
    }
}

impl std::fmt::Display for CommitPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Execution => "execution",
            Self::SlowPathCommit => "slow path commit",
            Self::Commit => "commit",
            Self::OptimisticFastPathCommit => "optimistic fast path commit",
        };
        write!(f, "{}", name)
    }
}

/// One replica's view of one threshold cryptosystem: its own signing share
/// and a verifier over the cryptosystem's public material.
pub struct PathKeys {
    pub signer: Box<dyn ShareSigner>,
    pub verifier: Box<dyn ThresholdVerifier>,
}

/// Everything one replica's key file contributes to a deployment.
pub struct ReplicaKeyRecord<C: Signer> {
    /// Declared identity of the replica; must match the record's position in
    /// the keyset.
    pub replica_id: ReplicaId,
    pub parameters: KeysetParameters,
    /// The replica's own pairwise-authentication key.
    pub auth_key: C,
    /// Authentication public keys of every replica, as published by this
    /// record.
    pub auth_public_keys: BTreeMap<ReplicaId, C::PublicKey>,
    pub execution: PathKeys,
    pub slow_path_commit: PathKeys,
    pub commit: PathKeys,
    pub optimistic_fast_path_commit: PathKeys,
}

impl<C: Signer> ReplicaKeyRecord<C> {
    /// This record's view of the given commit path's cryptosystem.
    pub fn path_keys(&self, path: CommitPath) -> &PathKeys {
        match path {
            CommitPath::Execution => &self.execution,
            CommitPath::SlowPathCommit => &self.slow_path_commit,
            CommitPath::Commit => &self.commit,
            CommitPath::OptimisticFastPathCommit => &self.optimistic_fast_path_commit,
        }
    }
}

/// The aggregate key material of a deployment: one record per replica,
/// ordered by replica id.
///
/// A keyset is constructed once by a loader, validated read-only, and then
/// dropped; dropping it releases the scheme handles its records carry.
pub struct Keyset<C: Signer> {
    records: Vec<ReplicaKeyRecord<C>>,
}

impl<C: Signer> Keyset<C> {
    pub fn new(records: Vec<ReplicaKeyRecord<C>>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ReplicaKeyRecord<C>] {
        &self.records
    }

    /// Number of replicas in the keyset.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
