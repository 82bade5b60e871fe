//! Deterministic keyset fixtures and tamper wrappers for tests.
//!
//! [Fixture] deals fresh key material for a whole deployment the way an
//! external generator would: ed25519 identities for pairwise authentication
//! and one BLS12-381 dealing per commit path. Material can be mutated before
//! it is assembled into a [Keyset], and the tamper wrappers fake a record
//! whose published view disagrees with the rest of the deployment.

use crate::{
    bls12381::{Bls12381ShareSigner, Bls12381ThresholdVerifier},
    scheme::{Error, ShareAccumulator, ShareSigner, ThresholdVerifier},
    CommitPath, Keyset, KeysetParameters, PathKeys, ReplicaId, ReplicaKeyRecord,
};
use commonware_cryptography::{
    bls12381::{
        dkg::ops::generate_shares,
        primitives::{group::Share, poly::Public, variant::MinSig},
    },
    ed25519, PrivateKeyExt, Signer,
};
use rand::{CryptoRng, Rng};
use std::collections::BTreeMap;

/// One dealt threshold cryptosystem: the public polynomial and every
/// replica's private share.
struct Dealing {
    commitment: Public<MinSig>,
    shares: Vec<Share>,
}

/// Key material for a full deployment, mutable before it is assembled into
/// a [Keyset].
pub struct Fixture {
    pub parameters: KeysetParameters,
    auth_keys: Vec<ed25519::PrivateKey>,
    dealings: [Dealing; 4],
}

impl Fixture {
    /// Deal key material for a deployment tolerating `f_val` Byzantine and
    /// `c_val` slow replicas.
    pub fn generate<R: Rng + CryptoRng>(rng: &mut R, f_val: u32, c_val: u32) -> Self {
        let parameters = KeysetParameters { f_val, c_val };
        let n = parameters.expected_replicas() as u32;
        let auth_keys = (0..n).map(|_| ed25519::PrivateKey::from_rng(rng)).collect();
        let dealings = CommitPath::ALL.map(|path| {
            let threshold = path.threshold(&parameters) as u32;
            let (commitment, shares) = generate_shares::<_, MinSig>(rng, None, n, threshold);
            Dealing { commitment, shares }
        });
        Self {
            parameters,
            auth_keys,
            dealings,
        }
    }

    /// Number of replicas in the deployment.
    pub fn replicas(&self) -> u32 {
        self.auth_keys.len() as u32
    }

    fn path_index(path: CommitPath) -> usize {
        CommitPath::ALL
            .iter()
            .position(|candidate| *candidate == path)
            .expect("all paths are dealt")
    }

    /// Swap the private scalars (but not the signer indices) of two
    /// replicas' shares under one cryptosystem.
    pub fn swap_shares(&mut self, path: CommitPath, a: ReplicaId, b: ReplicaId) {
        let dealing = &mut self.dealings[Self::path_index(path)];
        let scalar = dealing.shares[a as usize].private.clone();
        dealing.shares[a as usize].private = dealing.shares[b as usize].private.clone();
        dealing.shares[b as usize].private = scalar;
    }

    /// Give replica `to` a copy of replica `from`'s authentication key.
    pub fn copy_auth_key(&mut self, from: ReplicaId, to: ReplicaId) {
        self.auth_keys[to as usize] = self.auth_keys[from as usize].clone();
    }

    fn path_keys(&self, path: CommitPath, id: ReplicaId) -> PathKeys {
        let dealing = &self.dealings[Self::path_index(path)];
        PathKeys {
            signer: Box::new(Bls12381ShareSigner::<MinSig>::new(
                dealing.shares[id as usize].clone(),
            )),
            verifier: Box::new(Bls12381ThresholdVerifier::<MinSig>::new(
                dealing.commitment.clone(),
                self.replicas(),
            )),
        }
    }

    /// Assemble the per-replica records.
    pub fn records(&self) -> Vec<ReplicaKeyRecord<ed25519::PrivateKey>> {
        let auth_public_keys: BTreeMap<ReplicaId, ed25519::PublicKey> = self
            .auth_keys
            .iter()
            .enumerate()
            .map(|(id, key)| (id as ReplicaId, key.public_key()))
            .collect();
        (0..self.replicas())
            .map(|id| ReplicaKeyRecord {
                replica_id: id,
                parameters: self.parameters,
                auth_key: self.auth_keys[id as usize].clone(),
                auth_public_keys: auth_public_keys.clone(),
                execution: self.path_keys(CommitPath::Execution, id),
                slow_path_commit: self.path_keys(CommitPath::SlowPathCommit, id),
                commit: self.path_keys(CommitPath::Commit, id),
                optimistic_fast_path_commit: self
                    .path_keys(CommitPath::OptimisticFastPathCommit, id),
            })
            .collect()
    }

    /// Assemble a keyset.
    pub fn build(&self) -> Keyset<ed25519::PrivateKey> {
        Keyset::new(self.records())
    }
}

/// Delegates to an inner verifier while overriding selected public
/// material. Models a record whose key file disagrees with the rest of the
/// deployment.
pub struct TamperedVerifier {
    inner: Box<dyn ThresholdVerifier>,
    public_key: Option<Vec<u8>>,
    share_verification_keys: BTreeMap<ReplicaId, Vec<u8>>,
}

impl TamperedVerifier {
    pub fn new(inner: Box<dyn ThresholdVerifier>) -> Self {
        Self {
            inner,
            public_key: None,
            share_verification_keys: BTreeMap::new(),
        }
    }

    /// Publish `key` as the combined public key.
    pub fn with_public_key(mut self, key: Vec<u8>) -> Self {
        self.public_key = Some(key);
        self
    }

    /// Publish `key` as `signer`'s share verification key.
    pub fn with_share_verification_key(mut self, signer: ReplicaId, key: Vec<u8>) -> Self {
        self.share_verification_keys.insert(signer, key);
        self
    }
}

impl ThresholdVerifier for TamperedVerifier {
    fn new_accumulator(
        &self,
        share_verification: bool,
    ) -> Result<Box<dyn ShareAccumulator + '_>, Error> {
        self.inner.new_accumulator(share_verification)
    }

    fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<bool, Error> {
        self.inner.verify(digest, signature)
    }

    fn public_key(&self) -> Result<Vec<u8>, Error> {
        match &self.public_key {
            Some(key) => Ok(key.clone()),
            None => self.inner.public_key(),
        }
    }

    fn share_verification_key(&self, signer: ReplicaId) -> Result<Vec<u8>, Error> {
        match self.share_verification_keys.get(&signer) {
            Some(key) => Ok(key.clone()),
            None => self.inner.share_verification_key(signer),
        }
    }

    fn signature_len(&self) -> Result<usize, Error> {
        self.inner.signature_len()
    }
}

/// Delegates to an inner signer while overriding its share fingerprint.
/// Models two replicas holding the same private share.
pub struct TamperedSigner {
    inner: Box<dyn ShareSigner>,
    fingerprint: Vec<u8>,
}

impl TamperedSigner {
    pub fn new(inner: Box<dyn ShareSigner>, fingerprint: Vec<u8>) -> Self {
        Self { inner, fingerprint }
    }
}

impl ShareSigner for TamperedSigner {
    fn share_len(&self) -> Result<usize, Error> {
        self.inner.share_len()
    }

    fn sign_share(&self, digest: &[u8]) -> Result<Vec<u8>, Error> {
        self.inner.sign_share(digest)
    }

    fn share_fingerprint(&self) -> Result<Vec<u8>, Error> {
        Ok(self.fingerprint.clone())
    }
}

/// Refuses verification-enabled accumulators, modeling a scheme without
/// per-share verification.
pub struct DisabledVerification {
    inner: Box<dyn ThresholdVerifier>,
}

impl DisabledVerification {
    pub fn new(inner: Box<dyn ThresholdVerifier>) -> Self {
        Self { inner }
    }
}

impl ThresholdVerifier for DisabledVerification {
    fn new_accumulator(
        &self,
        share_verification: bool,
    ) -> Result<Box<dyn ShareAccumulator + '_>, Error> {
        if share_verification {
            return Err(Error::VerificationUnsupported);
        }
        self.inner.new_accumulator(false)
    }

    fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<bool, Error> {
        self.inner.verify(digest, signature)
    }

    fn public_key(&self) -> Result<Vec<u8>, Error> {
        self.inner.public_key()
    }

    fn share_verification_key(&self, signer: ReplicaId) -> Result<Vec<u8>, Error> {
        self.inner.share_verification_key(signer)
    }

    fn signature_len(&self) -> Result<usize, Error> {
        self.inner.signature_len()
    }
}
