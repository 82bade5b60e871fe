//! Capability contract every threshold cryptosystem must satisfy.
//!
//! A validation engine depends only on these traits, never on a concrete
//! scheme; implementations are chosen at keyset-load time and passed in as
//! trait objects. Byte strings crossing the boundary (shares, signatures,
//! public keys) are the scheme's own codec encodings and are opaque to the
//! caller, which only ever compares them for equality or hands them back to
//! the scheme that produced them.

use crate::ReplicaId;
use thiserror::Error;

/// Failures a scheme may surface from any capability call.
///
/// Every variant is local and recoverable: callers catch it at the call
/// site, classify it, and abort only the current validation phase.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed signature share: {0}")]
    MalformedShare(commonware_codec::Error),
    #[error("malformed signature: {0}")]
    MalformedSignature(commonware_codec::Error),
    #[error("unknown signer {0}")]
    UnknownSigner(ReplicaId),
    #[error("expected digest not set")]
    DigestUnset,
    #[error("insufficient shares: {0} of {1} required")]
    InsufficientShares(u32, u32),
    #[error("accumulator already released")]
    AccumulatorReleased,
    #[error("share verification unsupported")]
    VerificationUnsupported,
}

/// Produces signature shares with one replica's private share of a
/// threshold cryptosystem.
pub trait ShareSigner: Send + Sync {
    /// Length in bytes of an encoded signature share.
    fn share_len(&self) -> Result<usize, Error>;

    /// Sign a message digest, returning the encoded signature share.
    fn sign_share(&self, digest: &[u8]) -> Result<Vec<u8>, Error>;

    /// A stable fingerprint of the private share.
    ///
    /// Fingerprints of distinct shares are distinct; the share itself is
    /// never exposed.
    fn share_fingerprint(&self) -> Result<Vec<u8>, Error>;
}

/// Verifies combined signatures and creates accumulators for one threshold
/// cryptosystem.
pub trait ThresholdVerifier: Send + Sync {
    /// Create an accumulator for one message, optionally verifying each
    /// share as it arrives.
    ///
    /// Fails if `share_verification` is requested but the scheme cannot
    /// verify individual shares; callers fall back to a disabled
    /// accumulator.
    fn new_accumulator(
        &self,
        share_verification: bool,
    ) -> Result<Box<dyn ShareAccumulator + '_>, Error>;

    /// Whether `signature` is a valid combined signature over `digest`.
    fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<bool, Error>;

    /// The cryptosystem's combined public key, encoded.
    fn public_key(&self) -> Result<Vec<u8>, Error>;

    /// The verification key for one signer's shares, encoded.
    fn share_verification_key(&self, signer: ReplicaId) -> Result<Vec<u8>, Error>;

    /// Length in bytes of an encoded combined signature.
    fn signature_len(&self) -> Result<usize, Error>;
}

/// Collects signature shares for one message and combines them once enough
/// distinct signers have contributed.
///
/// Accumulators are scoped resources: whoever creates one must call
/// [release](Self::release) on every exit path, exactly once. Operations
/// after release fail with [Error::AccumulatorReleased].
pub trait ShareAccumulator {
    /// Whether shares are verified as they are added.
    fn share_verification_enabled(&self) -> bool;

    /// Set the digest every added share is expected to sign.
    fn set_expected_digest(&mut self, digest: &[u8]) -> Result<(), Error>;

    /// Add one encoded share and return the number of distinct signers
    /// whose valid shares have been accumulated.
    ///
    /// Adding a share from an already-counted signer leaves the count
    /// unchanged, as does a share that fails verification (when enabled).
    fn add_share(&mut self, share: &[u8]) -> Result<u32, Error>;

    /// Number of distinct-signer valid shares accumulated so far.
    fn valid_shares(&self) -> Result<u32, Error>;

    /// Combine the accumulated shares into an encoded signature.
    ///
    /// Fails if fewer distinct signers than the cryptosystem's threshold
    /// have contributed. Shares beyond the threshold are neither required
    /// nor harmful.
    fn full_signature(&mut self) -> Result<Vec<u8>, Error>;

    /// Release the accumulator. Further use, including a second release,
    /// fails.
    fn release(&mut self) -> Result<(), Error>;
}
