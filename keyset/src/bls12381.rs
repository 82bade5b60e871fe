//! BLS12-381 backing for the threshold capabilities.
//!
//! Shares are codec-encoded partial signatures; the combined public key is
//! the constant term of the cryptosystem's public polynomial, and each
//! signer's share verification key is the polynomial evaluated at the
//! signer's index. Generic over the signature [Variant] (public keys in G1
//! or G2).

use crate::{
    scheme::{Error, ShareAccumulator, ShareSigner, ThresholdVerifier},
    ReplicaId,
};
use commonware_codec::{DecodeExt, Encode, FixedSize};
use commonware_cryptography::{
    bls12381::primitives::{
        group::Share,
        ops::{
            partial_sign_message, partial_verify_message, threshold_signature_recover,
            verify_message,
        },
        poly::{self, PartialSignature, Public},
        variant::Variant,
    },
    hash,
};
use std::{collections::BTreeMap, marker::PhantomData};

/// Signs with one replica's private share.
pub struct Bls12381ShareSigner<V: Variant> {
    share: Share,
    _variant: PhantomData<V>,
}

impl<V: Variant> Bls12381ShareSigner<V> {
    pub fn new(share: Share) -> Self {
        Self {
            share,
            _variant: PhantomData,
        }
    }
}

impl<V: Variant> ShareSigner for Bls12381ShareSigner<V>
where
    V::Public: Encode,
    PartialSignature<V>: Encode + FixedSize,
{
    fn share_len(&self) -> Result<usize, Error> {
        Ok(PartialSignature::<V>::SIZE)
    }

    fn sign_share(&self, digest: &[u8]) -> Result<Vec<u8>, Error> {
        let partial = partial_sign_message::<V>(&self.share, None, digest);
        Ok(partial.encode().to_vec())
    }

    fn share_fingerprint(&self) -> Result<Vec<u8>, Error> {
        // The share's public image is unique per private scalar, so its
        // digest stands in for the secret without exposing it.
        Ok(hash(&self.share.public::<V>().encode()).to_vec())
    }
}

/// Verifies combined signatures for one cryptosystem and accumulates shares
/// toward them.
pub struct Bls12381ThresholdVerifier<V: Variant> {
    polynomial: Public<V>,
    participants: u32,
}

impl<V: Variant> Bls12381ThresholdVerifier<V> {
    /// * `polynomial` - the cryptosystem's public polynomial
    /// * `participants` - total number of signers
    pub fn new(polynomial: Public<V>, participants: u32) -> Self {
        Self {
            polynomial,
            participants,
        }
    }

    /// Number of shares required to recover a combined signature.
    fn threshold(&self) -> u32 {
        self.polynomial.required()
    }
}

impl<V: Variant> ThresholdVerifier for Bls12381ThresholdVerifier<V>
where
    V::Public: Encode,
    V::Signature: Encode + DecodeExt<()> + FixedSize,
    PartialSignature<V>: DecodeExt<()>,
{
    fn new_accumulator(
        &self,
        share_verification: bool,
    ) -> Result<Box<dyn ShareAccumulator + '_>, Error> {
        Ok(Box::new(Bls12381Accumulator {
            verifier: self,
            digest: None,
            partials: BTreeMap::new(),
            share_verification,
            released: false,
        }))
    }

    fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<bool, Error> {
        let signature = V::Signature::decode(signature).map_err(Error::MalformedSignature)?;
        Ok(
            verify_message::<V>(poly::public::<V>(&self.polynomial), None, digest, &signature)
                .is_ok(),
        )
    }

    fn public_key(&self) -> Result<Vec<u8>, Error> {
        Ok(poly::public::<V>(&self.polynomial).encode().to_vec())
    }

    fn share_verification_key(&self, signer: ReplicaId) -> Result<Vec<u8>, Error> {
        if signer >= self.participants {
            return Err(Error::UnknownSigner(signer));
        }
        Ok(self.polynomial.evaluate(signer).value.encode().to_vec())
    }

    fn signature_len(&self) -> Result<usize, Error> {
        Ok(V::Signature::SIZE)
    }
}

/// Collects partial signatures keyed by signer index, so distinct-signer
/// counting and the duplicate-add law fall out of the map.
struct Bls12381Accumulator<'a, V: Variant> {
    verifier: &'a Bls12381ThresholdVerifier<V>,
    digest: Option<Vec<u8>>,
    partials: BTreeMap<ReplicaId, PartialSignature<V>>,
    share_verification: bool,
    released: bool,
}

impl<V: Variant> Bls12381Accumulator<'_, V> {
    fn ensure_live(&self) -> Result<(), Error> {
        if self.released {
            return Err(Error::AccumulatorReleased);
        }
        Ok(())
    }
}

impl<V: Variant> ShareAccumulator for Bls12381Accumulator<'_, V>
where
    V::Signature: Encode,
    PartialSignature<V>: DecodeExt<()>,
{
    fn share_verification_enabled(&self) -> bool {
        self.share_verification
    }

    fn set_expected_digest(&mut self, digest: &[u8]) -> Result<(), Error> {
        self.ensure_live()?;
        self.digest = Some(digest.to_vec());
        Ok(())
    }

    fn add_share(&mut self, share: &[u8]) -> Result<u32, Error> {
        self.ensure_live()?;
        let partial = PartialSignature::<V>::decode(share).map_err(Error::MalformedShare)?;
        if partial.index >= self.verifier.participants {
            return Err(Error::UnknownSigner(partial.index));
        }
        if self.share_verification {
            let digest = self.digest.as_ref().ok_or(Error::DigestUnset)?;
            if partial_verify_message::<V>(&self.verifier.polynomial, None, digest, &partial)
                .is_err()
            {
                // An unverifiable share is not counted; the caller observes
                // the unchanged count.
                return Ok(self.partials.len() as u32);
            }
        }
        self.partials.entry(partial.index).or_insert(partial);
        Ok(self.partials.len() as u32)
    }

    fn valid_shares(&self) -> Result<u32, Error> {
        self.ensure_live()?;
        Ok(self.partials.len() as u32)
    }

    fn full_signature(&mut self) -> Result<Vec<u8>, Error> {
        self.ensure_live()?;
        let threshold = self.verifier.threshold();
        let collected = self.partials.len() as u32;
        if collected < threshold {
            return Err(Error::InsufficientShares(collected, threshold));
        }
        let signature = threshold_signature_recover::<V, _>(threshold, self.partials.values())
            .map_err(|_| Error::InsufficientShares(collected, threshold))?;
        Ok(signature.encode().to_vec())
    }

    fn release(&mut self) -> Result<(), Error> {
        self.ensure_live()?;
        self.released = true;
        self.partials.clear();
        self.digest = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_cryptography::bls12381::{
        dkg::ops::generate_shares, primitives::variant::MinSig,
    };
    use rand::{rngs::StdRng, SeedableRng};

    const DIGEST: &[u8] = b"00000000000000000000000000000000";
    const OTHER_DIGEST: &[u8] = b"11111111111111111111111111111111";

    fn setup(
        seed: u64,
        n: u32,
        t: u32,
    ) -> (
        Bls12381ThresholdVerifier<MinSig>,
        Vec<Bls12381ShareSigner<MinSig>>,
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let (commitment, shares) = generate_shares::<_, MinSig>(&mut rng, None, n, t);
        let signers = shares
            .into_iter()
            .map(Bls12381ShareSigner::<MinSig>::new)
            .collect();
        (Bls12381ThresholdVerifier::new(commitment, n), signers)
    }

    fn accumulate(
        verifier: &Bls12381ThresholdVerifier<MinSig>,
        signers: &[Bls12381ShareSigner<MinSig>],
        ids: &[u32],
    ) -> Box<dyn ShareAccumulator + '_> {
        let mut accumulator = verifier.new_accumulator(true).unwrap();
        accumulator.set_expected_digest(DIGEST).unwrap();
        for id in ids {
            let share = signers[*id as usize].sign_share(DIGEST).unwrap();
            accumulator.add_share(&share).unwrap();
        }
        accumulator
    }

    #[test]
    fn test_combine_and_verify() {
        let (verifier, signers) = setup(0, 5, 3);
        let mut accumulator = accumulate(&verifier, &signers, &[0, 1, 2]);
        let signature = accumulator.full_signature().unwrap();
        assert_eq!(signature.len(), verifier.signature_len().unwrap());
        assert!(verifier.verify(DIGEST, &signature).unwrap());
        assert!(!verifier.verify(OTHER_DIGEST, &signature).unwrap());
        accumulator.release().unwrap();
    }

    #[test]
    fn test_any_subset_at_threshold_combines() {
        let (verifier, signers) = setup(1, 5, 3);
        for ids in [[0, 1, 2], [2, 3, 4], [0, 2, 4], [4, 1, 3]] {
            let mut accumulator = accumulate(&verifier, &signers, &ids);
            let signature = accumulator.full_signature().unwrap();
            assert!(verifier.verify(DIGEST, &signature).unwrap());
            accumulator.release().unwrap();
        }
    }

    #[test]
    fn test_below_threshold_refuses() {
        let (verifier, signers) = setup(2, 5, 3);
        let mut accumulator = accumulate(&verifier, &signers, &[0, 1]);
        assert!(matches!(
            accumulator.full_signature(),
            Err(Error::InsufficientShares(2, 3))
        ));
        accumulator.release().unwrap();
    }

    #[test]
    fn test_duplicate_share_not_counted() {
        let (verifier, signers) = setup(3, 5, 3);
        let mut accumulator = verifier.new_accumulator(true).unwrap();
        accumulator.set_expected_digest(DIGEST).unwrap();
        let share = signers[0].sign_share(DIGEST).unwrap();
        assert_eq!(accumulator.add_share(&share).unwrap(), 1);
        assert_eq!(accumulator.add_share(&share).unwrap(), 1);
        assert_eq!(accumulator.valid_shares().unwrap(), 1);
        accumulator.release().unwrap();
    }

    #[test]
    fn test_extra_shares_harmless() {
        let (verifier, signers) = setup(4, 5, 3);
        let mut accumulator = accumulate(&verifier, &signers, &[0, 1, 2, 3, 4]);
        let signature = accumulator.full_signature().unwrap();
        assert!(verifier.verify(DIGEST, &signature).unwrap());
        accumulator.release().unwrap();
    }

    #[test]
    fn test_unverifiable_share_not_counted() {
        let (verifier, signers) = setup(5, 5, 3);
        let mut accumulator = verifier.new_accumulator(true).unwrap();
        accumulator.set_expected_digest(DIGEST).unwrap();
        let share = signers[0].sign_share(OTHER_DIGEST).unwrap();
        assert_eq!(accumulator.add_share(&share).unwrap(), 0);
        assert_eq!(accumulator.valid_shares().unwrap(), 0);
        accumulator.release().unwrap();
    }

    #[test]
    fn test_verification_disabled_accepts_blindly() {
        let (verifier, signers) = setup(6, 5, 3);
        let mut accumulator = verifier.new_accumulator(false).unwrap();
        assert!(!accumulator.share_verification_enabled());
        let share = signers[0].sign_share(OTHER_DIGEST).unwrap();
        assert_eq!(accumulator.add_share(&share).unwrap(), 1);
        accumulator.release().unwrap();
    }

    #[test]
    fn test_digest_required_for_verification() {
        let (verifier, signers) = setup(7, 5, 3);
        let mut accumulator = verifier.new_accumulator(true).unwrap();
        let share = signers[0].sign_share(DIGEST).unwrap();
        assert!(matches!(
            accumulator.add_share(&share),
            Err(Error::DigestUnset)
        ));
        accumulator.release().unwrap();
    }

    #[test]
    fn test_release_is_final() {
        let (verifier, signers) = setup(8, 5, 3);
        let mut accumulator = verifier.new_accumulator(true).unwrap();
        accumulator.release().unwrap();
        assert!(matches!(
            accumulator.release(),
            Err(Error::AccumulatorReleased)
        ));
        let share = signers[0].sign_share(DIGEST).unwrap();
        assert!(matches!(
            accumulator.add_share(&share),
            Err(Error::AccumulatorReleased)
        ));
    }

    #[test]
    fn test_unknown_signer_rejected() {
        let (verifier, _) = setup(9, 5, 3);
        let (_, foreign) = setup(10, 8, 3);
        let share = foreign[7].sign_share(DIGEST).unwrap();
        let mut accumulator = verifier.new_accumulator(true).unwrap();
        accumulator.set_expected_digest(DIGEST).unwrap();
        assert!(matches!(
            accumulator.add_share(&share),
            Err(Error::UnknownSigner(7))
        ));
        accumulator.release().unwrap();
    }

    #[test]
    fn test_malformed_share_rejected() {
        let (verifier, _) = setup(11, 5, 3);
        let mut accumulator = verifier.new_accumulator(true).unwrap();
        accumulator.set_expected_digest(DIGEST).unwrap();
        assert!(matches!(
            accumulator.add_share(b"junk"),
            Err(Error::MalformedShare(_))
        ));
        accumulator.release().unwrap();
    }

    #[test]
    fn test_share_fingerprints_distinct() {
        let (_, signers) = setup(12, 5, 3);
        let fingerprints: Vec<_> = signers
            .iter()
            .map(|signer| signer.share_fingerprint().unwrap())
            .collect();
        for (i, a) in fingerprints.iter().enumerate() {
            assert_eq!(a, &signers[i].share_fingerprint().unwrap());
            for b in &fingerprints[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_share_verification_keys() {
        let (verifier, _) = setup(13, 5, 3);
        let keys: Vec<_> = (0..5)
            .map(|signer| verifier.share_verification_key(signer).unwrap())
            .collect();
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(matches!(
            verifier.share_verification_key(5),
            Err(Error::UnknownSigner(5))
        ));
    }

    #[test]
    fn test_share_len_matches_output() {
        let (_, signers) = setup(14, 5, 3);
        let share = signers[0].sign_share(DIGEST).unwrap();
        assert_eq!(share.len(), signers[0].share_len().unwrap());
    }
}
