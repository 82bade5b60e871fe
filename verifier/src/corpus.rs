//! The fixed corpus of message digests signed while exercising keys.

use commonware_utils::from_hex_formatted;

/// Digests every keypair and signer combination is exercised against.
///
/// Fixed at build time so a failing run reproduces exactly; read-only for
/// the life of the process.
const SAMPLE_DIGESTS: [&str; 3] = [
    "d1aa0335c423b235bdbc57f3a4aa54e96a0161abd23af1a0a6fe2612d2f3c59b",
    "3b8f0ec61d83a4ef4c2b9a01d55e2a2e81d84f3b6b19c0ff45ea5cf2c35d7700",
    "7c4a04e39ba71f0e89bc19ab654f5e2e64d26d1b09c8e87d9a53a7a1ec1b2d48",
];

/// Decode the corpus.
pub(crate) fn digests() -> Vec<Vec<u8>> {
    SAMPLE_DIGESTS
        .iter()
        .map(|digest| from_hex_formatted(digest).expect("static digest corpus is well-formed"))
        .collect()
}
