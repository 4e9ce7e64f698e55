//! Signature Verifier - authenticates payment gateway callbacks
//!
//! The gateway signs each payment callback with HMAC-SHA256 over
//! `order_id + "|" + payment_id` under a shared secret and sends the hex
//! digest alongside. A callback whose signature does not verify must be
//! treated as an authentication failure: no store mutation is permitted
//! for it.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::EscrowError;
use crate::EscrowResult;

type HmacSha256 = Hmac<Sha256>;

/// Verifies gateway callback signatures against the shared secret
///
/// Pure over its inputs; holds no connection or state beyond the secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verify a callback signature
    ///
    /// The comparison covers the full digest and runs in constant time.
    /// Malformed hex is a mismatch, not a separate error.
    pub fn verify(&self, order_id: &str, payment_id: &str, provided: &str) -> EscrowResult<()> {
        let provided = hex::decode(provided).map_err(|_| EscrowError::InvalidSignature)?;

        self.mac(order_id, payment_id)
            .verify_slice(&provided)
            .map_err(|_| EscrowError::InvalidSignature)
    }

    /// Hex digest for a payload, as the gateway would produce it
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        hex::encode(self.mac(order_id, payment_id).finalize().into_bytes())
    }

    fn mac(&self, order_id: &str, payment_id: &str) -> HmacSha256 {
        // HMAC accepts keys of any length, so new_from_slice cannot fail.
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        mac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-webhook-secret";

    #[test]
    fn valid_signature_verifies() {
        let verifier = SignatureVerifier::new(SECRET);
        let sig = verifier.sign("order_1", "pay_1");
        assert!(verifier.verify("order_1", "pay_1", &sig).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let sig = verifier.sign("order_1", "pay_1");
        assert!(matches!(
            verifier.verify("order_1", "pay_2", &sig),
            Err(EscrowError::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let signer = SignatureVerifier::new("other-secret");
        let verifier = SignatureVerifier::new(SECRET);
        let sig = signer.sign("order_1", "pay_1");
        assert!(verifier.verify("order_1", "pay_1", &sig).is_err());
    }

    #[test]
    fn truncated_digest_is_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let sig = verifier.sign("order_1", "pay_1");
        assert!(verifier.verify("order_1", "pay_1", &sig[..32]).is_err());
    }

    #[test]
    fn non_hex_signature_is_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        assert!(matches!(
            verifier.verify("order_1", "pay_1", "bad"),
            Err(EscrowError::InvalidSignature)
        ));
    }

    #[test]
    fn separator_is_part_of_the_payload() {
        // "a|bc" and "ab|c" must not collide.
        let verifier = SignatureVerifier::new(SECRET);
        let sig = verifier.sign("a", "bc");
        assert!(verifier.verify("ab", "c", &sig).is_err());
    }
}
