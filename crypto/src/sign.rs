//! Ed25519 message signing and verification.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use strand_types::{PrivateKey, PublicKey, Signature};

/// Sign a message with a private key, returning the signature.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing = SigningKey::from_bytes(private_key.as_bytes());
    Signature(signing.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Returns `false` for malformed public keys as well as bad signatures; the
/// caller cannot distinguish the two and must not need to.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying) = VerifyingKey::from_bytes(public_key.as_bytes()) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    verifying.verify(message, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::keypair_from_seed;

    #[test]
    fn sign_and_verify() {
        let kp = keypair_from_seed(&[3u8; 32]);
        let sig = sign_message(b"block hash bytes", &kp.private);
        assert!(verify_signature(b"block hash bytes", &sig, &kp.public));
    }

    #[test]
    fn verify_rejects_wrong_message() {
        let kp = keypair_from_seed(&[3u8; 32]);
        let sig = sign_message(b"original", &kp.private);
        assert!(!verify_signature(b"tampered", &sig, &kp.public));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let kp = keypair_from_seed(&[3u8; 32]);
        let other = keypair_from_seed(&[4u8; 32]);
        let sig = sign_message(b"message", &kp.private);
        assert!(!verify_signature(b"message", &sig, &other.public));
    }

    #[test]
    fn verify_rejects_zero_signature() {
        let kp = keypair_from_seed(&[3u8; 32]);
        assert!(!verify_signature(b"message", &Signature::ZERO, &kp.public));
    }
}
