//! Ed25519 key generation and derivation.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use strand_types::{KeyPair, PrivateKey, PublicKey};

/// Generate a new Ed25519 key pair from a secure random source.
pub fn generate_keypair() -> KeyPair {
    let signing = SigningKey::generate(&mut OsRng);
    keypair_from_signing(signing)
}

/// Derive a deterministic key pair from a 32-byte seed. Used for the dev
/// genesis key and for test fixtures.
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    let signing = SigningKey::from_bytes(seed);
    keypair_from_signing(signing)
}

/// Derive the public key from a private key.
pub fn public_from_private(private: &PrivateKey) -> PublicKey {
    let signing = SigningKey::from_bytes(private.as_bytes());
    PublicKey(signing.verifying_key().to_bytes())
}

/// Reconstruct a full key pair from a private key.
pub fn keypair_from_private(private: PrivateKey) -> KeyPair {
    let public = public_from_private(&private);
    KeyPair { public, private }
}

fn keypair_from_signing(signing: SigningKey) -> KeyPair {
    let public = PublicKey(signing.verifying_key().to_bytes());
    let private = PrivateKey(signing.to_bytes());
    KeyPair { public, private }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_differ() {
        let a = generate_keypair();
        let b = generate_keypair();
        assert_ne!(a.public, b.public);
    }

    #[test]
    fn seed_derivation_is_deterministic() {
        let a = keypair_from_seed(&[7u8; 32]);
        let b = keypair_from_seed(&[7u8; 32]);
        assert_eq!(a.public, b.public);
    }

    #[test]
    fn public_matches_private() {
        let kp = keypair_from_seed(&[1u8; 32]);
        assert_eq!(public_from_private(&kp.private), kp.public);
    }
}
