//! Cryptographic primitives: hashing, SECP256k1 signatures, address
//! derivation.
//!
//! All functions are pure and stateless so they can be used from any
//! thread (mirrors the contract the teacher's PoW helpers kept).

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand_core::OsRng;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::Hash;

/// Single SHA-256 pass.
pub fn sha256(data: &[u8]) -> Hash {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Double SHA-256, used for the Merkle tree.
pub fn sha256d(data: &[u8]) -> Hash {
    sha256(&sha256(data))
}

fn ripemd160(data: &[u8]) -> [u8; 20] {
    let digest = Ripemd160::digest(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

/// SECP256k1 keypair.
pub struct Keypair {
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
}

impl Keypair {
    /// Uncompressed SEC1 public key bytes, the format addresses are
    /// derived from.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.verifying_key
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }
}

/// Generates a fresh random keypair.
pub fn generate_keypair() -> Keypair {
    let signing_key = SigningKey::random(&mut OsRng);
    let verifying_key = *signing_key.verifying_key();
    Keypair {
        signing_key,
        verifying_key,
    }
}

/// Signs `msg` with DER-encoded ECDSA over `sha256(msg)`.
pub fn sign(keypair: &Keypair, msg: &[u8]) -> Vec<u8> {
    let digest = sha256(msg);
    let sig: Signature = keypair
        .signing_key
        .sign_prehash(&digest)
        .expect("signing over a 32-byte digest cannot fail");
    sig.to_der().as_bytes().to_vec()
}

/// Verifies a DER-encoded ECDSA signature over `sha256(msg)`.
pub fn verify(pubkey_bytes: &[u8], msg: &[u8], sig_bytes: &[u8]) -> Result<bool> {
    let verifying_key =
        VerifyingKey::from_sec1_bytes(pubkey_bytes).map_err(|_| Error::InvalidKey)?;
    let sig = Signature::from_der(sig_bytes).map_err(|_| Error::MalformedSignature)?;
    let digest = sha256(msg);
    Ok(verifying_key.verify_prehash(&digest, &sig).is_ok())
}

/// Derives a network address from a public key: `hex(ripemd160(sha256(pubkey)))`.
pub fn address_from_pub(pubkey_bytes: &[u8]) -> String {
    hex::encode(ripemd160(&sha256(pubkey_bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256d_applies_twice() {
        let data = b"fractalpow";
        assert_eq!(sha256d(data), sha256(&sha256(data)));
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let keypair = generate_keypair();
        let msg = b"transfer 10.00000000 to address";
        let sig = sign(&keypair, msg);
        let pub_bytes = keypair.public_key_bytes();
        assert!(verify(&pub_bytes, msg, &sig).unwrap());
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let keypair = generate_keypair();
        let sig = sign(&keypair, b"original");
        let pub_bytes = keypair.public_key_bytes();
        assert!(!verify(&pub_bytes, b"tampered", &sig).unwrap());
    }

    #[test]
    fn address_is_stable_for_same_key() {
        let keypair = generate_keypair();
        let pub_bytes = keypair.public_key_bytes();
        assert_eq!(address_from_pub(&pub_bytes), address_from_pub(&pub_bytes));
    }
}
